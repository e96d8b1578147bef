// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for descriptor and key-value parsing
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading build descriptors and key-value documents
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The descriptor uses a feature that a single static mesh cannot express.
    #[error("Model uses unsupported feature {0}")]
    DynamicModel(String),

    #[error("Descriptor has no $modelname")]
    MissingModelName,

    #[error("Descriptor has no reference mesh")]
    MissingReferenceMesh,

    #[error("Mesh is not SMD/DMX: {0}")]
    UnsupportedMesh(String),
}

impl Error {
    /// Create a parse error at the given (1-based) line
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}
