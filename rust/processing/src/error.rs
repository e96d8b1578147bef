// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the combine pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while combining props.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor error: {0}")]
    Core(#[from] propcombine_core::Error),

    #[error("Mesh error: {0}")]
    Geometry(#[from] propcombine_geometry::Error),

    /// A cluster reached a stage its grouping should have made impossible.
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("Compiling {name} did not produce {missing}")]
    CompileFailed { name: String, missing: String },

    #[error("Cache error: {0}")]
    Cache(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Error::Invariant(message.into())
    }

    /// Programming errors, as opposed to bad data or a failed external tool.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}
