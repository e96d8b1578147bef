// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Propcombine Core
//!
//! Text grammars used when merging static props:
//!
//! - **Build descriptors**: a dedicated token scanner over the QC subset that
//!   decides whether a source model is a single static mesh
//! - **Key-values**: nom parser and writer for the persisted combine cache
//! - **Model paths**: canonical form shared by instances, descriptors and the cache
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use propcombine_core::BuildDescriptor;
//! use std::path::Path;
//!
//! let qc = "$modelname \"props/crate.mdl\"\n$body body \"crate_ref.smd\"";
//! let desc = BuildDescriptor::parse(qc, Path::new("content/props/crate.qc"))?;
//! assert_eq!(desc.model_name, "models/props/crate.mdl");
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization support for descriptors

pub mod contents;
pub mod descriptor;
pub mod error;
pub mod keyvalues;
pub mod paths;
pub mod tokenizer;

pub use contents::content_names;
pub use descriptor::{BuildDescriptor, MeshFormat, DYNAMIC_FEATURES};
pub use error::{Error, Result};
pub use keyvalues::{Property, Value};
pub use paths::{canonical_model_path, normalize_separators};
pub use tokenizer::{Token, Tokenizer};
