//! Propcombine Geometry
//!
//! Mesh handling for static prop merging: a per-triangle-material mesh,
//! engine-convention placement rotations using nalgebra, and the SMD
//! interchange codec.

pub mod error;
pub mod mesh;
pub mod smd;
pub mod transform;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Point3, Vector3};

pub use error::{Error, Result};
pub use mesh::Mesh;
pub use smd::{blank_smd, export_smd, parse_smd, MeshCodec, SmdCodec, ROOT_BONE};
pub use transform::{basis_correction, rotation_matrix, BASIS_CORRECTION_YAW};
