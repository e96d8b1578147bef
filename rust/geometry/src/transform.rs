// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement transforms for prop meshes
//!
//! Angles follow the engine convention: degrees, applied as roll about X,
//! then pitch about Y (positive pitches down), then yaw about Z.

use crate::mesh::Mesh;
use nalgebra::{Matrix3, Point3, Vector3};

/// Yaw between the basis source meshes are authored in and merge space
pub const BASIS_CORRECTION_YAW: f64 = 90.0;

/// Rotation matrix for `(pitch, yaw, roll)` in degrees.
///
/// Columns are the rotated forward, left and up axes.
pub fn rotation_matrix(pitch: f64, yaw: f64, roll: f64) -> Matrix3<f64> {
    let (sp, cp) = pitch.to_radians().sin_cos();
    let (sy, cy) = yaw.to_radians().sin_cos();
    let (sr, cr) = roll.to_radians().sin_cos();

    Matrix3::new(
        cp * cy,
        sr * sp * cy - cr * sy,
        cr * sp * cy + sr * sy,
        cp * sy,
        sr * sp * sy + cr * cy,
        cr * sp * sy - sr * cy,
        -sp,
        sr * cp,
        cr * cp,
    )
}

/// Rotation that brings a freshly parsed source mesh into merge space
#[inline]
pub fn basis_correction() -> Matrix3<f64> {
    rotation_matrix(0.0, BASIS_CORRECTION_YAW, 0.0)
}

impl Mesh {
    /// Scale positions about the origin
    pub fn scale_positions(&mut self, factor: f64) {
        if factor == 1.0 {
            return;
        }
        self.positions
            .iter_mut()
            .for_each(|p| *p = (*p as f64 * factor) as f32);
    }

    /// Rotate positions and normals about the origin
    pub fn rotate(&mut self, rotation: &Matrix3<f64>) {
        transform_range(self, 0, rotation, &Vector3::zeros());
    }

    /// Append a copy of `other`, rotated then translated by `offset`
    pub fn append_transformed(
        &mut self,
        other: &Mesh,
        rotation: &Matrix3<f64>,
        offset: &Vector3<f64>,
    ) {
        let first_vertex = self.vertex_count();
        self.merge(other);
        transform_range(self, first_vertex, rotation, offset);
    }
}

/// Transform vertices from `first_vertex` to the end in place
fn transform_range(mesh: &mut Mesh, first_vertex: usize, rotation: &Matrix3<f64>, offset: &Vector3<f64>) {
    let start = first_vertex * 3;

    mesh.positions[start..]
        .chunks_exact_mut(3)
        .for_each(|chunk| {
            let point = Point3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            let t = rotation * point + offset;
            chunk[0] = t.x as f32;
            chunk[1] = t.y as f32;
            chunk[2] = t.z as f32;
        });

    mesh.normals[start..]
        .chunks_exact_mut(3)
        .for_each(|chunk| {
            let normal = Vector3::new(chunk[0] as f64, chunk[1] as f64, chunk[2] as f64);
            let t = rotation * normal;
            chunk[0] = t.x as f32;
            chunk[1] = t.y as f32;
            chunk[2] = t.z as f32;
        });
}
