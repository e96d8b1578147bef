// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

/// Triangle mesh with one material per triangle
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Texture coordinates (u, v)
    pub uvs: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
    /// Material of each triangle, as an index into `materials`
    pub triangle_materials: Vec<u32>,
    /// Material palette
    pub materials: Vec<String>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            triangle_materials: Vec::new(),
            materials: Vec::new(),
        }
    }

    /// Add a vertex with normal and texture coordinate, returns its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>, uv: [f32; 2]) -> u32 {
        let index = self.vertex_count() as u32;

        self.positions.push(position.x as f32);
        self.positions.push(position.y as f32);
        self.positions.push(position.z as f32);

        self.normals.push(normal.x as f32);
        self.normals.push(normal.y as f32);
        self.normals.push(normal.z as f32);

        self.uvs.extend_from_slice(&uv);
        index
    }

    /// Add a triangle using the named material
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32, material: &str) {
        let material = self.material_index(material);
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
        self.triangle_materials.push(material);
    }

    /// Palette index for a material, adding it if new
    pub fn material_index(&mut self, name: &str) -> u32 {
        match self.materials.iter().position(|m| m == name) {
            Some(i) => i as u32,
            None => {
                self.materials.push(name.to_string());
                (self.materials.len() - 1) as u32
            }
        }
    }

    /// Material name of a triangle
    #[inline]
    pub fn triangle_material(&self, triangle: usize) -> &str {
        &self.materials[self.triangle_materials[triangle] as usize]
    }

    /// Rename materials through a substitution table.
    ///
    /// Keys are matched case-insensitively; materials without an entry keep
    /// their name.
    pub fn rename_materials(&mut self, substitutions: &FxHashMap<String, String>) {
        if substitutions.is_empty() {
            return;
        }
        for name in &mut self.materials {
            if let Some(replacement) = substitutions.get(&name.to_lowercase()) {
                *name = replacement.clone();
            }
        }
    }

    /// Merge another mesh into this one
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = self.vertex_count() as u32;

        // Pre-allocate for the incoming data
        self.positions.reserve(other.positions.len());
        self.normals.reserve(other.normals.len());
        self.uvs.reserve(other.uvs.len());
        self.indices.reserve(other.indices.len());

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.uvs.extend_from_slice(&other.uvs);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));

        let remap: Vec<u32> = other
            .materials
            .iter()
            .map(|name| self.material_index(name))
            .collect();
        self.triangle_materials
            .extend(other.triangle_materials.iter().map(|&m| remap[m as usize]));
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Calculate bounds (min, max)
    #[inline]
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        if self.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            let (x, y, z) = (chunk[0], chunk[1], chunk[2]);
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            min.z = min.z.min(z);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
            max.z = max.z.max(z);
        });

        (min, max)
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(material: &str, x: f64) -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(x, 0.0, 0.0), Vector3::z(), [0.0, 0.0]);
        let b = mesh.add_vertex(Point3::new(x + 1.0, 0.0, 0.0), Vector3::z(), [1.0, 0.0]);
        let c = mesh.add_vertex(Point3::new(x, 1.0, 0.0), Vector3::z(), [0.0, 1.0]);
        mesh.add_triangle(a, b, c, material);
        mesh
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_add_vertex() {
        let mut mesh = Mesh::new();
        let index = mesh.add_vertex(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 1.0), [0.5, 0.25]);
        assert_eq!(index, 0);
        assert_eq!(mesh.vertex_count(), 1);
        assert_eq!(mesh.positions, vec![1.0, 2.0, 3.0]);
        assert_eq!(mesh.normals, vec![0.0, 0.0, 1.0]);
        assert_eq!(mesh.uvs, vec![0.5, 0.25]);
    }

    #[test]
    fn test_merge_offsets_indices_and_materials() {
        let mut mesh1 = triangle("wood", 0.0);
        let mut mesh2 = triangle("metal", 5.0);
        mesh2.merge(&triangle("wood", 9.0));

        mesh1.merge(&mesh2);
        assert_eq!(mesh1.vertex_count(), 9);
        assert_eq!(mesh1.triangle_count(), 3);
        assert_eq!(&mesh1.indices[3..6], &[3, 4, 5]);
        assert_eq!(mesh1.materials, vec!["wood".to_string(), "metal".to_string()]);
        assert_eq!(mesh1.triangle_material(1), "metal");
        assert_eq!(mesh1.triangle_material(2), "wood");
    }

    #[test]
    fn test_rename_materials() {
        let mut mesh = triangle("Crate_Clean", 0.0);
        let mut subs = FxHashMap::default();
        subs.insert("crate_clean".to_string(), "crate_dirty".to_string());
        mesh.rename_materials(&subs);
        assert_eq!(mesh.triangle_material(0), "crate_dirty");
    }

    #[test]
    fn test_bounds() {
        let mut mesh = triangle("a", -2.0);
        mesh.merge(&triangle("a", 3.0));
        let (min, max) = mesh.bounds();
        assert_eq!(min, Point3::new(-2.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(4.0, 1.0, 0.0));
    }
}
