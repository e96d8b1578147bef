// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh interchange codec
//!
//! Only the pieces of the SMD text format a static prop needs: the
//! `triangles` section is read, the skeleton is always a single root bone.
//! Vertices are not shared between triangles in SMD, so each triangle adds
//! three vertices.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use propcombine_core::MeshFormat;

use crate::error::{Error, Result};
use crate::mesh::Mesh;

/// Name of the single bone every combined mesh is skinned to
pub const ROOT_BONE: &str = "static_prop";

/// Reads and writes mesh interchange files
pub trait MeshCodec {
    /// Parse a mesh file
    fn read(&self, path: &Path) -> Result<Mesh>;

    /// Write a mesh file
    fn write(&self, mesh: &Mesh, path: &Path) -> Result<()>;
}

/// SMD reader/writer. DMX files are detected but not decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmdCodec;

impl MeshCodec for SmdCodec {
    fn read(&self, path: &Path) -> Result<Mesh> {
        match MeshFormat::from_path(path) {
            Some(MeshFormat::Smd) => {
                let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                parse_smd(&content)
            }
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn write(&self, mesh: &Mesh, path: &Path) -> Result<()> {
        fs::write(path, export_smd(mesh)).map_err(|e| Error::io(path, e))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Nodes,
    Skeleton,
    Triangles,
}

/// Parse SMD text
pub fn parse_smd(content: &str) -> Result<Mesh> {
    let mut mesh = Mesh::new();
    let mut section = Section::None;
    let mut material: Option<&str> = None;
    let mut corners: Vec<u32> = Vec::with_capacity(3);

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if section == Section::None {
            let keyword = line.split_whitespace().next().unwrap_or_default();
            section = match keyword {
                "version" => Section::None,
                "nodes" => Section::Nodes,
                "skeleton" => Section::Skeleton,
                "triangles" => Section::Triangles,
                other => {
                    return Err(Error::parse(line_no, format!("Unknown section {:?}", other)))
                }
            };
            continue;
        }

        if line == "end" {
            if !corners.is_empty() {
                return Err(Error::parse(line_no, "Triangle ends with fewer than 3 vertices"));
            }
            section = Section::None;
            continue;
        }

        if section != Section::Triangles {
            continue;
        }

        match material {
            None => material = Some(line),
            Some(name) => {
                let (position, normal, uv) = parse_vertex(line, line_no)?;
                corners.push(mesh.add_vertex(position, normal, uv));
                if corners.len() == 3 {
                    mesh.add_triangle(corners[0], corners[1], corners[2], name);
                    corners.clear();
                    material = None;
                }
            }
        }
    }

    if section != Section::None {
        return Err(Error::parse(content.lines().count(), "Missing final end"));
    }

    Ok(mesh)
}

/// `<bone> px py pz nx ny nz u v [links...]`
fn parse_vertex(line: &str, line_no: usize) -> Result<(Point3<f64>, Vector3<f64>, [f32; 2])> {
    let mut fields = line.split_whitespace();
    fields
        .next()
        .ok_or_else(|| Error::parse(line_no, "Empty vertex line"))?;

    let mut values = [0.0f64; 8];
    for value in values.iter_mut() {
        let field = fields
            .next()
            .ok_or_else(|| Error::parse(line_no, "Vertex line has fewer than 9 fields"))?;
        *value = fast_float::parse::<f64, _>(field)
            .map_err(|_| Error::parse(line_no, format!("Invalid number {:?}", field)))?;
    }

    Ok((
        Point3::new(values[0], values[1], values[2]),
        Vector3::new(values[3], values[4], values[5]),
        [values[6] as f32, values[7] as f32],
    ))
}

/// Serialise a mesh as SMD text skinned to [`ROOT_BONE`]
pub fn export_smd(mesh: &Mesh) -> String {
    let mut out = String::with_capacity(64 + mesh.triangle_count() * 160);
    out.push_str("version 1\nnodes\n");
    let _ = writeln!(out, "0 \"{}\" -1", ROOT_BONE);
    out.push_str("end\nskeleton\ntime 0\n0 0 0 0 0 0 0\nend\ntriangles\n");

    for (triangle, corners) in mesh.indices.chunks_exact(3).enumerate() {
        out.push_str(mesh.triangle_material(triangle));
        out.push('\n');
        for &vertex in corners {
            let v = vertex as usize;
            let p = &mesh.positions[v * 3..v * 3 + 3];
            let n = &mesh.normals[v * 3..v * 3 + 3];
            let uv = &mesh.uvs[v * 2..v * 2 + 2];
            let _ = writeln!(
                out,
                "0 {} {} {} {} {} {} {} {}",
                p[0], p[1], p[2], n[0], n[1], n[2], uv[0], uv[1]
            );
        }
    }

    out.push_str("end\n");
    out
}

/// An empty mesh, used as the idle animation of generated models
pub fn blank_smd() -> String {
    export_smd(&Mesh::new())
}
