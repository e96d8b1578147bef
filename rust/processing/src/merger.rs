// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh combination and model compilation for cache misses

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use propcombine_core::content_names;
use propcombine_geometry::{basis_correction, Mesh, MeshCodec};
use rustc_hash::FxHashMap;

use crate::cache::ClusterBuilder;
use crate::compiler::ModelCompiler;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::layout::{ArtifactLayout, COLLISION_EXTENSION};

/// A source model's meshes, skinned and in merge space
#[derive(Debug, Clone)]
pub struct SourceMeshes {
    pub reference: Mesh,
    pub collision: Option<Mesh>,
}

/// Values written into a generated build descriptor
#[derive(Debug, Clone)]
pub struct MergedDescriptor<'a> {
    /// `$modelname`, relative to `models/`
    pub model_name: &'a str,
    pub surfaceprop: &'a str,
    pub contents: u32,
    pub cdmaterials: &'a BTreeSet<String>,
    pub reference_mesh: &'a str,
    pub collision_mesh: Option<&'a str>,
}

impl MergedDescriptor<'_> {
    /// Descriptor text for the compiler
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str("$staticprop\n");
        let _ = writeln!(out, "$modelname \"{}\"", self.model_name);
        let _ = writeln!(out, "$surfaceprop \"{}\"", self.surfaceprop);
        out.push('\n');
        let _ = writeln!(out, "$body body \"{}\"", self.reference_mesh);
        out.push('\n');

        let contents: Vec<String> = content_names(self.contents)
            .iter()
            .map(|name| format!("\"{}\"", name))
            .collect();
        let _ = writeln!(out, "$contents {}", contents.join(" "));
        out.push('\n');
        out.push_str("$sequence idle anim act_idle 1\n");

        for folder in self.cdmaterials {
            let _ = writeln!(out, "$cdmaterials \"{}\"", folder);
        }

        if let Some(collision) = self.collision_mesh {
            let _ = write!(
                out,
                "\n$collisionmodel \"{}\" {{\n    $maxconvexpieces 2048\n    $automass\n    $concave\n}}\n",
                collision
            );
        }
        out
    }
}

/// Builds merged models from a run's descriptors and metadata.
///
/// Source meshes are parsed once per (descriptor, skin) and reused by every
/// cluster that needs them.
pub struct MeshMerger<'a> {
    ctx: &'a RunContext,
    layout: &'a ArtifactLayout,
    codec: &'a dyn MeshCodec,
    compiler: &'a dyn ModelCompiler,
    scratch: &'a Path,
    meshes: FxHashMap<(PathBuf, u32), Arc<SourceMeshes>>,
}

impl<'a> MeshMerger<'a> {
    pub fn new(
        ctx: &'a RunContext,
        layout: &'a ArtifactLayout,
        codec: &'a dyn MeshCodec,
        compiler: &'a dyn ModelCompiler,
        scratch: &'a Path,
    ) -> Self {
        Self {
            ctx,
            layout,
            codec,
            compiler,
            scratch,
            meshes: FxHashMap::default(),
        }
    }

    /// Number of parsed (descriptor, skin) pairs held
    pub fn cached_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Parsed meshes for a model and skin
    pub fn source_meshes(&mut self, model: &str, skin: u32) -> Result<Arc<SourceMeshes>> {
        let ctx = self.ctx;
        let descriptor = ctx
            .descriptors
            .get(model)
            .ok_or_else(|| Error::invariant(format!("no build descriptor for {}", model)))?;
        let key = (descriptor.path.clone(), skin);
        if let Some(cached) = self.meshes.get(&key) {
            return Ok(cached.clone());
        }

        let info = ctx
            .models
            .get(model)
            .ok_or_else(|| Error::invariant(format!("no metadata for {}", model)))?;

        tracing::debug!(mesh = %descriptor.reference_mesh.display(), "Parsing reference mesh");
        let mut reference = self.codec.read(&descriptor.reference_mesh)?;
        reference.scale_positions(descriptor.reference_scale);
        reference.rename_materials(&info.skin_substitutions(skin));

        let mut collision = match &descriptor.collision_mesh {
            Some(path) => {
                tracing::debug!(mesh = %path.display(), "Parsing collision mesh");
                let mut mesh = self.codec.read(path)?;
                mesh.scale_positions(descriptor.collision_scale);
                Some(mesh)
            }
            None => None,
        };

        let basis = basis_correction();
        reference.rotate(&basis);
        if let Some(mesh) = collision.as_mut() {
            mesh.rotate(&basis);
        }

        let meshes = Arc::new(SourceMeshes {
            reference,
            collision,
        });
        self.meshes.insert(key, meshes.clone());
        Ok(meshes)
    }
}

/// The one value all members share, or an invariant failure
fn single<T: Ord + std::fmt::Debug>(values: BTreeSet<T>, what: &str) -> Result<T> {
    if values.len() > 1 {
        return Err(Error::invariant(format!("cluster has multiple {}: {:?}", what, values)));
    }
    values
        .into_iter()
        .next()
        .ok_or_else(|| Error::invariant(format!("cluster has no {}", what)))
}

impl ClusterBuilder for MeshMerger<'_> {
    fn build(&mut self, name: &str, fingerprint: &Fingerprint, has_collision: bool) -> Result<()> {
        let model_name = self.layout.model_name(name);
        tracing::info!(model = %model_name, members = fingerprint.len(), "Compiling merged model");

        let mut surfaceprops = BTreeSet::new();
        let mut contents = BTreeSet::new();
        let mut cdmaterials = BTreeSet::new();
        for member in fingerprint.members() {
            let info = self
                .ctx
                .models
                .get(&member.model)
                .ok_or_else(|| Error::invariant(format!("no metadata for {}", member.model)))?;
            surfaceprops.insert(info.surfaceprop.to_lowercase());
            contents.insert(info.contents);
            cdmaterials.extend(info.cdmaterials.iter().cloned());
        }
        let surfaceprop = single(surfaceprops, "surfaceprops")?;
        let contents = single(contents, "contents")?;

        let mut reference = Mesh::new();
        let mut collision: Option<Mesh> = None;
        for member in fingerprint.members() {
            let source = self.source_meshes(&member.model, member.skin)?;
            let rotation = member.angles().matrix();
            let offset = member.offset();

            reference.append_transformed(&source.reference, &rotation, &offset);
            if has_collision {
                if let Some(mesh) = &source.collision {
                    collision
                        .get_or_insert_with(Mesh::new)
                        .append_transformed(mesh, &rotation, &offset);
                }
            }
        }

        let reference_file = format!("{}_ref.smd", name);
        self.codec.write(&reference, &self.scratch.join(&reference_file))?;
        let collision_file = match &collision {
            Some(mesh) => {
                let file = format!("{}_phy.smd", name);
                self.codec.write(mesh, &self.scratch.join(&file))?;
                Some(file)
            }
            None => None,
        };

        let descriptor = MergedDescriptor {
            model_name: &model_name,
            surfaceprop: &surfaceprop,
            contents,
            cdmaterials: &cdmaterials,
            reference_mesh: &reference_file,
            collision_mesh: collision_file.as_deref(),
        };
        let qc_path = self.scratch.join(format!("{}.qc", name));
        fs::write(&qc_path, descriptor.render()).map_err(|e| Error::io(&qc_path, e))?;

        self.compiler.compile(&qc_path, self.layout.game_dir())?;

        let mut expected = vec![".mdl"];
        if collision.is_some() {
            expected.push(COLLISION_EXTENSION);
        }
        for ext in expected {
            if !self.layout.artifact_path(name, ext).is_file() {
                return Err(Error::CompileFailed {
                    name: model_name,
                    missing: ext.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::load_descriptors;
    use crate::instance::ModelInfo;
    use propcombine_geometry::SmdCodec;
    use std::collections::HashMap;

    const CRATE_SMD: &str = "version 1
nodes
0 \"root\" -1
end
skeleton
time 0
0 0 0 0 0 0 0
end
triangles
crate_clean
0 1 0 0 0 0 1 0 0
0 0 1 0 0 0 1 1 0
0 0 0 1 0 0 1 0 1
end
";

    struct IdleCompiler;

    impl ModelCompiler for IdleCompiler {
        fn compile(&self, _descriptor: &Path, _game_dir: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_source_meshes_parsed_once_per_skin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("crate.qc"),
            "$modelname props/crate\n$scale 2\n$body body crate_ref.smd\n",
        )
        .unwrap();
        fs::write(dir.path().join("crate_ref.smd"), CRATE_SMD).unwrap();

        let mut models = HashMap::new();
        models.insert(
            "models/props/crate.mdl".to_string(),
            ModelInfo {
                skins: vec![vec!["crate_clean".into()], vec!["crate_dirty".into()]],
                cdmaterials: vec!["models/props/".into()],
                ..Default::default()
            },
        );
        let ctx = RunContext::new(load_descriptors(dir.path()), models);
        let layout = ArtifactLayout::new(dir.path().join("game"), "test");
        let mut merger = MeshMerger::new(&ctx, &layout, &SmdCodec, &IdleCompiler, dir.path());

        let clean = merger.source_meshes("props/crate", 0).unwrap();
        let again = merger.source_meshes("Models\\Props\\Crate.mdl", 0).unwrap();
        assert!(Arc::ptr_eq(&clean, &again));
        assert_eq!(merger.cached_meshes(), 1);

        let dirty = merger.source_meshes("props/crate", 1).unwrap();
        assert_eq!(merger.cached_meshes(), 2);
        assert_eq!(clean.reference.materials, vec!["crate_clean"]);
        assert_eq!(dirty.reference.materials, vec!["crate_dirty"]);
        assert_eq!(dirty.reference.triangle_count(), 1);

        assert!(merger.source_meshes("props/missing", 0).unwrap_err().is_internal());
    }

    #[test]
    fn test_render_descriptor() {
        let cdmaterials = BTreeSet::from(["props/".to_string(), "models/crates/".to_string()]);
        let text = MergedDescriptor {
            model_name: "maps/test/propcombine/merge_1.mdl",
            surfaceprop: "wood",
            contents: 0x1 | 0x8,
            cdmaterials: &cdmaterials,
            reference_mesh: "merge_1_ref.smd",
            collision_mesh: Some("merge_1_phy.smd"),
        }
        .render();

        assert!(text.starts_with("$staticprop\n$modelname \"maps/test/propcombine/merge_1.mdl\"\n"));
        assert!(text.contains("$body body \"merge_1_ref.smd\""));
        assert!(text.contains("$contents \"solid\" \"grate\"\n"));
        let crates = text.find("$cdmaterials \"models/crates/\"").unwrap();
        let props = text.find("$cdmaterials \"props/\"").unwrap();
        assert!(crates < props);
        assert!(text.contains("$collisionmodel \"merge_1_phy.smd\" {\n    $maxconvexpieces 2048"));
    }

    #[test]
    fn test_render_notsolid_without_collision() {
        let text = MergedDescriptor {
            model_name: "m.mdl",
            surfaceprop: "metal",
            contents: 0,
            cdmaterials: &BTreeSet::new(),
            reference_mesh: "m_ref.smd",
            collision_mesh: None,
        }
        .render();
        assert!(text.contains("$contents \"notsolid\"\n"));
        assert!(!text.contains("$collisionmodel"));
    }

    #[test]
    fn test_single() {
        assert_eq!(single(BTreeSet::from([3u32]), "contents").unwrap(), 3);
        assert!(single(BTreeSet::from([1u32, 2]), "contents").unwrap_err().is_internal());
    }
}
