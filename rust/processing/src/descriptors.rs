// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build descriptor discovery
//!
//! Walks a content tree for `.qc` files and indexes the static ones by the
//! model they build.

use std::fs;
use std::path::{Path, PathBuf};

use propcombine_core::{canonical_model_path, BuildDescriptor, MeshFormat};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Static-prop build descriptors keyed by canonical model path
#[derive(Debug, Clone, Default)]
pub struct DescriptorMap {
    by_model: FxHashMap<String, BuildDescriptor>,
}

impl DescriptorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. An existing entry for the same model wins.
    pub fn insert(&mut self, descriptor: BuildDescriptor) -> bool {
        match self.by_model.entry(descriptor.model_name.clone()) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                tracing::warn!(
                    model = %descriptor.model_name,
                    kept = %existing.get().path.display(),
                    ignored = %descriptor.path.display(),
                    "Model built by more than one descriptor"
                );
                false
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(descriptor);
                true
            }
        }
    }

    pub fn get(&self, model: &str) -> Option<&BuildDescriptor> {
        self.by_model.get(&canonical_model_path(model))
    }

    pub fn contains(&self, model: &str) -> bool {
        self.get(model).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_model.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_model.is_empty()
    }
}

impl FromIterator<BuildDescriptor> for DescriptorMap {
    fn from_iter<T: IntoIterator<Item = BuildDescriptor>>(iter: T) -> Self {
        let mut map = Self::new();
        for descriptor in iter {
            map.insert(descriptor);
        }
        map
    }
}

/// Index every usable descriptor under `root`.
///
/// Dynamic models are skipped quietly; unreadable or malformed files and
/// models whose meshes are not SMD are skipped with a warning. Files are visited in path order so duplicate
/// resolution doesn't depend on the filesystem.
pub fn load_descriptors(root: &Path) -> DescriptorMap {
    let mut paths = Vec::new();
    collect_descriptor_files(root, &mut paths);
    paths.sort();

    let parsed: Vec<(PathBuf, Result<BuildDescriptor>)> = paths
        .into_par_iter()
        .map(|path| {
            let result = read_descriptor(&path);
            (path, result)
        })
        .collect();

    let mut map = DescriptorMap::new();
    let mut dynamic = 0usize;
    for (path, result) in parsed {
        match result {
            Ok(descriptor) if !is_decodable(&descriptor) => {
                tracing::warn!(
                    path = %path.display(),
                    model = %descriptor.model_name,
                    "Model has DMX meshes and will not be merged"
                );
            }
            Ok(descriptor) => {
                map.insert(descriptor);
            }
            Err(Error::Core(propcombine_core::Error::DynamicModel(feature))) => {
                dynamic += 1;
                tracing::debug!(path = %path.display(), feature = %feature, "Skipping dynamic model");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot parse build descriptor");
            }
        }
    }

    tracing::info!(
        root = %root.display(),
        count = map.len(),
        dynamic,
        "Loaded build descriptors"
    );
    map
}

/// Parse one descriptor file
pub fn read_descriptor(path: &Path) -> Result<BuildDescriptor> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(BuildDescriptor::parse(&content, path)?)
}

/// Every mesh the descriptor names can be read by the SMD codec
fn is_decodable(descriptor: &BuildDescriptor) -> bool {
    std::iter::once(&descriptor.reference_mesh)
        .chain(descriptor.collision_mesh.as_ref())
        .all(|mesh| MeshFormat::from_path(mesh) == Some(MeshFormat::Smd))
}

fn collect_descriptor_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot read content directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_descriptor_files(&path, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("qc"))
        {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_skips_dynamic_and_broken() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "props/crate/crate.qc",
            "$modelname props/crate.mdl\n$body body crate_ref.smd\n",
        );
        write(
            dir.path(),
            "props/Barrel.QC",
            "$modelname \"props/barrel\"\n$model body barrel.smd\n$collisionmodel barrel_phys.smd\n",
        );
        write(
            dir.path(),
            "props/lamp.qc",
            "$modelname props/lamp.mdl\n$body body lamp.smd\n$jigglebone cable { }\n",
        );
        write(dir.path(), "props/broken.qc", "$modelname props/broken.mdl\n");
        write(dir.path(), "props/notes.txt", "$modelname props/notes.mdl\n");

        let map = load_descriptors(dir.path());
        assert_eq!(map.len(), 2);

        let crate_desc = map.get("props/crate").unwrap();
        assert_eq!(
            crate_desc.reference_mesh,
            dir.path().join("props/crate").join("crate_ref.smd")
        );
        let barrel = map.get("models/props/barrel.mdl").unwrap();
        assert!(barrel.collision_mesh.is_some());
        assert!(!map.contains("props/lamp"));
        assert!(!map.contains("props/broken"));
    }

    #[test]
    fn test_dmx_models_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.qc", "$modelname props/a\n$body body a.dmx\n");
        write(
            dir.path(),
            "b.qc",
            "$modelname props/b\n$body body b.smd\n$collisionmodel b_phys.DMX\n",
        );
        write(dir.path(), "c.qc", "$modelname props/c\n$body body c.SMD\n");

        let map = load_descriptors(dir.path());
        assert_eq!(map.len(), 1);
        assert!(map.contains("props/c"));
        assert!(!map.contains("props/a"));
        assert!(!map.contains("props/b"));
    }

    #[test]
    fn test_duplicate_first_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/crate.qc", "$modelname props/crate\n$body b first.smd\n");
        write(dir.path(), "b/crate.qc", "$modelname props/crate\n$body b second.smd\n");

        let map = load_descriptors(dir.path());
        assert_eq!(map.len(), 1);
        assert!(map
            .get("props/crate")
            .unwrap()
            .reference_mesh
            .ends_with("first.smd"));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_descriptors(&dir.path().join("nope")).is_empty());
    }
}
