// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Where generated models live for a level

use std::path::{Path, PathBuf};

/// Files the compiler produces for one model
pub const ARTIFACT_EXTENSIONS: &[&str] = &[".mdl", ".phy", ".dx90.vtx", ".dx80.vtx", ".sw.vtx", ".vvd"];

/// Collision artifact, only present for solid merges
pub const COLLISION_EXTENSION: &str = ".phy";

/// Build cache file name inside the output directory
pub const CACHE_FILE: &str = "cache.vdf";

/// Output paths for one level's generated models
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    game_dir: PathBuf,
    level: String,
}

impl ArtifactLayout {
    pub fn new(game_dir: impl Into<PathBuf>, level: impl Into<String>) -> Self {
        Self {
            game_dir: game_dir.into(),
            level: level.into().to_lowercase(),
        }
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Model folder relative to `models/`, with a trailing slash
    pub fn model_folder(&self) -> String {
        format!("maps/{}/propcombine/", self.level)
    }

    /// Directory the compiler writes into
    pub fn output_dir(&self) -> PathBuf {
        self.game_dir
            .join("models")
            .join("maps")
            .join(&self.level)
            .join("propcombine")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.output_dir().join(CACHE_FILE)
    }

    /// `$modelname` for a generated model
    pub fn model_name(&self, name: &str) -> String {
        format!("{}{}.mdl", self.model_folder(), name)
    }

    /// Model path as referenced by level instances
    pub fn model_path(&self, name: &str) -> String {
        format!("models/{}", self.model_name(name))
    }

    pub fn artifact_path(&self, name: &str, ext: &str) -> PathBuf {
        self.output_dir().join(format!("{}{}", name, ext))
    }

    /// Path of an artifact inside the distributed package
    pub fn packed_path(&self, name: &str, ext: &str) -> String {
        format!("models/{}{}{}", self.model_folder(), name, ext)
    }
}

/// Split an artifact file name into model name and extension
pub fn split_artifact_name(file_name: &str) -> Option<(&str, &'static str)> {
    let lower = file_name.to_ascii_lowercase();
    ARTIFACT_EXTENSIONS.iter().find_map(|&ext| {
        let stem = file_name.get(..file_name.len().checked_sub(ext.len())?)?;
        (lower.ends_with(ext) && !stem.is_empty() && !stem.contains('.')).then_some((stem, ext))
    })
}
