// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Combine run options

use std::path::PathBuf;

use crate::layout::ArtifactLayout;

/// Options for one combine run
#[derive(Debug, Clone)]
pub struct CombineOptions {
    /// Level name, selects the output folder
    pub level_name: String,
    /// Game content root (the folder holding `models/`)
    pub game_dir: PathBuf,
    /// Root of the build descriptor tree; defaults to `<game>/../../content`
    pub descriptor_root: Option<PathBuf>,
    /// Automatic clustering radius; 0 disables it
    pub auto_radius: f64,
    /// Smallest cluster worth merging
    pub min_cluster: usize,
    /// Model compiler; defaults to `<game>/../bin/studiomdl.exe`
    pub compiler: Option<PathBuf>,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            level_name: String::new(),
            game_dir: PathBuf::from("."),
            descriptor_root: None,
            auto_radius: 0.0,
            min_cluster: 2,
            compiler: None,
        }
    }
}

impl CombineOptions {
    pub fn descriptor_root(&self) -> PathBuf {
        self.descriptor_root
            .clone()
            .unwrap_or_else(|| self.game_dir.join("..").join("..").join("content"))
    }

    pub fn compiler_path(&self) -> PathBuf {
        self.compiler
            .clone()
            .unwrap_or_else(|| self.game_dir.join("..").join("bin").join("studiomdl.exe"))
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.game_dir, &self.level_name)
    }
}
