// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration loaded from environment variables.

use std::path::{Path, PathBuf};

use propcombine_processing::CombineOptions;

/// Command configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Game content root.
    pub game_dir: PathBuf,
    /// Build descriptor tree, `None` for the default next to the game.
    pub content_dir: Option<PathBuf>,
    /// Model compiler executable, `None` for the default.
    pub studiomdl: Option<PathBuf>,
    /// Automatic clustering radius, 0 to disable.
    pub auto_radius: f64,
    /// Smallest cluster worth merging.
    pub min_cluster: usize,
    /// Threads used to scan build descriptors.
    pub worker_threads: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            game_dir: std::env::var("PROPCOMBINE_GAME_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            content_dir: std::env::var("PROPCOMBINE_CONTENT_DIR").ok().map(PathBuf::from),
            studiomdl: std::env::var("PROPCOMBINE_STUDIOMDL").ok().map(PathBuf::from),
            auto_radius: std::env::var("PROPCOMBINE_AUTO_RADIUS")
                .unwrap_or_else(|_| "0".into())
                .parse()
                .unwrap_or(0.0),
            min_cluster: std::env::var("PROPCOMBINE_MIN_CLUSTER")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .unwrap_or(2),
            worker_threads: std::env::var("PROPCOMBINE_WORKER_THREADS")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()
                .unwrap_or_else(|_| num_cpus::get()),
        }
    }

    /// Options for combining the level stored at `level`.
    pub fn combine_options(&self, level: &Path) -> CombineOptions {
        let level_name = level
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        CombineOptions {
            level_name,
            game_dir: self.game_dir.clone(),
            descriptor_root: self.content_dir.clone(),
            auto_radius: self.auto_radius.max(0.0),
            min_cluster: self.min_cluster,
            compiler: self.studiomdl.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
