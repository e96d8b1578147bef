// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Propcombine - merge a level's static props into combined models.
//!
//! ```text
//! propcombine <level.json> [placements.json]
//! ```
//!
//! Reads a JSON level snapshot, merges what it can and writes the final
//! placement list (default `<level>.combined.json`). Generated files that
//! must ship with the level are written below `<level>_pack/`.
//!
//! # Environment
//!
//! - `PROPCOMBINE_GAME_DIR` - game content root
//! - `PROPCOMBINE_CONTENT_DIR` - build descriptor tree
//! - `PROPCOMBINE_STUDIOMDL` - model compiler
//! - `PROPCOMBINE_AUTO_RADIUS` - automatic clustering radius
//! - `PROPCOMBINE_MIN_CLUSTER` - smallest cluster to merge
//! - `PROPCOMBINE_WORKER_THREADS` - descriptor scan threads

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use propcombine_geometry::SmdCodec;
use propcombine_processing::{combine, load_descriptors, PackList, RunContext, StudioMdl};

mod config;
mod snapshot;

use config::Config;
use snapshot::{write_placements, LevelSnapshot};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,propcombine=debug".into()),
        )
        .init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let Some(level_path) = args.next() else {
        bail!("usage: propcombine <level.json> [placements.json]");
    };
    let output_path = args
        .next()
        .unwrap_or_else(|| level_path.with_extension("combined.json"));

    let config = Config::from_env();
    let options = config.combine_options(&level_path);

    tracing::info!(
        level = %options.level_name,
        game_dir = %options.game_dir.display(),
        auto_radius = options.auto_radius,
        min_cluster = options.min_cluster,
        "Starting propcombine"
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
        .context("configuring worker threads")?;

    let (instances, regions, models) = LevelSnapshot::read(&level_path)?.into_parts();
    let ctx = RunContext::new(load_descriptors(&options.descriptor_root()), models);
    let compiler = StudioMdl::new(options.compiler_path());
    let mut pack = PackList::new();

    let report = combine(
        instances,
        &regions,
        &ctx,
        &options,
        &SmdCodec,
        &compiler,
        &mut pack,
    )
    .context("combining props")?;

    write_placements(&output_path, &report.instances)?;

    let pack_dir = level_path.with_file_name(format!("{}_pack", options.level_name));
    let packed = pack.write_to(&pack_dir).context("writing packed files")?;

    tracing::info!(
        output = %output_path.display(),
        pack_dir = %pack_dir.display(),
        packed,
        merged_clusters = report.merged_clusters,
        "Done"
    );
    Ok(())
}
