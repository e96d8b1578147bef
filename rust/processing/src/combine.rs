// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Combine run orchestration

use std::fs;

use propcombine_geometry::{blank_smd, MeshCodec};

use crate::cache::{FinalizeStats, FingerprintCache};
use crate::cluster::{self, group_regions, Region, Strategy};
use crate::compiler::ModelCompiler;
use crate::config::CombineOptions;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::grouping::bucket_instances;
use crate::instance::Instance;
use crate::merger::MeshMerger;
use crate::pack::PackageSink;

/// Result of a combine run
#[derive(Debug, Default)]
pub struct CombineReport {
    /// Final placement list: merged instances plus everything left alone
    pub instances: Vec<Instance>,
    pub input_count: usize,
    /// Clusters replaced by a merged instance
    pub merged_clusters: usize,
    pub finalize: FinalizeStats,
}

impl CombineReport {
    fn passthrough(instances: Vec<Instance>) -> Self {
        Self {
            input_count: instances.len(),
            instances,
            ..Default::default()
        }
    }
}

/// Merge the level's instances.
///
/// Regions, when given, select region clustering; otherwise a positive
/// `auto_radius` selects distance clustering; otherwise nothing is merged.
/// Only internal invariant failures and output I/O errors abort the run.
pub fn combine(
    instances: Vec<Instance>,
    regions: &[Region],
    ctx: &RunContext,
    options: &CombineOptions,
    codec: &dyn MeshCodec,
    compiler: &dyn ModelCompiler,
    pack: &mut dyn PackageSink,
) -> Result<CombineReport> {
    let strategy = if !regions.is_empty() {
        Strategy::Regions(group_regions(regions, &ctx.models))
    } else if options.auto_radius > 0.0 {
        Strategy::Distance {
            radius: options.auto_radius,
        }
    } else {
        tracing::info!("No merge regions and automatic clustering is off");
        return Ok(CombineReport::passthrough(instances));
    };

    if !compiler.is_available() {
        tracing::warn!("Model compiler not found, cannot merge props");
        return Ok(CombineReport::passthrough(instances));
    }

    let input_count = instances.len();
    let buckets = bucket_instances(instances, ctx);
    let mut output = buckets.ineligible;
    let clustering = cluster::cluster(buckets.groups, &strategy, options.min_cluster);
    output.extend(clustering.rejected);

    let scratch = tempfile::Builder::new()
        .prefix("propcombine_")
        .tempdir()
        .map_err(|e| Error::io(std::env::temp_dir(), e))?;
    let anim = scratch.path().join("anim.smd");
    fs::write(&anim, blank_smd()).map_err(|e| Error::io(&anim, e))?;

    let layout = options.layout();
    let mut cache = FingerprintCache::load(layout.clone());
    let mut merger = MeshMerger::new(ctx, &layout, codec, compiler, scratch.path());

    let mut merged_clusters = 0;
    for members in clustering.clusters {
        match cache.lookup_or_build(&members, &mut merger, pack)? {
            Some(merged) => {
                merged_clusters += 1;
                output.push(merged);
            }
            None => output.extend(members),
        }
    }

    let finalize = cache.finalize()?;
    tracing::info!(
        input = input_count,
        output = output.len(),
        merged_clusters,
        culled = finalize.culled,
        "Combined {} props to {} props",
        input_count,
        output.len()
    );

    Ok(CombineReport {
        instances: output,
        input_count,
        merged_clusters,
        finalize,
    })
}
