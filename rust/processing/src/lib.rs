// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Propcombine Processing
//!
//! Merges nearby static props of a compiled level into combined models.
//!
//! A run classifies instances into compatibility buckets, clusters each
//! bucket spatially, then looks every cluster up in a per-level build cache
//! keyed by a placement-independent fingerprint. Misses are merged from the
//! source meshes and compiled with an external tool.
//!
//! ```rust,ignore
//! use propcombine_processing::{combine, load_descriptors, CombineOptions, PackList, RunContext, StudioMdl};
//! use propcombine_geometry::SmdCodec;
//!
//! let options = CombineOptions { level_name: "mymap".into(), auto_radius: 256.0, ..Default::default() };
//! let ctx = RunContext::new(load_descriptors(&options.descriptor_root()), models);
//! let compiler = StudioMdl::new(options.compiler_path());
//! let mut pack = PackList::new();
//! let report = combine(instances, &[], &ctx, &options, &SmdCodec, &compiler, &mut pack)?;
//! ```

pub mod cache;
pub mod cluster;
pub mod combine;
pub mod compiler;
pub mod config;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod fingerprint;
pub mod grouping;
pub mod instance;
pub mod layout;
pub mod merger;
pub mod pack;

pub use cache::{BuildRecord, ClusterBuilder, FinalizeStats, FingerprintCache, MERGED_ANGLES};
pub use cluster::{Bounds, Clustering, Region, RegionFilter, RegionGroup, Strategy, MAX_GROUP};
pub use combine::{combine, CombineReport};
pub use compiler::{ModelCompiler, StudioMdl};
pub use config::CombineOptions;
pub use context::{ModelCatalog, RunContext};
pub use descriptors::{load_descriptors, read_descriptor, DescriptorMap};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, MemberPose};
pub use grouping::{bucket_instances, group_key, Buckets, GroupKey, Ineligible};
pub use instance::{
    Angles, Instance, InstanceFlags, ModelInfo, ModelLookup, SOLID_NONE, SOLID_VPHYSICS,
};
pub use layout::{ArtifactLayout, ARTIFACT_EXTENSIONS};
pub use merger::{MergedDescriptor, MeshMerger, SourceMeshes};
pub use pack::{PackList, PackageSink};
