// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Eligibility and compatibility classification
//!
//! Two instances may share a merged model only if every attribute the
//! merged model can express once agrees between them. [`GroupKey`] collects
//! exactly those attributes.

use std::collections::{BTreeMap, BTreeSet};

use crate::context::RunContext;
use crate::instance::{Instance, InstanceFlags};

/// Attributes that must match for two instances to merge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// Fully qualified textures of the instance's skin
    pub textures: BTreeSet<String>,
    pub model_flags: u32,
    pub instance_flags: InstanceFlags,
    pub contents: u32,
    /// Case-folded surface property
    pub surfaceprop: String,
    pub solidity: u8,
    pub render_fx: u8,
    pub tint: [u8; 4],
}

/// Why an instance can't take part in merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// A lighting origin can't be preserved through a merge
    LightingOrigin,
    /// No static build descriptor for the model
    NoDescriptor,
    /// The model's compiled metadata is unavailable
    NoMetadata,
}

/// Compatibility key of an instance, or why it has none
pub fn group_key(instance: &Instance, ctx: &RunContext) -> Result<GroupKey, Ineligible> {
    if instance.flags.contains(InstanceFlags::USE_LIGHTING_ORIGIN) {
        return Err(Ineligible::LightingOrigin);
    }
    if !ctx.descriptors.contains(&instance.model) {
        return Err(Ineligible::NoDescriptor);
    }
    let info = ctx
        .models
        .get(&instance.model)
        .ok_or(Ineligible::NoMetadata)?;

    Ok(GroupKey {
        textures: info.skin_textures(instance.skin),
        model_flags: info.flags,
        instance_flags: instance.flags,
        contents: info.contents,
        surfaceprop: info.surfaceprop.to_lowercase(),
        solidity: instance.solidity,
        render_fx: instance.render_fx,
        tint: instance.tint,
    })
}

/// Instances partitioned by compatibility
#[derive(Debug, Default)]
pub struct Buckets {
    pub groups: BTreeMap<GroupKey, Vec<Instance>>,
    /// Passed through untouched
    pub ineligible: Vec<Instance>,
}

impl Buckets {
    pub fn eligible_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Partition instances into compatibility buckets.
///
/// Input order is kept within each bucket.
pub fn bucket_instances(instances: Vec<Instance>, ctx: &RunContext) -> Buckets {
    let mut buckets = Buckets::default();
    for instance in instances {
        match group_key(&instance, ctx) {
            Ok(key) => buckets.groups.entry(key).or_default().push(instance),
            Err(reason) => {
                tracing::trace!(model = %instance.model, ?reason, "Instance not eligible");
                buckets.ineligible.push(instance);
            }
        }
    }
    tracing::debug!(
        buckets = buckets.groups.len(),
        eligible = buckets.eligible_count(),
        ineligible = buckets.ineligible.len(),
        "Classified instances"
    );
    buckets
}
