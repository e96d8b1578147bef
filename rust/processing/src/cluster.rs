// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial clustering of compatible instances
//!
//! Each [`GroupKey`] bucket is clustered on its own; nothing ever crosses
//! buckets. Two strategies:
//!
//! - **Regions**: boxes placed by the level author. Boxes sharing a name form
//!   one cluster.
//! - **Distance**: greedy seed-and-gather within a radius.
//!
//! Every input instance ends up either in exactly one cluster or in
//! `rejected`.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::context::ModelCatalog;
use crate::grouping::GroupKey;
use crate::instance::Instance;

/// Largest cluster the model compiler accepts
pub const MAX_GROUP: usize = 24;

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: Point3<f64>,
    pub maxs: Point3<f64>,
}

impl Bounds {
    /// Box spanning two corners in any order
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            mins: a.inf(&b),
            maxs: a.sup(&b),
        }
    }

    /// Smallest box containing all points
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self::new(first, first), |b, p| Self {
            mins: b.mins.inf(p),
            maxs: b.maxs.sup(p),
        }))
    }

    /// Inclusive on every face
    #[inline]
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| self.mins[i] <= p[i] && p[i] <= self.maxs[i])
    }

    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.mins, &self.maxs)
    }
}

/// Optional model+skin restriction on a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFilter {
    pub model: String,
    #[serde(default)]
    pub skin: u32,
}

/// Author-placed merge region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub name: Option<String>,
    /// Editor id, names unnamed regions
    #[serde(default)]
    pub id: u32,
    pub bounds: Bounds,
    #[serde(default)]
    pub filter: Option<RegionFilter>,
}

impl Region {
    /// Region from an origin and relative extents
    pub fn at(origin: Point3<f64>, mins: Vector3<f64>, maxs: Vector3<f64>) -> Self {
        Self {
            name: None,
            id: 0,
            bounds: Bounds::new(origin + mins, origin + maxs),
            filter: None,
        }
    }

    /// Cluster name: the author's name, or the id in upper-case hex
    pub fn group_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{:X}", self.id),
        }
    }
}

/// Regions merged by name and filter
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGroup {
    pub name: String,
    /// Texture set the bucket must have; empty accepts every bucket
    pub textures: BTreeSet<String>,
    pub boxes: Vec<Bounds>,
}

impl RegionGroup {
    #[inline]
    pub fn accepts(&self, key: &GroupKey) -> bool {
        self.textures.is_empty() || self.textures == key.textures
    }

    #[inline]
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        self.boxes.iter().any(|b| b.contains(p))
    }
}

/// Collect regions into groups, in first-seen order.
///
/// A filter naming an unknown model accepts every bucket.
pub fn group_regions(regions: &[Region], models: &ModelCatalog) -> Vec<RegionGroup> {
    let mut groups: Vec<RegionGroup> = Vec::new();
    for region in regions {
        let name = region.group_name();
        let textures = region
            .filter
            .as_ref()
            .and_then(|f| models.get(&f.model).map(|info| info.skin_textures(f.skin)))
            .unwrap_or_default();

        match groups
            .iter_mut()
            .find(|g| g.name == name && g.textures == textures)
        {
            Some(group) => group.boxes.push(region.bounds),
            None => groups.push(RegionGroup {
                name,
                textures,
                boxes: vec![region.bounds],
            }),
        }
    }
    groups
}

/// Clustering strategy for a run
#[derive(Debug, Clone)]
pub enum Strategy {
    Regions(Vec<RegionGroup>),
    Distance { radius: f64 },
}

/// Clusters ready to merge, plus instances passed through
#[derive(Debug, Default)]
pub struct Clustering {
    pub clusters: Vec<Vec<Instance>>,
    pub rejected: Vec<Instance>,
}

impl Clustering {
    fn accept(&mut self, cluster: Vec<Instance>, min_cluster: usize) {
        if cluster.len() < min_cluster.max(1) {
            self.rejected.extend(cluster);
        } else {
            self.clusters.push(cluster);
        }
    }

    pub fn clustered_count(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }
}

/// Run a strategy over every bucket
pub fn cluster(
    buckets: BTreeMap<GroupKey, Vec<Instance>>,
    strategy: &Strategy,
    min_cluster: usize,
) -> Clustering {
    let mut out = Clustering::default();
    for (key, bucket) in buckets {
        if bucket.len() < min_cluster.max(2) {
            out.rejected.extend(bucket);
            continue;
        }
        match strategy {
            Strategy::Regions(groups) => {
                cluster_by_regions(&key, bucket, groups, min_cluster, &mut out)
            }
            Strategy::Distance { radius } => {
                cluster_by_distance(bucket, *radius, min_cluster, &mut out)
            }
        }
    }
    tracing::debug!(
        clusters = out.clusters.len(),
        clustered = out.clustered_count(),
        rejected = out.rejected.len(),
        "Clustered instances"
    );
    out
}

/// Assign each instance to the first accepting region that contains it
fn cluster_by_regions(
    key: &GroupKey,
    bucket: Vec<Instance>,
    groups: &[RegionGroup],
    min_cluster: usize,
    out: &mut Clustering,
) {
    let mut found: Vec<Vec<Instance>> = vec![Vec::new(); groups.len()];
    for instance in bucket {
        let slot = groups
            .iter()
            .position(|g| g.accepts(key) && g.contains(&instance.origin));
        match slot {
            Some(i) => found[i].push(instance),
            None => out.rejected.push(instance),
        }
    }

    for members in found.into_iter().filter(|m| !m.is_empty()) {
        for chunk in split_oversized(members) {
            out.accept(chunk, min_cluster);
        }
    }
}

/// Break a region cluster above [`MAX_GROUP`] into near-equal spatial runs
fn split_oversized(mut members: Vec<Instance>) -> Vec<Vec<Instance>> {
    if members.len() <= MAX_GROUP {
        return vec![members];
    }
    members.sort_by(|a, b| {
        a.origin
            .x
            .total_cmp(&b.origin.x)
            .then(a.origin.y.total_cmp(&b.origin.y))
            .then(a.origin.z.total_cmp(&b.origin.z))
    });

    let parts = members.len().div_ceil(MAX_GROUP);
    let base = members.len() / parts;
    let extra = members.len() % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut rest = members.into_iter();
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(rest.by_ref().take(size).collect());
    }
    chunks
}

/// Greedy seed-and-gather clustering.
///
/// The seed is always the oldest instance left in the pool, so results only
/// depend on input order.
fn cluster_by_distance(bucket: Vec<Instance>, radius: f64, min_cluster: usize, out: &mut Clustering) {
    let radius_sq = radius * radius;
    let gather_sq = 4.0 * radius_sq;

    let origins: Vec<Point3<f64>> = bucket.iter().map(|i| i.origin).collect();
    let mut slots: Vec<Option<Instance>> = bucket.into_iter().map(Some).collect();
    let mut pool: Vec<usize> = (0..slots.len()).collect();

    while !pool.is_empty() {
        let seed = pool.remove(0);
        let seed_origin = origins[seed];

        let mut gathered = vec![seed];
        for &candidate in &pool {
            if gathered.len() >= MAX_GROUP {
                break;
            }
            if (origins[candidate] - seed_origin).norm_squared() <= gather_sq {
                gathered.push(candidate);
            }
        }

        if gathered.len() < min_cluster {
            out.rejected.extend(slots[seed].take());
            continue;
        }

        let Some(bounds) = Bounds::from_points(gathered.iter().map(|&i| &origins[i])) else {
            continue;
        };
        let center = bounds.center();

        let mut kept: Vec<(usize, f64)> = gathered
            .iter()
            .map(|&i| (i, (origins[i] - center).norm_squared()))
            .filter(|&(_, d)| d <= radius_sq)
            .collect();
        kept.sort_by(|a, b| a.1.total_cmp(&b.1));
        kept.truncate(MAX_GROUP);

        pool.retain(|i| !kept.iter().any(|&(k, _)| k == *i));
        if !kept.iter().any(|&(k, _)| k == seed) {
            out.rejected.extend(slots[seed].take());
        }

        let members: Vec<Instance> = kept.iter().filter_map(|&(i, _)| slots[i].take()).collect();
        out.accept(members, min_cluster);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Angles, InstanceFlags, ModelInfo};

    fn key(textures: &[&str]) -> GroupKey {
        GroupKey {
            textures: textures.iter().map(|t| t.to_string()).collect(),
            model_flags: 0,
            instance_flags: InstanceFlags::default(),
            contents: 1,
            surfaceprop: "wood".into(),
            solidity: 6,
            render_fx: 0,
            tint: [255; 4],
        }
    }

    fn at(x: f64, y: f64) -> Instance {
        Instance::new("props/crate", Point3::new(x, y, 0.0), Angles::default())
    }

    fn one_bucket(instances: Vec<Instance>) -> BTreeMap<GroupKey, Vec<Instance>> {
        BTreeMap::from([(key(&["props/crate"]), instances)])
    }

    fn total(c: &Clustering) -> usize {
        c.clustered_count() + c.rejected.len()
    }

    fn region(name: &str, mins: [f64; 3], maxs: [f64; 3]) -> RegionGroup {
        RegionGroup {
            name: name.into(),
            textures: BTreeSet::new(),
            boxes: vec![Bounds::new(mins.into(), maxs.into())],
        }
    }

    #[test]
    fn test_bounds_inclusive() {
        let b = Bounds::new(Point3::new(10.0, 10.0, 10.0), Point3::new(-10.0, -10.0, -10.0));
        assert!(b.contains(&Point3::new(10.0, -10.0, 0.0)));
        assert!(!b.contains(&Point3::new(10.5, 0.0, 0.0)));
        assert_eq!(b.center(), Point3::origin());
    }

    #[test]
    fn test_distance_scenario_three_in_a_row() {
        let result = cluster(
            one_bucket(vec![at(0.0, 0.0), at(100.0, 0.0), at(200.0, 0.0)]),
            &Strategy::Distance { radius: 150.0 },
            2,
        );
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].len(), 3);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_distance_far_apart_rejected() {
        let result = cluster(
            one_bucket(vec![at(0.0, 0.0), at(1000.0, 0.0), at(2000.0, 0.0)]),
            &Strategy::Distance { radius: 100.0 },
            2,
        );
        assert!(result.clusters.is_empty());
        assert_eq!(result.rejected.len(), 3);
    }

    #[test]
    fn test_distance_never_exceeds_max_group() {
        let grid: Vec<Instance> = (0..70)
            .map(|i| at((i % 10) as f64 * 4.0, (i / 10) as f64 * 4.0))
            .collect();
        let result = cluster(one_bucket(grid), &Strategy::Distance { radius: 512.0 }, 2);

        assert!(result.clusters.iter().all(|c| c.len() <= MAX_GROUP && c.len() >= 2));
        assert_eq!(total(&result), 70);
        assert!(result.clusters.len() >= 3);
    }

    #[test]
    fn test_distance_respects_min_cluster() {
        let instances = vec![at(0.0, 0.0), at(10.0, 0.0), at(500.0, 0.0), at(510.0, 0.0), at(520.0, 0.0)];
        let result = cluster(one_bucket(instances), &Strategy::Distance { radius: 50.0 }, 3);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].len(), 3);
        assert_eq!(result.rejected.len(), 2);
    }

    #[test]
    fn test_unkept_candidates_stay_available() {
        // The seed gathers everything but only it lies near the gather
        // center; the outliers are clustered by later seeds.
        let instances = vec![
            at(0.0, 0.0),
            at(-280.0, 0.0),
            at(-270.0, 0.0),
            at(280.0, 0.0),
            at(290.0, 0.0),
        ];
        let result = cluster(one_bucket(instances), &Strategy::Distance { radius: 150.0 }, 2);

        assert_eq!(result.clusters.len(), 2);
        assert!(result.clusters.iter().all(|c| c.len() == 2));
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].origin, Point3::origin());
    }

    #[test]
    fn test_small_bucket_rejected_whole() {
        let result = cluster(one_bucket(vec![at(0.0, 0.0)]), &Strategy::Distance { radius: 100.0 }, 2);
        assert!(result.clusters.is_empty());
        assert_eq!(result.rejected.len(), 1);
    }

    #[test]
    fn test_regions_assign_and_reject() {
        let groups = vec![
            region("left", [-10.0, -10.0, -10.0], [60.0, 10.0, 10.0]),
            region("right", [490.0, -10.0, -10.0], [510.0, 10.0, 10.0]),
        ];
        let instances = vec![at(0.0, 0.0), at(50.0, 0.0), at(500.0, 0.0), at(9000.0, 0.0)];
        let result = cluster(one_bucket(instances), &Strategy::Regions(groups), 2);

        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].len(), 2);
        // "right" had one member, 9000 matched nothing
        assert_eq!(result.rejected.len(), 2);
    }

    #[test]
    fn test_regions_sharing_name_form_one_cluster() {
        let catalog = ModelCatalog::new(rustc_hash::FxHashMap::<String, ModelInfo>::default());
        let mut a = Region::at(Point3::origin(), Vector3::repeat(-8.0), Vector3::repeat(8.0));
        a.name = Some("shelf".into());
        let mut b = Region::at(Point3::new(300.0, 0.0, 0.0), Vector3::repeat(-8.0), Vector3::repeat(8.0));
        b.name = Some("shelf".into());
        let mut c = Region::at(Point3::origin(), Vector3::repeat(-8.0), Vector3::repeat(8.0));
        c.id = 0xbeef;

        let groups = group_regions(&[a, b, c], &catalog);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].boxes.len(), 2);
        assert_eq!(groups[1].name, "BEEF");

        let result = cluster(
            one_bucket(vec![at(0.0, 0.0), at(300.0, 0.0)]),
            &Strategy::Regions(groups),
            2,
        );
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].len(), 2);
    }

    #[test]
    fn test_region_filter_must_match_textures() {
        let mut groups = vec![region("only_barrels", [-10.0; 3], [100.0; 3])];
        groups[0].textures = BTreeSet::from(["props/barrel".to_string()]);

        let result = cluster(
            one_bucket(vec![at(0.0, 0.0), at(5.0, 0.0)]),
            &Strategy::Regions(groups),
            2,
        );
        assert!(result.clusters.is_empty());
        assert_eq!(result.rejected.len(), 2);
    }

    #[test]
    fn test_region_filter_resolved_through_catalog() {
        let mut models = rustc_hash::FxHashMap::<String, ModelInfo>::default();
        models.insert(
            "models/props/crate.mdl".into(),
            ModelInfo {
                skins: vec![vec!["crate_clean".into()], vec!["crate_dirty".into()]],
                cdmaterials: vec!["models/props/".into()],
                ..Default::default()
            },
        );
        let catalog = ModelCatalog::new(models);

        let mut dirty = Region::at(Point3::origin(), Vector3::repeat(-1.0), Vector3::repeat(10.0));
        dirty.name = Some("dirty".into());
        dirty.filter = Some(RegionFilter {
            model: "Props\\Crate".into(),
            skin: 1,
        });
        let mut unknown = Region::at(Point3::new(100.0, 0.0, 0.0), Vector3::repeat(-1.0), Vector3::repeat(10.0));
        unknown.name = Some("unknown".into());
        unknown.filter = Some(RegionFilter {
            model: "props/ghost".into(),
            skin: 0,
        });

        let groups = group_regions(&[dirty, unknown], &catalog);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[0].textures,
            BTreeSet::from(["models/props/crate_dirty".to_string()])
        );
        assert!(groups[1].textures.is_empty());

        let buckets = BTreeMap::from([
            (
                key(&["models/props/crate_clean"]),
                vec![at(0.0, 0.0), at(5.0, 0.0), at(100.0, 0.0), at(105.0, 0.0)],
            ),
            (key(&["models/props/crate_dirty"]), vec![at(0.0, 0.0), at(5.0, 0.0)]),
        ]);
        let result = cluster(buckets, &Strategy::Regions(groups), 2);

        assert_eq!(result.clusters.len(), 2);
        let mut starts: Vec<f64> = result.clusters.iter().map(|c| c[0].origin.x).collect();
        starts.sort_by(f64::total_cmp);
        assert_eq!(starts, vec![0.0, 100.0]);
        // Clean crates at the origin match neither the dirty filter nor the far box
        assert_eq!(result.rejected.len(), 2);
        assert!(result.rejected.iter().all(|i| i.origin.x < 10.0));
    }

    #[test]
    fn test_oversized_region_split() {
        let groups = vec![region("hall", [-1.0; 3], [1000.0, 1000.0, 1.0])];
        let instances: Vec<Instance> = (0..30).map(|i| at(i as f64 * 10.0, 0.0)).collect();
        let result = cluster(one_bucket(instances), &Strategy::Regions(groups), 2);

        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].len(), 15);
        assert_eq!(result.clusters[1].len(), 15);
        assert!(result.rejected.is_empty());
    }
}
