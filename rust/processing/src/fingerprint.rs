// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement-independent cluster identity
//!
//! Members are expressed relative to the cluster centroid and quantized to
//! fixed-point, so float noise in placement and member order can't change
//! the result. The set of member poses is kept sorted and deduplicated and
//! compared as one value.

use std::fmt::Write as _;

use nalgebra::{Point3, Vector3};
use propcombine_core::canonical_model_path;
use sha2::{Digest, Sha256};

use crate::instance::{Angles, Instance};

/// Fixed-point resolution: 7 digits after the decimal point
pub const TICKS_PER_UNIT: f64 = 1e7;

/// Quantize to fixed-point ticks. `-0.0` and `0.0` agree.
#[inline]
pub fn quantize(value: f64) -> i64 {
    (value * TICKS_PER_UNIT).round() as i64
}

#[inline]
pub fn ticks_to_f64(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_UNIT
}

/// One member's pose relative to the cluster, quantized
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberPose {
    /// Offset from the centroid, in ticks
    pub offset: [i64; 3],
    /// Pitch, yaw, roll in ticks of a degree
    pub angles: [i64; 3],
    /// Canonical model path
    pub model: String,
    pub skin: u32,
}

impl MemberPose {
    pub fn new(offset: Vector3<f64>, angles: Angles, model: &str, skin: u32) -> Self {
        Self {
            offset: [quantize(offset.x), quantize(offset.y), quantize(offset.z)],
            angles: [
                quantize(angles.pitch),
                quantize(angles.yaw),
                quantize(angles.roll),
            ],
            model: canonical_model_path(model),
            skin,
        }
    }

    pub fn offset(&self) -> Vector3<f64> {
        Vector3::new(
            ticks_to_f64(self.offset[0]),
            ticks_to_f64(self.offset[1]),
            ticks_to_f64(self.offset[2]),
        )
    }

    pub fn angles(&self) -> Angles {
        Angles::new(
            ticks_to_f64(self.angles[0]),
            ticks_to_f64(self.angles[1]),
            ticks_to_f64(self.angles[2]),
        )
    }
}

/// Sorted, deduplicated set of member poses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    members: Vec<MemberPose>,
}

impl Fingerprint {
    pub fn from_members(members: impl IntoIterator<Item = MemberPose>) -> Self {
        let mut members: Vec<MemberPose> = members.into_iter().collect();
        members.sort_unstable();
        members.dedup();
        Self { members }
    }

    /// Fingerprint of a cluster, along with its centroid.
    ///
    /// Orientation is kept as placed: the cluster is not rotated into a
    /// common frame before comparison.
    pub fn of_cluster(cluster: &[Instance]) -> (Self, Point3<f64>) {
        let center = centroid(cluster);
        let fingerprint = Self::from_members(
            cluster
                .iter()
                .map(|i| MemberPose::new(i.origin - center, i.angles, &i.model, i.skin)),
        );
        (fingerprint, center)
    }

    pub fn members(&self) -> &[MemberPose] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Stable text form, one member per line
    pub fn canonical_text(&self) -> String {
        let mut out = String::with_capacity(self.members.len() * 96);
        for m in &self.members {
            let _ = writeln!(
                out,
                "{} {} {} {} {} {} {} {}",
                m.model,
                m.skin,
                m.offset[0],
                m.offset[1],
                m.offset[2],
                m.angles[0],
                m.angles[1],
                m.angles[2]
            );
        }
        out
    }

    /// Hex SHA-256 of the canonical text; a non-zero salt perturbs it
    pub fn digest(&self, salt: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_text().as_bytes());
        if salt > 0 {
            hasher.update(format!("#{}", salt).as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Mean of member origins
pub fn centroid(cluster: &[Instance]) -> Point3<f64> {
    if cluster.is_empty() {
        return Point3::origin();
    }
    let sum = cluster
        .iter()
        .fold(Vector3::zeros(), |acc, i| acc + i.origin.coords);
    Point3::from(sum / cluster.len() as f64)
}
