// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static prop instances and compiled model metadata

use std::collections::{BTreeSet, HashMap};

use bitflags::bitflags;
use nalgebra::{Matrix3, Point3};
use propcombine_core::normalize_separators;
use propcombine_geometry::rotation_matrix;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Not solid
pub const SOLID_NONE: u8 = 0;
/// Collision from the model's physics mesh
pub const SOLID_VPHYSICS: u8 = 6;

/// Orientation in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Angles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Angles {
    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Rotation matrix taking model space into world space
    pub fn matrix(&self) -> Matrix3<f64> {
        rotation_matrix(self.pitch, self.yaw, self.roll)
    }
}

bitflags! {
    /// Per-instance rendering flags as stored in the level
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct InstanceFlags: u32 {
        const FADES = 0x1;
        /// The instance carries its own lighting origin
        const USE_LIGHTING_ORIGIN = 0x2;
        const NO_DRAW = 0x4;
        const IGNORE_NORMALS = 0x8;
        const NO_SHADOW = 0x10;
        const NO_SHADOW_DEPTH = 0x40;
    }
}

impl Default for InstanceFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// Stored as the raw integer; bits this crate doesn't name are kept as-is.
impl Serialize for InstanceFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for InstanceFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_bits_retain)
    }
}

fn default_tint() -> [u8; 4] {
    [255, 255, 255, 255]
}

fn default_scale() -> f64 {
    1.0
}

/// One placed static prop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub model: String,
    pub origin: Point3<f64>,
    #[serde(default)]
    pub angles: Angles,
    #[serde(default)]
    pub skin: u32,
    #[serde(default)]
    pub flags: InstanceFlags,
    #[serde(default)]
    pub solidity: u8,
    #[serde(default = "default_tint")]
    pub tint: [u8; 4],
    #[serde(default)]
    pub render_fx: u8,
    /// Visibility cells the instance touches
    #[serde(default)]
    pub visleafs: Vec<u16>,
    #[serde(default)]
    pub lighting_origin: Option<Point3<f64>>,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Instance {
    /// Instance with default rendering state
    pub fn new(model: impl Into<String>, origin: Point3<f64>, angles: Angles) -> Self {
        Self {
            model: model.into(),
            origin,
            angles,
            skin: 0,
            flags: InstanceFlags::default(),
            solidity: SOLID_VPHYSICS,
            tint: default_tint(),
            render_fx: 0,
            visleafs: Vec::new(),
            lighting_origin: None,
            scale: 1.0,
        }
    }
}

/// Metadata read from a compiled model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Texture table per skin; skin 0 is the one baked into the meshes
    #[serde(default)]
    pub skins: Vec<Vec<String>>,
    /// Material search folders
    #[serde(default)]
    pub cdmaterials: Vec<String>,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub contents: u32,
    #[serde(default)]
    pub surfaceprop: String,
}

impl ModelInfo {
    /// Fully qualified textures used by a skin, case-folded.
    ///
    /// Skins outside the table fall back to skin 0.
    pub fn skin_textures(&self, skin: u32) -> BTreeSet<String> {
        let Some(textures) = self
            .skins
            .get(skin as usize)
            .or_else(|| self.skins.first())
        else {
            return BTreeSet::new();
        };

        self.cdmaterials
            .iter()
            .flat_map(|folder| {
                textures.iter().map(move |tex| {
                    normalize_separators(&format!("{}{}", folder, tex)).to_lowercase()
                })
            })
            .collect()
    }

    /// Material renames that turn skin 0 geometry into the given skin.
    ///
    /// Keys are case-folded skin 0 texture names. Empty for skin 0 and for
    /// skins the model doesn't have.
    pub fn skin_substitutions(&self, skin: u32) -> FxHashMap<String, String> {
        let skin = skin as usize;
        if skin == 0 || skin >= self.skins.len() {
            return FxHashMap::default();
        }
        self.skins[0]
            .iter()
            .zip(&self.skins[skin])
            .map(|(from, to)| (from.to_lowercase(), to.clone()))
            .collect()
    }
}

/// Source of compiled model metadata, queried by canonical model path
pub trait ModelLookup {
    fn load(&self, model: &str) -> Option<ModelInfo>;
}

impl ModelLookup for HashMap<String, ModelInfo> {
    fn load(&self, model: &str) -> Option<ModelInfo> {
        self.get(model).cloned()
    }
}

impl ModelLookup for FxHashMap<String, ModelInfo> {
    fn load(&self, model: &str) -> Option<ModelInfo> {
        self.get(model).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crate_model() -> ModelInfo {
        ModelInfo {
            skins: vec![
                vec!["Crate_Clean".into(), "crate_trim".into()],
                vec!["crate_dirty".into(), "crate_trim".into()],
            ],
            cdmaterials: vec!["models\\props\\".into(), "shared/".into()],
            surfaceprop: "wood".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_skin_textures_qualified() {
        let textures = crate_model().skin_textures(1);
        assert!(textures.contains("models/props/crate_dirty"));
        assert!(textures.contains("shared/crate_trim"));
        assert_eq!(textures.len(), 4);
    }

    #[test]
    fn test_skin_textures_out_of_range() {
        let model = crate_model();
        assert_eq!(model.skin_textures(7), model.skin_textures(0));
    }

    #[test]
    fn test_skin_substitutions() {
        let model = crate_model();
        assert!(model.skin_substitutions(0).is_empty());
        assert!(model.skin_substitutions(2).is_empty());

        let subs = model.skin_substitutions(1);
        assert_eq!(subs.get("crate_clean").map(String::as_str), Some("crate_dirty"));
        assert_eq!(subs.get("crate_trim").map(String::as_str), Some("crate_trim"));
    }

    #[test]
    fn test_flags() {
        let flags = InstanceFlags::FADES | InstanceFlags::USE_LIGHTING_ORIGIN;
        assert!(flags.contains(InstanceFlags::USE_LIGHTING_ORIGIN));
        assert!(!flags.contains(InstanceFlags::NO_DRAW));
        assert_eq!(flags.bits(), 3);
    }

    #[test]
    fn test_flags_keep_unknown_bits() {
        let json = r#"{"model": "props/crate", "origin": [0.0, 0.0, 0.0], "flags": 131}"#;
        let mut instance: Instance = serde_json::from_str(json).unwrap();
        assert!(instance.flags.contains(InstanceFlags::USE_LIGHTING_ORIGIN));
        assert_eq!(instance.flags.bits(), 131);

        instance.flags |= InstanceFlags::NO_DRAW;
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["flags"], 135);
    }
}
