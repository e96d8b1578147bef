// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON level snapshot: the instances to combine and what is known about
//! their models.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use propcombine_core::canonical_model_path;
use propcombine_processing::{Instance, ModelInfo, Region};
use serde::{Deserialize, Serialize};

/// Level contents read from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub regions: Vec<Region>,
    /// Compiled model metadata, by model path in any spelling.
    #[serde(default)]
    pub models: HashMap<String, ModelInfo>,
}

/// Final placement list written back.
#[derive(Debug, Serialize)]
pub struct PlacementList<'a> {
    pub instances: &'a [Instance],
}

impl LevelSnapshot {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading level snapshot {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing level snapshot {}", path.display()))
    }

    /// Split into instances, regions and a model table keyed by canonical path.
    pub fn into_parts(self) -> (Vec<Instance>, Vec<Region>, HashMap<String, ModelInfo>) {
        let models = self
            .models
            .into_iter()
            .map(|(path, info)| (canonical_model_path(&path), info))
            .collect();
        (self.instances, self.regions, models)
    }
}

pub fn write_placements(path: &Path, instances: &[Instance]) -> Result<()> {
    let text = serde_json::to_string_pretty(&PlacementList { instances })?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "instances": [
            {
                "model": "models/props/crate.mdl",
                "origin": [0.0, 16.0, 0.0],
                "angles": { "pitch": 0.0, "yaw": 90.0, "roll": 0.0 },
                "visleafs": [3, 4]
            },
            {
                "model": "props/crate",
                "origin": [64.0, 16.0, 0.0],
                "flags": 2,
                "lighting_origin": [64.0, 16.0, 32.0]
            }
        ],
        "regions": [
            { "id": 255, "bounds": { "mins": [-8.0, -8.0, -8.0], "maxs": [8.0, 8.0, 8.0] } }
        ],
        "models": {
            "Models\\Props\\Crate.mdl": {
                "skins": [["crate"]],
                "cdmaterials": ["models/props/"],
                "contents": 1,
                "surfaceprop": "wood"
            }
        }
    }"#;

    #[test]
    fn test_snapshot_defaults_and_keys() {
        let snapshot: LevelSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        let (instances, regions, models) = snapshot.into_parts();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].tint, [255, 255, 255, 255]);
        assert_eq!(instances[0].scale, 1.0);
        assert_eq!(instances[0].angles.yaw, 90.0);
        assert_eq!(instances[1].flags.bits(), 2);
        assert_eq!(regions[0].group_name(), "FF");
        assert!(models.contains_key("models/props/crate.mdl"));
    }

    #[test]
    fn test_write_placements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let snapshot: LevelSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        write_placements(&path, &snapshot.instances).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["instances"].as_array().unwrap().len(), 2);
    }
}
