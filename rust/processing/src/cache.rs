// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistent build cache keyed by cluster fingerprint
//!
//! A cluster whose fingerprint was built before (this run or an earlier one)
//! reuses the generated model instead of compiling again. At the end of a run
//! only records used this run are written back, and generated files of every
//! other name are deleted.

use std::fs;
use std::io::{ErrorKind, Write as _};

use propcombine_core::{keyvalues, Property};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::fingerprint::{quantize, ticks_to_f64, Fingerprint, MemberPose};
use crate::instance::{Angles, Instance, SOLID_NONE};
use crate::layout::{split_artifact_name, ArtifactLayout, ARTIFACT_EXTENSIONS, COLLISION_EXTENSION};
use crate::pack::PackageSink;

/// Orientation of every merged instance; member poses are baked in
pub const MERGED_ANGLES: Angles = Angles::new(0.0, 270.0, 0.0);

/// A generated model and its state in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub name: String,
    pub has_collision: bool,
    /// Referenced this run; never carried over from disk
    pub used: bool,
}

impl BuildRecord {
    pub fn new(name: impl Into<String>, has_collision: bool) -> Self {
        Self {
            name: name.into(),
            has_collision,
            used: false,
        }
    }
}

/// Produces the artifacts for a fingerprint on a cache miss
pub trait ClusterBuilder {
    /// Build model `name` from the members of `fingerprint`. Success means the
    /// artifacts are in the layout's output directory.
    fn build(&mut self, name: &str, fingerprint: &Fingerprint, has_collision: bool) -> Result<()>;
}

/// Outcome of [`FingerprintCache::finalize`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeStats {
    pub persisted: usize,
    pub culled: usize,
}

/// Fingerprint to build record map for one level
#[derive(Debug)]
pub struct FingerprintCache {
    layout: ArtifactLayout,
    records: FxHashMap<Fingerprint, BuildRecord>,
    names: FxHashSet<String>,
    /// Builds that failed this run; not retried
    failed: FxHashSet<Fingerprint>,
}

impl FingerprintCache {
    /// Empty cache
    pub fn new(layout: ArtifactLayout) -> Self {
        Self {
            layout,
            records: FxHashMap::default(),
            names: FxHashSet::default(),
            failed: FxHashSet::default(),
        }
    }

    /// Load the persisted cache. Never fails: a missing or damaged file
    /// gives an empty cache.
    pub fn load(layout: ArtifactLayout) -> Self {
        let mut cache = Self::new(layout);
        let path = cache.layout.cache_path();

        let text = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No build cache, starting empty");
                return cache;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read build cache, starting empty");
                return cache;
            }
        };

        match parse_records(&text) {
            Ok(records) => {
                for (fingerprint, record) in records {
                    cache.register(fingerprint, record);
                }
                tracing::info!(count = cache.records.len(), "Found existing merged models");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Build cache is corrupt, starting empty");
            }
        }
        cache
    }

    fn register(&mut self, fingerprint: Fingerprint, record: BuildRecord) {
        if self.records.contains_key(&fingerprint) || !self.names.insert(record.name.clone()) {
            tracing::debug!(model = %record.name, "Ignoring duplicate cache record");
            return;
        }
        self.records.insert(fingerprint, record);
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&BuildRecord> {
        self.records.get(fingerprint)
    }

    pub fn records(&self) -> impl Iterator<Item = (&Fingerprint, &BuildRecord)> {
        self.records.iter()
    }

    /// Merged instance for a cluster, building its model if no record
    /// matches.
    ///
    /// `Ok(None)` means the build failed and the members should stay as they
    /// are. Clusters whose members disagree on render state are rejected as
    /// an internal error.
    pub fn lookup_or_build(
        &mut self,
        cluster: &[Instance],
        builder: &mut dyn ClusterBuilder,
        pack: &mut dyn PackageSink,
    ) -> Result<Option<Instance>> {
        let first = uniform_member(cluster)?;
        let (fingerprint, center) = Fingerprint::of_cluster(cluster);

        if self.failed.contains(&fingerprint) {
            return Ok(None);
        }
        self.drop_if_missing(&fingerprint);

        if !self.records.contains_key(&fingerprint) {
            let has_collision = first.solidity != SOLID_NONE;
            let name = self.allocate_name(&fingerprint);
            if let Err(e) = builder.build(&name, &fingerprint, has_collision) {
                if e.is_internal() {
                    return Err(e);
                }
                tracing::error!(
                    model = %self.layout.model_path(&name),
                    error = %e,
                    "Could not build merged model, leaving props unmerged"
                );
                self.names.remove(&name);
                self.failed.insert(fingerprint);
                return Ok(None);
            }
            self.records
                .insert(fingerprint.clone(), BuildRecord::new(name, has_collision));
        }

        let Some(record) = self.records.get_mut(&fingerprint) else {
            return Err(Error::invariant("build record missing after insert"));
        };
        if !record.used {
            record.used = true;
            pack_artifacts(&self.layout, record, pack)?;
        }

        let mut visleafs: Vec<u16> = cluster
            .iter()
            .flat_map(|i| i.visleafs.iter().copied())
            .collect();
        visleafs.sort_unstable();
        visleafs.dedup();

        Ok(Some(Instance {
            model: self.layout.model_path(&record.name),
            origin: center,
            angles: MERGED_ANGLES,
            skin: 0,
            flags: first.flags,
            solidity: if record.has_collision { first.solidity } else { SOLID_NONE },
            tint: first.tint,
            render_fx: first.render_fx,
            visleafs,
            lighting_origin: Some(center),
            scale: 1.0,
        }))
    }

    /// Forget a record from an earlier run whose model is gone from disk
    fn drop_if_missing(&mut self, fingerprint: &Fingerprint) {
        let stale = match self.records.get(fingerprint) {
            Some(record) if !record.used => !self.layout.artifact_path(&record.name, ".mdl").is_file(),
            _ => false,
        };
        if stale {
            if let Some(record) = self.records.remove(fingerprint) {
                tracing::warn!(model = %record.name, "Cached model is missing, rebuilding");
                self.names.remove(&record.name);
            }
        }
    }

    /// Unused name derived from the fingerprint digest
    fn allocate_name(&mut self, fingerprint: &Fingerprint) -> String {
        let mut salt = 0u32;
        loop {
            let digest = fingerprint.digest(salt);
            let name = format!("merge_{}", &digest[..8]);
            if self.names.insert(name.clone()) {
                return name;
            }
            salt += 1;
        }
    }

    /// Cache file contents: used records only, ordered by name
    pub fn to_text(&self) -> String {
        let mut used: Vec<(&Fingerprint, &BuildRecord)> =
            self.records.iter().filter(|(_, r)| r.used).collect();
        used.sort_by(|a, b| a.1.name.cmp(&b.1.name));

        let props: Vec<Property> = used
            .into_iter()
            .map(|(fingerprint, record)| record_property(fingerprint, record))
            .collect();
        keyvalues::to_string(&props)
    }

    /// Atomically replace the cache file with the used records
    pub fn persist(&self) -> Result<usize> {
        let dir = self.layout.output_dir();
        let path = self.layout.cache_path();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let text = self.to_text();
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| Error::io(&dir, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        Ok(self.records.values().filter(|r| r.used).count())
    }

    /// Persist, then delete artifacts of every model not used this run
    pub fn finalize(self) -> Result<FinalizeStats> {
        let persisted = self.persist()?;
        let used: FxHashSet<&str> = self
            .records
            .values()
            .filter(|r| r.used)
            .map(|r| r.name.as_str())
            .collect();

        let dir = self.layout.output_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(FinalizeStats { persisted, culled: 0 })
            }
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut culled = 0;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let file_name = entry.file_name();
            let Some((name, _)) = file_name.to_str().and_then(split_artifact_name) else {
                continue;
            };
            if used.contains(name) {
                continue;
            }

            let path = entry.path();
            tracing::info!(path = %path.display(), "Culling unused merged model file");
            match fs::remove_file(&path) {
                Ok(()) => culled += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&path, e)),
            }
        }

        Ok(FinalizeStats { persisted, culled })
    }
}

/// Every member must share the state a merged instance carries once
fn uniform_member(cluster: &[Instance]) -> Result<&Instance> {
    let first = cluster
        .first()
        .ok_or_else(|| Error::invariant("empty cluster"))?;
    let odd = cluster.iter().find(|i| {
        i.flags != first.flags
            || i.tint != first.tint
            || i.render_fx != first.render_fx
            || i.solidity != first.solidity
    });
    match odd {
        Some(odd) => Err(Error::invariant(format!(
            "cluster mixes render state: {} and {}",
            first.model, odd.model
        ))),
        None => Ok(first),
    }
}

/// Copy a record's artifacts into the package
fn pack_artifacts(layout: &ArtifactLayout, record: &BuildRecord, pack: &mut dyn PackageSink) -> Result<()> {
    for &ext in ARTIFACT_EXTENSIONS {
        let path = layout.artifact_path(&record.name, ext);

        if ext == COLLISION_EXTENSION && !record.has_collision {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed stale collision model"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&path, e)),
            }
            continue;
        }

        match fs::read(&path) {
            Ok(data) => pack.pack_file(&layout.packed_path(&record.name, ext), data),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&path, e)),
        }
    }
    Ok(())
}

fn format_triple(values: &[i64; 3]) -> String {
    format!(
        "{} {} {}",
        ticks_to_f64(values[0]),
        ticks_to_f64(values[1]),
        ticks_to_f64(values[2])
    )
}

fn record_property(fingerprint: &Fingerprint, record: &BuildRecord) -> Property {
    let mut children = vec![
        Property::string("name", record.name.as_str()),
        Property::string("has_coll", if record.has_collision { "1" } else { "0" }),
    ];
    children.extend(fingerprint.members().iter().map(|m| {
        Property::block(
            "Model",
            vec![
                Property::string("filename", m.model.as_str()),
                Property::string("skin", m.skin.to_string()),
                Property::string("origin", format_triple(&m.offset)),
                Property::string("angles", format_triple(&m.angles)),
            ],
        )
    }));
    Property::block("PropGroup", children)
}

fn parse_records(text: &str) -> Result<Vec<(Fingerprint, BuildRecord)>> {
    keyvalues::parse(text)?
        .iter()
        .map(|group| {
            let name = group
                .get("name")
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::Cache(format!("{} block without a name", group.name)))?;
            let has_collision = group.get("has_coll").is_some_and(parse_bool);
            let members = group
                .find_all("Model")
                .map(parse_member)
                .collect::<Result<Vec<_>>>()?;
            if members.is_empty() {
                return Err(Error::Cache(format!("{} has no members", name)));
            }
            Ok((
                Fingerprint::from_members(members),
                BuildRecord::new(name, has_collision),
            ))
        })
        .collect()
}

fn parse_member(block: &Property) -> Result<MemberPose> {
    let model = block
        .get("filename")
        .ok_or_else(|| Error::Cache("member without a filename".into()))?;
    let skin = match block.get("skin") {
        Some(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::Cache(format!("invalid skin {:?}", s)))?,
        None => 0,
    };
    let origin = parse_triple(block.get("origin"), "origin")?;
    let angles = parse_triple(block.get("angles"), "angles")?;

    Ok(MemberPose {
        offset: origin,
        angles,
        model: propcombine_core::canonical_model_path(model),
        skin,
    })
}

fn parse_triple(value: Option<&str>, field: &str) -> Result<[i64; 3]> {
    let value = value.ok_or_else(|| Error::Cache(format!("member without {}", field)))?;
    let mut out = [0i64; 3];
    let mut parts = value.split_whitespace();
    for slot in out.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| Error::Cache(format!("{} needs three numbers: {:?}", field, value)))?;
        let number = fast_float::parse::<f64, _>(part)
            .map_err(|_| Error::Cache(format!("invalid number in {}: {:?}", field, value)))?;
        *slot = quantize(number);
    }
    if parts.next().is_some() {
        return Err(Error::Cache(format!("{} has extra values: {:?}", field, value)));
    }
    Ok(out)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
