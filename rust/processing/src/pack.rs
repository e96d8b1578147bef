// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Distributable content package

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Receives generated files that must ship with the level
pub trait PackageSink {
    /// Add or replace a file at a content-relative path
    fn pack_file(&mut self, path: &str, data: Vec<u8>);
}

/// In-memory package, ordered by path
#[derive(Debug, Default, Clone)]
pub struct PackList {
    files: BTreeMap<String, Vec<u8>>,
}

impl PackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Write every file below `dir`, returning the count
    pub fn write_to(&self, dir: &Path) -> Result<usize> {
        for (path, data) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::write(&target, data).map_err(|e| Error::io(&target, e))?;
        }
        Ok(self.files.len())
    }
}

impl PackageSink for PackList {
    fn pack_file(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }
}
