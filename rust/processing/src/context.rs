// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-run lookup state shared by every stage

use std::cell::RefCell;
use std::sync::Arc;

use propcombine_core::canonical_model_path;
use rustc_hash::FxHashMap;

use crate::descriptors::DescriptorMap;
use crate::instance::{ModelInfo, ModelLookup};

/// Memoizing front for a [`ModelLookup`].
///
/// Each model is asked for once per run; misses are remembered too.
pub struct ModelCatalog {
    lookup: Box<dyn ModelLookup>,
    memo: RefCell<FxHashMap<String, Option<Arc<ModelInfo>>>>,
}

impl ModelCatalog {
    pub fn new(lookup: impl ModelLookup + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
            memo: RefCell::new(FxHashMap::default()),
        }
    }

    /// Metadata for a model, by any spelling of its path
    pub fn get(&self, model: &str) -> Option<Arc<ModelInfo>> {
        let key = canonical_model_path(model);
        if let Some(cached) = self.memo.borrow().get(&key) {
            return cached.clone();
        }

        let info = self.lookup.load(&key).map(Arc::new);
        if info.is_none() {
            tracing::debug!(model = %key, "No metadata for model");
        }
        self.memo.borrow_mut().insert(key, info.clone());
        info
    }

    /// Number of distinct models queried so far
    pub fn queried(&self) -> usize {
        self.memo.borrow().len()
    }
}

impl std::fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("queried", &self.queried())
            .finish()
    }
}

/// Build descriptors and model metadata for one combine run
#[derive(Debug)]
pub struct RunContext {
    pub descriptors: DescriptorMap,
    pub models: ModelCatalog,
}

impl RunContext {
    pub fn new(descriptors: DescriptorMap, lookup: impl ModelLookup + 'static) -> Self {
        Self {
            descriptors,
            models: ModelCatalog::new(lookup),
        }
    }
}
