// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::lock::LeaseLock;
use crate::DirectoryMetrics;
use blobdir_common::conf::LockConf;
use blobdir_common::FsResult;
use blobdir_store::object::ObjectStore;
use dashmap::DashMap;
use std::sync::Arc;

/// Hands out one `LeaseLock` per lock name, so every caller in a directory shares the
/// same lease state for that name.
pub struct LockFactory<S: ObjectStore> {
    store: Arc<S>,
    prefix: String,
    conf: LockConf,
    metrics: Arc<DirectoryMetrics>,
    locks: DashMap<String, Arc<LeaseLock<S>>>,
}

impl<S: ObjectStore> LockFactory<S> {
    /// Lock markers are stored as `<prefix><name>`.
    pub fn new(
        store: Arc<S>,
        prefix: impl Into<String>,
        conf: LockConf,
        metrics: Arc<DirectoryMetrics>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            conf,
            metrics,
            locks: DashMap::new(),
        }
    }

    pub fn make_lock(&self, name: &str) -> Arc<LeaseLock<S>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(LeaseLock::new(
                    self.store.clone(),
                    name,
                    format!("{}{}", self.prefix, name),
                    self.conf.clone(),
                    self.metrics.clone(),
                ))
            })
            .clone()
    }

    /// Forcibly breaks `name`, whoever holds it.
    pub async fn clear_lock(&self, name: &str) -> FsResult<()> {
        let lock = self.make_lock(name);
        lock.break_lock().await
    }
}
