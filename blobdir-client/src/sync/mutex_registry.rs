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

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Entries = DashMap<String, Arc<AsyncMutex<()>>>;

/// One async mutex per resource name, created on first use.
///
/// Entries are reference counted: once the last guard is dropped and nobody is waiting,
/// the entry is removed again, so the map only holds names that are in use.
#[derive(Clone, Default)]
pub struct MutexRegistry {
    entries: Arc<Entries>,
}

impl MutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits until `name` is free and holds it until the guard is dropped.
    pub async fn lock(&self, name: &str) -> ResourceGuard {
        let mutex = self.mutex_for(name);
        let guard = mutex.clone().lock_owned().await;
        ResourceGuard {
            name: name.to_string(),
            mutex,
            guard: Some(guard),
            entries: self.entries.clone(),
        }
    }

    pub fn try_lock(&self, name: &str) -> Option<ResourceGuard> {
        let mutex = self.mutex_for(name);
        match mutex.clone().try_lock_owned() {
            Ok(guard) => Some(ResourceGuard {
                name: name.to_string(),
                mutex,
                guard: Some(guard),
                entries: self.entries.clone(),
            }),
            Err(_) => {
                cleanup(&self.entries, name, &mutex);
                None
            }
        }
    }

    /// Number of names currently held or waited on.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// The map holds one reference and the caller another; anything above that is a waiter
// or a holder which will clean up after itself.
fn cleanup(entries: &Entries, name: &str, mutex: &Arc<AsyncMutex<()>>) {
    let _ = entries.remove_if(name, |_, current| {
        Arc::ptr_eq(current, mutex) && Arc::strong_count(current) == 2
    });
}

pub struct ResourceGuard {
    name: String,
    mutex: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    entries: Arc<Entries>,
}

impl ResourceGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        // The owned guard keeps its own reference to the mutex; release it first.
        drop(self.guard.take());
        cleanup(&self.entries, &self.name, &self.mutex);
    }
}
