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

use blobdir_client::sync::MutexRegistry;
use blobdir_client::BlobDirectory;
use blobdir_common::conf::{BlobDirConf, CompressConf, DirectoryConf};
use blobdir_common::FsResult;
use blobdir_store::cache::{LocalCacheStore, MemoryCacheStore};
use blobdir_store::object::{MemoryObjectStore, OpendalObjectStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub type MemoryDirectory = BlobDirectory<MemoryObjectStore, MemoryCacheStore>;
pub type DiskDirectory = BlobDirectory<MemoryObjectStore, LocalCacheStore>;
pub type OpendalDirectory = BlobDirectory<OpendalObjectStore, LocalCacheStore>;

/// Builds directories over one shared in-memory store.
///
/// Every directory returned is a separate "process": it has its own cache, its own mutex
/// registry and its own lock instances; only the remote store is shared.
///
/// `opendal` is a second shared store, an opendal operator on the memory service, for
/// running the same scenarios through the backend the CLI uses.
pub struct Testing {
    pub store: MemoryObjectStore,
    pub opendal: OpendalObjectStore,
    pub conf: BlobDirConf,
    cache_root: TempDir,
    seq: AtomicUsize,
}

impl Default for Testing {
    fn default() -> Self {
        Self::new("index")
    }
}

impl Testing {
    pub fn new(catalog: &str) -> Self {
        let conf = BlobDirConf {
            directory: DirectoryConf::with_catalog(catalog),
            ..Default::default()
        };

        let cache_root = match tempfile::Builder::new().prefix("blobdir-tests").tempdir() {
            Ok(v) => v,
            Err(e) => panic!("failed to create test cache dir: {}", e),
        };

        let opendal = match OpendalObjectStore::with_conf(&conf.store, &conf.directory.container) {
            Ok(v) => v,
            Err(e) => panic!("failed to create opendal store: {}", e),
        };

        Self {
            store: MemoryObjectStore::new(),
            opendal,
            conf,
            cache_root,
            seq: AtomicUsize::new(0),
        }
    }

    /// Lease timing, as written in a conf file ("60s", "500ms").
    pub fn with_lock(mut self, lease_duration: &str, renew_interval: &str) -> FsResult<Self> {
        self.conf.lock.lease_duration_str = lease_duration.to_string();
        self.conf.lock.renew_interval_str = renew_interval.to_string();
        self.conf.lock.init()?;
        Ok(self)
    }

    pub fn with_compress(mut self, extensions: &[&str]) -> Self {
        self.conf.compress = CompressConf {
            enable: true,
            extensions: extensions.iter().map(|x| x.to_string()).collect(),
        };
        self
    }

    fn conf_for(&self, catalog: Option<&str>) -> BlobDirConf {
        let mut conf = self.conf.clone();
        if let Some(catalog) = catalog {
            conf.directory = DirectoryConf {
                catalog: catalog.to_string(),
                ..conf.directory
            };
            let _ = conf.directory.init();
        }
        conf
    }

    pub fn memory_dir(&self) -> FsResult<MemoryDirectory> {
        BlobDirectory::with_memory_cache(self.conf_for(None), self.store.clone())
    }

    pub fn shard(&self, catalog: &str) -> FsResult<MemoryDirectory> {
        BlobDirectory::with_memory_cache(self.conf_for(Some(catalog)), self.store.clone())
    }

    fn disk_conf(&self) -> BlobDirConf {
        let id = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut conf = self.conf_for(None);
        conf.directory.cache_dir = self
            .cache_root
            .path()
            .join(format!("process-{}", id))
            .to_string_lossy()
            .to_string();
        conf
    }

    /// A directory whose cache lives in a fresh sub-directory of the test's temp dir.
    pub fn disk_dir(&self) -> FsResult<DiskDirectory> {
        BlobDirectory::with_local_cache(self.disk_conf(), self.store.clone())
    }

    /// Like `disk_dir`, on the shared opendal store.
    pub fn opendal_dir(&self) -> FsResult<OpendalDirectory> {
        BlobDirectory::with_local_cache(self.disk_conf(), self.opendal.clone())
    }

    /// Shards of one process sharing a single mutex registry.
    pub fn shards_with_registry(&self, catalogs: &[&str]) -> FsResult<Vec<MemoryDirectory>> {
        let store = Arc::new(self.store.clone());
        let registry = MutexRegistry::new();
        catalogs
            .iter()
            .map(|catalog| {
                BlobDirectory::with_registry(
                    self.conf_for(Some(catalog)),
                    store.clone(),
                    MemoryCacheStore::new(),
                    registry.clone(),
                )
            })
            .collect()
    }
}
