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

use crate::file::{CachedReader, CachedWriter, FileContext};
use crate::lock::{LeaseLock, LockFactory};
use crate::sync::MutexRegistry;
use crate::DirectoryMetrics;
use blobdir_common::conf::BlobDirConf;
use blobdir_common::FsResult;
use blobdir_store::cache::{CacheStore, LocalCacheStore, MemoryCacheStore};
use blobdir_store::object::ObjectStore;
use log::info;
use std::sync::Arc;

/// A directory of files whose authoritative copies live in a remote blob container.
///
/// Files are named without the directory's sub-directory; the remote name is
/// `<sub_directory>/<name>`. Reads go through the local cache, which is refreshed whenever
/// its length disagrees with the remote blob. New files are written locally and uploaded
/// when the writer completes.
pub struct BlobDirectory<S: ObjectStore, C: CacheStore> {
    ctx: Arc<FileContext<S, C>>,
    locks: LockFactory<S>,
}

impl<S: ObjectStore> BlobDirectory<S, LocalCacheStore> {
    /// Caches under `[directory].cache_dir`, or `<temp>/BlobDirectory/<name>` when unset.
    pub fn with_local_cache(conf: BlobDirConf, store: S) -> FsResult<Self> {
        let cache = LocalCacheStore::new(conf.directory.cache_path())?;
        Self::new(conf, store, cache)
    }
}

impl<S: ObjectStore> BlobDirectory<S, MemoryCacheStore> {
    pub fn with_memory_cache(conf: BlobDirConf, store: S) -> FsResult<Self> {
        Self::new(conf, store, MemoryCacheStore::new())
    }
}

impl<S: ObjectStore, C: CacheStore> BlobDirectory<S, C> {
    pub fn new(conf: BlobDirConf, store: S, cache: C) -> FsResult<Self> {
        Self::with_registry(conf, Arc::new(store), cache, MutexRegistry::new())
    }

    /// Several directories (shards) can share one store handle and one mutex registry.
    pub fn with_registry(
        conf: BlobDirConf,
        store: Arc<S>,
        cache: C,
        registry: MutexRegistry,
    ) -> FsResult<Self> {
        let metrics = Arc::new(DirectoryMetrics::new(&conf.directory.name())?);
        let ctx = FileContext::new(conf, store, cache, registry, metrics);
        let locks = LockFactory::new(
            ctx.store.clone(),
            ctx.blob_prefix(),
            ctx.conf.lock.clone(),
            ctx.metrics.clone(),
        );

        info!(
            "blob directory {} on {} store",
            ctx.conf.directory.name(),
            ctx.store.scheme()
        );
        Ok(Self {
            ctx: Arc::new(ctx),
            locks,
        })
    }

    pub fn name(&self) -> String {
        self.ctx.conf.directory.name()
    }

    pub fn conf(&self) -> &BlobDirConf {
        &self.ctx.conf
    }

    pub fn context(&self) -> &Arc<FileContext<S, C>> {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<S> {
        &self.ctx.store
    }

    pub fn cache(&self) -> &C {
        &self.ctx.cache
    }

    pub fn metrics(&self) -> &DirectoryMetrics {
        &self.ctx.metrics
    }

    pub fn blob_name(&self, name: &str) -> String {
        self.ctx.blob_name(name)
    }

    /// Files directly inside this directory, remote view.
    pub async fn list_all(&self) -> FsResult<Vec<String>> {
        let prefix = self.ctx.blob_prefix();
        let names = self.ctx.store.list(&prefix).await?;
        let res = names
            .iter()
            .filter_map(|x| x.strip_prefix(prefix.as_str()))
            .filter(|x| !x.is_empty() && !x.contains('/'))
            .map(|x| x.to_string())
            .collect();
        Ok(res)
    }

    pub async fn file_exists(&self, name: &str) -> FsResult<bool> {
        self.ctx.store.exists(&self.blob_name(name)).await
    }

    /// Length of the file as readers will see it: the recorded original length when the
    /// blob carries one, the stored length otherwise.
    pub async fn file_length(&self, name: &str) -> FsResult<i64> {
        let status = self.ctx.store.stat(&self.blob_name(name)).await?;
        Ok(status.logical_len())
    }

    /// Remote last-modified time in milliseconds.
    pub async fn file_modified(&self, name: &str) -> FsResult<i64> {
        let status = self.ctx.store.stat(&self.blob_name(name)).await?;
        Ok(status.mtime)
    }

    /// Deletes the blob and the local entry.
    pub async fn delete_file(&self, name: &str) -> FsResult<()> {
        let _guard = self.ctx.registry.lock(name).await;
        let blob = self.blob_name(name);
        self.ctx.store.delete(&blob).await?;
        self.ctx.cache.delete(name).await?;
        info!("DELETE {}", blob);
        Ok(())
    }

    pub async fn open_input(&self, name: &str) -> FsResult<CachedReader<C::Reader>> {
        CachedReader::open(&self.ctx, name).await
    }

    pub async fn create_output(&self, name: &str) -> FsResult<CachedWriter<S, C>> {
        CachedWriter::create(self.ctx.clone(), name).await
    }

    /// Drops every local entry; the next open of each file downloads it again.
    pub async fn clear_cache(&self) -> FsResult<()> {
        self.ctx.cache.clear().await?;
        info!("cleared local cache of {}", self.name());
        Ok(())
    }

    pub fn make_lock(&self, name: &str) -> Arc<LeaseLock<S>> {
        self.locks.make_lock(name)
    }

    pub async fn clear_lock(&self, name: &str) -> FsResult<()> {
        self.locks.clear_lock(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::Lock;
    use blobdir_common::conf::{CompressConf, DirectoryConf};
    use blobdir_common::fs::{Reader, Writer};
    use blobdir_common::state::{CACHED_LAST_MODIFIED, CACHED_LENGTH};
    use blobdir_store::object::{MemoryObjectStore, StoreOp};
    use bytes::Bytes;

    fn conf(catalog: &str) -> BlobDirConf {
        BlobDirConf {
            directory: DirectoryConf::with_catalog(catalog),
            ..Default::default()
        }
    }

    fn memory_dir(store: &MemoryObjectStore, catalog: &str) -> BlobDirectory<MemoryObjectStore, MemoryCacheStore> {
        BlobDirectory::with_memory_cache(conf(catalog), store.clone()).unwrap()
    }

    async fn write_file<S: ObjectStore, C: CacheStore>(dir: &BlobDirectory<S, C>, name: &str, data: &[u8]) {
        let mut writer = dir.create_output(name).await.unwrap();
        writer.write(data).await.unwrap();
        writer.complete().await.unwrap();
    }

    #[tokio::test]
    async fn write_close_read() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index/shard1");

        write_file(&dir, "_0.cfs", b"hello world").await;
        assert_eq!(dir.blob_name("_0.cfs"), "shard1/_0.cfs");

        let meta = store.get_metadata("shard1/_0.cfs").await.unwrap();
        assert_eq!(meta.get(CACHED_LENGTH).map(|x| x.as_str()), Some("11"));
        assert!(meta.contains_key(CACHED_LAST_MODIFIED));

        let mut reader = dir.open_input("_0.cfs").await.unwrap();
        assert_eq!(reader.len(), 11);
        assert_eq!(reader.read_all().await.unwrap(), b"hello world");
        assert_eq!(dir.metrics().cache_hits.get(), 1);
        assert_eq!(dir.metrics().cache_refreshes.get(), 0);

        assert_eq!(dir.list_all().await.unwrap(), vec!["_0.cfs"]);
        assert!(dir.file_exists("_0.cfs").await.unwrap());
        assert_eq!(dir.file_length("_0.cfs").await.unwrap(), 11);
        assert!(dir.file_modified("_0.cfs").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn stale_entry_is_refreshed() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index");

        write_file(&dir, "segments_1", b"v1").await;
        store.upload("segments_1", Bytes::from_static(b"version-2")).await.unwrap();

        let mut reader = dir.open_input("segments_1").await.unwrap();
        assert_eq!(reader.read_all().await.unwrap(), b"version-2");
        assert_eq!(dir.cache().length("segments_1").await.unwrap(), 9);
        assert_eq!(dir.metrics().cache_refreshes.get(), 1);
        assert_eq!(dir.metrics().download_bytes.get(), 9);
    }

    #[tokio::test]
    async fn vanished_blob_removes_local_entry() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index");

        write_file(&dir, "_1.fdt", b"abc").await;
        store.delete("_1.fdt").await.unwrap();

        let err = dir.open_input("_1.fdt").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!dir.cache().exists("_1.fdt").await.unwrap());
        assert_eq!(dir.metrics().cache_stale_removed.get(), 1);

        assert!(dir.open_input("_1.fdt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn duplicate_shares_position() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index");
        write_file(&dir, "a", b"0123456789").await;

        let mut reader = dir.open_input("a").await.unwrap();
        reader.seek(4).await.unwrap();
        let mut dup = reader.duplicate();
        assert_eq!(dup.pos(), 4);
        assert_eq!(dup.read_all().await.unwrap(), b"456789");
        assert_eq!(reader.pos(), 4);
        // No second freshness check.
        assert_eq!(dir.metrics().cache_hits.get(), 1);
    }

    #[tokio::test]
    async fn failed_upload_keeps_local_bytes() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index");
        store.inject_failure(StoreOp::Upload, 1);

        let mut writer = dir.create_output("_2.cfs").await.unwrap();
        writer.write(b"payload").await.unwrap();
        assert!(writer.complete().await.is_err());

        assert!(!dir.file_exists("_2.cfs").await.unwrap());
        assert_eq!(dir.cache().length("_2.cfs").await.unwrap(), 7);
        // The resource mutex was released.
        assert!(dir.context().registry().is_empty());
    }

    #[tokio::test]
    async fn compressed_extensions() {
        let store = MemoryObjectStore::new();
        let mut conf = conf("index");
        conf.compress = CompressConf {
            enable: true,
            extensions: vec!["cfs".to_string()],
        };
        let dir = BlobDirectory::with_memory_cache(conf.clone(), store.clone()).unwrap();

        let data = "segment ".repeat(512);
        write_file(&dir, "_3.cfs", data.as_bytes()).await;
        assert!(store.get_length("_3.cfs").await.unwrap() < data.len() as i64);
        assert_eq!(dir.file_length("_3.cfs").await.unwrap(), data.len() as i64);

        // A second process with an empty cache sees the original bytes.
        let other = BlobDirectory::with_memory_cache(conf, store.clone()).unwrap();
        let mut reader = other.open_input("_3.cfs").await.unwrap();
        assert_eq!(reader.read_all().await.unwrap(), data.as_bytes());

        // Cached copy is fresh against CachedLength, not the stored length.
        other.open_input("_3.cfs").await.unwrap();
        assert_eq!(other.metrics().cache_hits.get(), 1);
    }

    #[tokio::test]
    async fn delete_and_clear_cache() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index");
        write_file(&dir, "a", b"1").await;
        write_file(&dir, "b", b"2").await;

        dir.delete_file("a").await.unwrap();
        assert_eq!(dir.list_all().await.unwrap(), vec!["b"]);
        assert!(!dir.cache().exists("a").await.unwrap());
        dir.delete_file("a").await.unwrap();

        dir.clear_cache().await.unwrap();
        assert!(dir.cache().list().await.unwrap().is_empty());
        let mut reader = dir.open_input("b").await.unwrap();
        assert_eq!(reader.read_all().await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn list_only_direct_children() {
        let store = MemoryObjectStore::new();
        let root = memory_dir(&store, "index");
        let shard = memory_dir(&store, "index/shard1");
        let nested = memory_dir(&store, "index/shard1/deeper");

        write_file(&root, "root.txt", b"r").await;
        write_file(&shard, "s.txt", b"s").await;
        write_file(&nested, "n.txt", b"n").await;

        assert_eq!(root.list_all().await.unwrap(), vec!["root.txt"]);
        assert_eq!(shard.list_all().await.unwrap(), vec!["s.txt"]);
        assert_eq!(nested.list_all().await.unwrap(), vec!["n.txt"]);
    }

    #[tokio::test]
    async fn disk_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::new();
        let mut conf = conf("index/disk");
        conf.directory.cache_dir = tmp.path().join("cache").to_string_lossy().to_string();

        let dir = BlobDirectory::with_local_cache(conf, store.clone()).unwrap();
        write_file(&dir, "_0.si", b"segment info").await;
        assert!(tmp.path().join("cache").join("_0.si").exists());

        let mut reader = dir.open_input("_0.si").await.unwrap();
        assert_eq!(reader.read_all().await.unwrap(), b"segment info");
    }

    #[tokio::test]
    async fn locks_are_shared_per_name() {
        let store = MemoryObjectStore::new();
        let dir = memory_dir(&store, "index/shard1");

        let l1 = dir.make_lock("write.lock");
        let l2 = dir.make_lock("write.lock");
        assert!(Arc::ptr_eq(&l1, &l2));
        assert_eq!(l1.blob_name(), "shard1/write.lock");

        assert!(l1.obtain().await.unwrap());
        assert!(l2.is_locked().await.unwrap());
        assert_eq!(
            store.download("shard1/write.lock").await.unwrap(),
            Bytes::from_static(b"write.lock")
        );

        dir.clear_lock("write.lock").await.unwrap();
        assert!(!l1.is_held().await);
        assert!(!store.exists("shard1/write.lock").await.unwrap());
    }
}
