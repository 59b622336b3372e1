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

use crate::file::FileContext;
use blobdir_common::error::FsError;
use blobdir_common::fs::Reader;
use blobdir_common::FsResult;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use log::{debug, info};

/// Read handle over a local cache entry that was validated against the remote blob
/// when it was opened.
#[derive(Debug)]
pub struct CachedReader<R> {
    inner: R,
}

impl<R: Reader + Clone> CachedReader<R> {
    /// Opens `name` for reading, refreshing the local entry first when it is missing or
    /// its length no longer matches the remote blob.
    ///
    /// If the blob is gone, the local entry is deleted as well and `FileNotFound` is returned.
    pub async fn open<S, C>(ctx: &FileContext<S, C>, name: &str) -> FsResult<Self>
    where
        S: ObjectStore,
        C: CacheStore<Reader = R>,
    {
        let _guard = ctx.registry.lock(name).await;
        let blob = ctx.blob_name(name);

        let refresh = if !ctx.cache.exists(name).await? {
            true
        } else {
            match Self::remote_len(ctx, name, &blob).await {
                Ok(remote_len) => {
                    let local_len = ctx.cache.length(name).await?;
                    if local_len != remote_len {
                        debug!(
                            "cache entry {} is stale: local {} bytes, remote {} bytes",
                            name, local_len, remote_len
                        );
                    }
                    local_len != remote_len
                }
                Err(e) if e.is_not_found() => {
                    return Err(Self::remove_stale(ctx, name, &blob).await);
                }
                Err(e) => return Err(e),
            }
        };

        if refresh {
            let data = match ctx.store.download(&blob).await {
                Ok(v) => v,
                Err(e) if e.is_not_found() => {
                    return Err(Self::remove_stale(ctx, name, &blob).await);
                }
                Err(e) => return Err(e),
            };
            ctx.metrics.download_bytes.inc_by(data.len() as u64);

            let data = ctx.codec.decode(name, data)?;
            ctx.cache.write_all(name, &data).await?;
            ctx.metrics.cache_refreshes.inc();
            info!("GET {} RETRIEVED {} bytes", blob, data.len());
        } else {
            ctx.metrics.cache_hits.inc();
            debug!("using cached file {}", name);
        }

        let inner = ctx.cache.open_read(name).await?;
        Ok(Self { inner })
    }

    // Length the local entry must have to be fresh. Compressed blobs are compared by the
    // uncompressed length recorded at upload; without it they always refresh.
    async fn remote_len<S, C>(ctx: &FileContext<S, C>, name: &str, blob: &str) -> FsResult<i64>
    where
        S: ObjectStore,
        C: CacheStore<Reader = R>,
    {
        if ctx.codec.is_compressed(name) {
            let status = ctx.store.stat(blob).await?;
            Ok(status.cached_length().unwrap_or(-1))
        } else {
            ctx.store.get_length(blob).await
        }
    }

    async fn remove_stale<S, C>(ctx: &FileContext<S, C>, name: &str, blob: &str) -> FsError
    where
        S: ObjectStore,
        C: CacheStore<Reader = R>,
    {
        if let Err(e) = ctx.cache.delete(name).await {
            return e;
        }
        ctx.metrics.cache_stale_removed.inc();
        info!("blob {} no longer exists, removed local entry {}", blob, name);
        FsError::file_not_found(blob)
    }

    /// A second handle on the same validated bytes, starting at the current position.
    /// The freshness check is not repeated.
    pub fn duplicate(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Reader + Clone> Clone for CachedReader<R> {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl<R: Reader> Reader for CachedReader<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn len(&self) -> i64 {
        self.inner.len()
    }

    fn pos(&self) -> i64 {
        self.inner.pos()
    }

    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.inner.read(buf).await
    }

    async fn seek(&mut self, pos: i64) -> FsResult<()> {
        self.inner.seek(pos).await
    }

    async fn complete(&mut self) -> FsResult<()> {
        self.inner.complete().await
    }
}
