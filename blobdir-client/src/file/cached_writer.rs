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
use crate::sync::ResourceGuard;
use blobdir_common::error::FsError;
use blobdir_common::fs::{Reader, Writer};
use blobdir_common::state::{CACHED_LAST_MODIFIED, CACHED_LENGTH};
use blobdir_common::FsResult;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Buffers a new file in the local cache and uploads it as one object on `complete`.
///
/// The resource mutex for the name is held from creation until the writer is completed,
/// cancelled or dropped. Nothing reaches the remote store before `complete`.
pub struct CachedWriter<S: ObjectStore, C: CacheStore> {
    ctx: Arc<FileContext<S, C>>,
    name: String,
    inner: Option<C::Writer>,
    guard: Option<ResourceGuard>,
    len: i64,
}

impl<S: ObjectStore, C: CacheStore> CachedWriter<S, C> {
    pub async fn create(ctx: Arc<FileContext<S, C>>, name: &str) -> FsResult<Self> {
        let guard = ctx.registry.lock(name).await;
        let inner = ctx.cache.open_write(name).await?;
        Ok(Self {
            ctx,
            name: name.to_string(),
            inner: Some(inner),
            guard: Some(guard),
            len: 0,
        })
    }

    fn inner(&mut self) -> FsResult<&mut C::Writer> {
        match self.inner.as_mut() {
            Some(v) => Ok(v),
            None => Err(FsError::common(format!("{}: writer already closed", self.name))),
        }
    }

    async fn upload(&mut self, mut inner: C::Writer) -> FsResult<()> {
        let ctx = self.ctx.clone();
        let blob = ctx.blob_name(&self.name);

        inner.flush().await?;
        self.len = inner.pos();
        inner.complete().await?;

        let mut reader = ctx.cache.open_read(&self.name).await?;
        let data = reader.read_all().await?;
        reader.complete().await?;
        let data = ctx.codec.encode(&self.name, &data)?;
        let upload_len = data.len() as u64;

        ctx.store.upload(&blob, data).await?;

        let mtime = ctx.cache.modified_time(&self.name).await?;
        let mut metadata = HashMap::new();
        metadata.insert(CACHED_LENGTH.to_string(), self.len.to_string());
        metadata.insert(CACHED_LAST_MODIFIED.to_string(), mtime.to_string());
        ctx.store.set_metadata(&blob, metadata).await?;

        ctx.metrics.uploads.inc();
        ctx.metrics.upload_bytes.inc_by(upload_len);
        info!("PUT {} {} bytes ({} stored)", blob, self.len, upload_len);
        Ok(())
    }
}

impl<S: ObjectStore, C: CacheStore> Writer for CachedWriter<S, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn pos(&self) -> i64 {
        match self.inner.as_ref() {
            Some(v) => v.pos(),
            None => self.len,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> FsResult<()> {
        self.inner()?.write(buf).await
    }

    async fn flush(&mut self) -> FsResult<()> {
        self.inner()?.flush().await
    }

    async fn complete(&mut self) -> FsResult<()> {
        let inner = match self.inner.take() {
            Some(v) => v,
            None => return Ok(()),
        };

        let res = self.upload(inner).await;
        if let Err(e) = &res {
            warn!("failed to upload {}: {}", self.name, e);
        }
        self.guard.take();
        res
    }

    async fn cancel(&mut self) -> FsResult<()> {
        let res = match self.inner.take() {
            Some(mut inner) => inner.cancel().await,
            None => Ok(()),
        };
        self.guard.take();
        res
    }
}
