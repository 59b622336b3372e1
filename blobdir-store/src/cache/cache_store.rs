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

use blobdir_common::error::FsError;
use blobdir_common::fs::{Reader, Writer};
use blobdir_common::state::CacheStatus;
use blobdir_common::FsResult;
use std::future::Future;

/// Local replica storage, one flat namespace of file names.
///
/// Writers become visible only on `complete`; a reader never sees a partially written entry.
/// Readers are cheap to clone and clones share the underlying bytes.
#[trait_variant::make(Send)]
pub trait CacheStore: Send + Sync + 'static {
    type Reader: Reader + Clone + Sync + 'static;
    type Writer: Writer + Sync + 'static;

    async fn exists(&self, name: &str) -> FsResult<bool>;

    async fn status(&self, name: &str) -> FsResult<CacheStatus>;

    fn length(&self, name: &str) -> impl Future<Output = FsResult<i64>> + Send {
        async move { Ok(self.status(name).await?.len) }
    }

    fn modified_time(&self, name: &str) -> impl Future<Output = FsResult<i64>> + Send {
        async move { Ok(self.status(name).await?.mtime) }
    }

    async fn open_read(&self, name: &str) -> FsResult<Self::Reader>;

    /// Starts a new entry; any existing entry stays readable until the writer completes.
    async fn open_write(&self, name: &str) -> FsResult<Self::Writer>;

    /// Deleting a missing entry succeeds.
    async fn delete(&self, name: &str) -> FsResult<()>;

    async fn list(&self) -> FsResult<Vec<String>>;

    fn write_all(&self, name: &str, data: &[u8]) -> impl Future<Output = FsResult<()>> + Send {
        async move {
            let mut writer = self.open_write(name).await?;
            if let Err(e) = writer.write(data).await {
                let _ = writer.cancel().await;
                return Err(e);
            }
            writer.complete().await
        }
    }

    fn clear(&self) -> impl Future<Output = FsResult<()>> + Send {
        async move {
            for name in self.list().await? {
                self.delete(&name).await?;
            }
            Ok(())
        }
    }
}

pub(crate) fn check_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(FsError::invalid_path(name, "cache entry name must be a plain file name"));
    }
    Ok(())
}
