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
use blobdir_common::state::{LeaseToken, ObjectStatus};
use blobdir_common::FsResult;
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Flat, remote blob container.
///
/// Names are relative to the container and may contain `/`. Every backend reports a
/// missing blob as `FsError::FileNotFound` and a lease held by someone else as
/// `FsError::LeaseConflict`.
#[trait_variant::make(Send)]
pub trait ObjectStore: Send + Sync + 'static {
    fn scheme(&self) -> &str;

    async fn stat(&self, name: &str) -> FsResult<ObjectStatus>;

    fn exists(&self, name: &str) -> impl Future<Output = FsResult<bool>> + Send {
        async move {
            match self.stat(name).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        }
    }

    fn get_length(&self, name: &str) -> impl Future<Output = FsResult<i64>> + Send {
        async move { Ok(self.stat(name).await?.len) }
    }

    fn get_metadata(
        &self,
        name: &str,
    ) -> impl Future<Output = FsResult<HashMap<String, String>>> + Send {
        async move { Ok(self.stat(name).await?.metadata) }
    }

    async fn download(&self, name: &str) -> FsResult<Bytes>;

    /// Replaces the whole blob. User metadata is reset.
    async fn upload(&self, name: &str, data: Bytes) -> FsResult<()>;

    /// Creates the blob only if it does not exist yet. Returns false if it already existed.
    async fn upload_if_absent(&self, name: &str, data: Bytes) -> FsResult<bool>;

    async fn set_metadata(&self, name: &str, metadata: HashMap<String, String>) -> FsResult<()>;

    /// Deleting a missing blob succeeds.
    async fn delete(&self, name: &str) -> FsResult<()>;

    /// Names of every blob starting with `prefix`, at any depth.
    async fn list(&self, prefix: &str) -> FsResult<Vec<String>>;

    async fn acquire_lease(&self, name: &str, duration: Duration) -> FsResult<LeaseToken>;

    async fn renew_lease(&self, name: &str, token: &LeaseToken) -> FsResult<()>;

    async fn release_lease(&self, name: &str, token: &LeaseToken) -> FsResult<()>;

    /// Ends any active lease immediately, whoever holds it.
    async fn break_lease(&self, name: &str) -> FsResult<()>;
}

pub(crate) fn check_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
        return Err(FsError::invalid_path(name, "blob name must be a non-empty relative file name"));
    }
    Ok(())
}
