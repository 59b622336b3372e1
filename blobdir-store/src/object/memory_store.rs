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

use crate::object::object_store::check_name;
use crate::object::ObjectStore;
use blobdir_common::common::LocalTime;
use blobdir_common::error::FsError;
use blobdir_common::state::{LeaseToken, ObjectStatus};
use blobdir_common::FsResult;
use bytes::Bytes;
use dashmap::DashMap;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Stat,
    Download,
    Upload,
    SetMetadata,
    Delete,
    List,
    Lease,
}

struct MemLease {
    token: LeaseToken,
    duration: Duration,
    expires: Instant,
}

impl MemLease {
    fn is_active(&self) -> bool {
        Instant::now() < self.expires
    }
}

struct MemObject {
    data: Bytes,
    mtime: i64,
    metadata: HashMap<String, String>,
    lease: Option<MemLease>,
}

impl MemObject {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            mtime: LocalTime::mills() as i64,
            metadata: HashMap::new(),
            lease: None,
        }
    }

    fn active_lease(&self) -> Option<&MemLease> {
        self.lease.as_ref().filter(|x| x.is_active())
    }
}

/// In-process blob container with lease semantics.
///
/// Lease expiry runs on the tokio clock, so tests with a paused runtime control it.
/// Clones share the same objects, which is how several directories simulate
/// independent processes on one remote store.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, MemObject>>,
    failures: Arc<DashMap<StoreOp, usize>>,
    renewals: Arc<AtomicUsize>,
}

impl MemoryObjectStore {
    pub const SCHEME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` calls of `op` fail with an io error.
    pub fn inject_failure(&self, op: StoreOp, times: usize) {
        if times == 0 {
            self.failures.remove(&op);
        } else {
            self.failures.insert(op, times);
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether a lease is currently active on `name`.
    pub fn is_leased(&self, name: &str) -> bool {
        self.objects
            .get(name)
            .map(|x| x.active_lease().is_some())
            .unwrap_or(false)
    }

    /// Number of `renew_lease` calls received so far, successful or not.
    pub fn renew_count(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }

    fn check_failure(&self, op: StoreOp, name: &str) -> FsResult<()> {
        let mut fail = false;
        let _ = self.failures.remove_if_mut(&op, |_, left| {
            fail = true;
            *left -= 1;
            *left == 0
        });

        if fail {
            Err(FsError::IO(format!("injected {:?} failure on {}", op, name)))
        } else {
            Ok(())
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn scheme(&self) -> &str {
        Self::SCHEME
    }

    async fn stat(&self, name: &str) -> FsResult<ObjectStatus> {
        self.check_failure(StoreOp::Stat, name)?;
        match self.objects.get(name) {
            Some(obj) => Ok(ObjectStatus {
                name: name.to_string(),
                len: obj.data.len() as i64,
                mtime: obj.mtime,
                metadata: obj.metadata.clone(),
            }),
            None => Err(FsError::file_not_found(name)),
        }
    }

    async fn download(&self, name: &str) -> FsResult<Bytes> {
        self.check_failure(StoreOp::Download, name)?;
        match self.objects.get(name) {
            Some(obj) => Ok(obj.data.clone()),
            None => Err(FsError::file_not_found(name)),
        }
    }

    async fn upload(&self, name: &str, data: Bytes) -> FsResult<()> {
        check_name(name)?;
        self.check_failure(StoreOp::Upload, name)?;

        let mut entry = self
            .objects
            .entry(name.to_string())
            .or_insert_with(|| MemObject::new(Bytes::new()));
        entry.data = data;
        entry.mtime = LocalTime::mills() as i64;
        entry.metadata.clear();
        Ok(())
    }

    async fn upload_if_absent(&self, name: &str, data: Bytes) -> FsResult<bool> {
        check_name(name)?;
        self.check_failure(StoreOp::Upload, name)?;

        let mut created = false;
        self.objects.entry(name.to_string()).or_insert_with(|| {
            created = true;
            MemObject::new(data)
        });
        Ok(created)
    }

    async fn set_metadata(&self, name: &str, metadata: HashMap<String, String>) -> FsResult<()> {
        self.check_failure(StoreOp::SetMetadata, name)?;
        match self.objects.get_mut(name) {
            Some(mut obj) => {
                obj.metadata = metadata;
                Ok(())
            }
            None => Err(FsError::file_not_found(name)),
        }
    }

    async fn delete(&self, name: &str) -> FsResult<()> {
        self.check_failure(StoreOp::Delete, name)?;
        if let Some(obj) = self.objects.get(name) {
            if obj.active_lease().is_some() {
                return Err(FsError::lease_conflict(format!(
                    "{} has an active lease and cannot be deleted",
                    name
                )));
            }
        }
        self.objects.remove(name);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        self.check_failure(StoreOp::List, prefix)?;
        let mut names: Vec<String> = self
            .objects
            .iter()
            .filter(|x| x.key().starts_with(prefix))
            .map(|x| x.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn acquire_lease(&self, name: &str, duration: Duration) -> FsResult<LeaseToken> {
        self.check_failure(StoreOp::Lease, name)?;
        let mut obj = match self.objects.get_mut(name) {
            Some(obj) => obj,
            None => return Err(FsError::file_not_found(name)),
        };

        if obj.active_lease().is_some() {
            return Err(FsError::lease_conflict(name));
        }

        let token = LeaseToken::generate();
        obj.lease = Some(MemLease {
            token: token.clone(),
            duration,
            expires: Instant::now() + duration,
        });
        debug!("memory store: lease {} acquired on {} for {:?}", token, name, duration);
        Ok(token)
    }

    async fn renew_lease(&self, name: &str, token: &LeaseToken) -> FsResult<()> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        self.check_failure(StoreOp::Lease, name)?;
        let mut obj = match self.objects.get_mut(name) {
            Some(obj) => obj,
            None => return Err(FsError::file_not_found(name)),
        };

        // An expired lease can still be renewed by its holder as long as nobody took it over.
        match obj.lease.as_mut() {
            Some(lease) if &lease.token == token => {
                lease.expires = Instant::now() + lease.duration;
                Ok(())
            }
            _ => Err(FsError::lease_lost(format!("{} is not held by {}", name, token))),
        }
    }

    async fn release_lease(&self, name: &str, token: &LeaseToken) -> FsResult<()> {
        self.check_failure(StoreOp::Lease, name)?;
        let mut obj = match self.objects.get_mut(name) {
            Some(obj) => obj,
            None => return Err(FsError::file_not_found(name)),
        };

        let held = matches!(obj.lease.as_ref(), Some(lease) if &lease.token == token);
        if held {
            obj.lease = None;
            Ok(())
        } else {
            Err(FsError::lease_lost(format!("{} is not held by {}", name, token)))
        }
    }

    async fn break_lease(&self, name: &str) -> FsResult<()> {
        self.check_failure(StoreOp::Lease, name)?;
        match self.objects.get_mut(name) {
            Some(mut obj) => {
                obj.lease = None;
                Ok(())
            }
            None => Err(FsError::file_not_found(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_resets_metadata() {
        let store = MemoryObjectStore::new();
        store.upload("a/b", Bytes::from_static(b"hello")).await.unwrap();

        let mut meta = HashMap::new();
        meta.insert("k".to_string(), "v".to_string());
        store.set_metadata("a/b", meta).await.unwrap();
        assert_eq!(store.get_metadata("a/b").await.unwrap().len(), 1);
        assert_eq!(store.get_length("a/b").await.unwrap(), 5);

        store.upload("a/b", Bytes::from_static(b"hi")).await.unwrap();
        assert!(store.get_metadata("a/b").await.unwrap().is_empty());
        assert_eq!(store.download("a/b").await.unwrap(), Bytes::from_static(b"hi"));

        assert!(store.stat("a/c").await.unwrap_err().is_not_found());
        assert!(!store.exists("a/c").await.unwrap());
        assert!(store.upload("", Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn upload_if_absent() {
        let store = MemoryObjectStore::new();
        assert!(store.upload_if_absent("lock", Bytes::from_static(b"1")).await.unwrap());
        assert!(!store.upload_if_absent("lock", Bytes::from_static(b"2")).await.unwrap());
        assert_eq!(store.download("lock").await.unwrap(), Bytes::from_static(b"1"));
    }

    #[tokio::test]
    async fn list_prefix() {
        let store = MemoryObjectStore::new();
        for name in ["s1/a", "s1/b", "s2/a", "s1x"] {
            store.upload(name, Bytes::new()).await.unwrap();
        }
        assert_eq!(store.list("s1/").await.unwrap(), vec!["s1/a", "s1/b"]);
        assert_eq!(store.list("").await.unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn lease_lifecycle() {
        let store = MemoryObjectStore::new();
        let lease = Duration::from_secs(60);

        let err = store.acquire_lease("lock", lease).await.unwrap_err();
        assert!(err.is_not_found());

        store.upload("lock", Bytes::from_static(b"lock")).await.unwrap();
        let token = store.acquire_lease("lock", lease).await.unwrap();
        assert!(store.is_leased("lock"));
        assert!(store.acquire_lease("lock", lease).await.unwrap_err().is_conflict());
        assert!(store.delete("lock").await.unwrap_err().is_conflict());

        // Renewal keeps it alive past the original window.
        tokio::time::advance(Duration::from_secs(45)).await;
        store.renew_lease("lock", &token).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(store.is_leased("lock"));

        let other = LeaseToken::generate();
        assert!(store.release_lease("lock", &other).await.unwrap_err().is_lease_error());

        // Expired leases can be taken over.
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!store.is_leased("lock"));
        let token2 = store.acquire_lease("lock", lease).await.unwrap();
        assert!(store.renew_lease("lock", &token).await.is_err());

        store.break_lease("lock").await.unwrap();
        assert!(!store.is_leased("lock"));
        assert!(store.release_lease("lock", &token2).await.is_err());
        store.delete("lock").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryObjectStore::new();
        store.inject_failure(StoreOp::Upload, 2);
        assert!(store.upload("a", Bytes::new()).await.is_err());
        assert!(store.upload("a", Bytes::new()).await.is_err());
        store.upload("a", Bytes::new()).await.unwrap();
    }
}
