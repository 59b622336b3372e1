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
use blobdir_common::common::{LocalTime, Utils};
use blobdir_common::conf::StoreConf;
use blobdir_common::error::FsError;
use blobdir_common::state::{LeaseToken, ObjectStatus};
use blobdir_common::FsResult;
use bytes::Bytes;
use log::{debug, info};
use opendal::services::{Azblob, Fs, Memory, S3};
use opendal::{
    layers::{LoggingLayer, RetryLayer, TimeoutLayer},
    ErrorKind, Operator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

const META_SUFFIX: &str = ".meta";
const LEASE_SUFFIX: &str = ".lease";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    token: String,
    duration_ms: u64,
    expires_at: i64,
}

impl LeaseRecord {
    fn new(token: &LeaseToken, duration: Duration) -> Self {
        let duration_ms = duration.as_millis() as u64;
        Self {
            token: token.to_string(),
            duration_ms,
            expires_at: LocalTime::mills() as i64 + duration_ms as i64,
        }
    }

    fn is_active(&self) -> bool {
        (LocalTime::mills() as i64) < self.expires_at
    }

    // Left behind by release: inactive and matching no token.
    fn released() -> Self {
        Self {
            token: String::new(),
            duration_ms: 0,
            expires_at: 0,
        }
    }

    fn renew(&mut self) {
        self.expires_at = LocalTime::mills() as i64 + self.duration_ms as i64;
    }
}

fn store_err(e: opendal::Error, name: &str) -> FsError {
    match e.kind() {
        ErrorKind::NotFound => FsError::file_not_found(name),
        ErrorKind::ConditionNotMatch | ErrorKind::AlreadyExists => FsError::lease_conflict(name),
        _ => FsError::store(format!("{}: {}", name, e)),
    }
}

/// Object store over an opendal `Operator`.
///
/// Opendal exposes neither user metadata nor leases uniformly, so both live in JSON
/// sidecar objects next to the blob: `<name>.meta` and `<name>.lease`. Names with those
/// suffixes are reserved. Lease records are written with `if_not_exists`/`if_match` when
/// the backend supports conditional writes. Otherwise lease updates are serialized among
/// clones of this store and are best effort across processes. Sidecars never show up in
/// `list`.
#[derive(Clone)]
pub struct OpendalObjectStore {
    operator: Operator,
    scheme: String,
    conditional: bool,
    lease_mutex: Arc<AsyncMutex<()>>,
}

impl OpendalObjectStore {
    pub fn new(operator: Operator, scheme: impl Into<String>) -> Self {
        let cap = operator.info().full_capability();
        let conditional = cap.write_with_if_not_exists && cap.write_with_if_match;
        Self {
            operator,
            scheme: scheme.into(),
            conditional,
            lease_mutex: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Builds an operator for `container` from the `[store]` section.
    pub fn with_conf(conf: &StoreConf, container: &str) -> FsResult<Self> {
        let scheme = conf.scheme.to_lowercase();
        let base_op = match scheme.as_str() {
            StoreConf::SCHEME_MEMORY => {
                let builder = Memory::default().root(&format!("/{}", container));
                Operator::new(builder).map_err(|e| store_err(e, container))?.finish()
            }

            StoreConf::SCHEME_FS => {
                let root = match conf.get(StoreConf::ROOT) {
                    Some(v) => v.to_string(),
                    None => Utils::temp_dir().join("blobdir-store").to_string_lossy().to_string(),
                };
                let builder = Fs::default().root(&format!("{}/{}", root.trim_end_matches('/'), container));
                Operator::new(builder).map_err(|e| store_err(e, container))?.finish()
            }

            StoreConf::SCHEME_S3 => {
                let mut builder = S3::default().bucket(container);
                if let Some(v) = conf.get(StoreConf::ENDPOINT) {
                    builder = builder.endpoint(v);
                }
                if let Some(v) = conf.get(StoreConf::REGION) {
                    builder = builder.region(v);
                }
                if let Some(v) = conf.get(StoreConf::ACCESS_KEY_ID) {
                    builder = builder.access_key_id(v);
                }
                if let Some(v) = conf.get(StoreConf::SECRET_ACCESS_KEY) {
                    builder = builder.secret_access_key(v);
                }
                if let Some(v) = conf.get(StoreConf::ROOT) {
                    builder = builder.root(v);
                }
                Operator::new(builder).map_err(|e| store_err(e, container))?.finish()
            }

            StoreConf::SCHEME_AZBLOB => {
                let mut builder = Azblob::default().container(container);
                if let Some(v) = conf.get(StoreConf::ENDPOINT) {
                    builder = builder.endpoint(v);
                }
                if let Some(v) = conf.get(StoreConf::ACCOUNT_NAME) {
                    builder = builder.account_name(v);
                }
                if let Some(v) = conf.get(StoreConf::ACCOUNT_KEY) {
                    builder = builder.account_key(v);
                }
                if let Some(v) = conf.get(StoreConf::ROOT) {
                    builder = builder.root(v);
                }
                Operator::new(builder).map_err(|e| store_err(e, container))?.finish()
            }

            _ => return Err(FsError::unsupported(format!("store scheme {}", conf.scheme))),
        };

        let operator = Self::add_stability_layers(base_op, conf);
        let store = Self::new(operator, scheme);
        info!(
            "object store {} ready for container {}, conditional writes: {}",
            store.scheme, container, store.conditional
        );
        Ok(store)
    }

    fn add_stability_layers(base_op: Operator, conf: &StoreConf) -> Operator {
        base_op
            .layer(LoggingLayer::default())
            .layer(TimeoutLayer::new().with_io_timeout(conf.io_timeout))
            .layer(
                RetryLayer::new()
                    .with_min_delay(conf.retry_interval)
                    .with_max_delay(conf.retry_max_delay)
                    .with_max_times(conf.retry_times as usize)
                    .with_factor(2.0)
                    .with_jitter(),
            )
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn supports_conditional_write(&self) -> bool {
        self.conditional
    }

    fn meta_name(name: &str) -> String {
        format!("{}{}", name, META_SUFFIX)
    }

    fn lease_name(name: &str) -> String {
        format!("{}{}", name, LEASE_SUFFIX)
    }

    fn is_sidecar(name: &str) -> bool {
        name.ends_with(META_SUFFIX) || name.ends_with(LEASE_SUFFIX)
    }

    fn check_blob_name(name: &str) -> FsResult<()> {
        check_name(name)?;
        if Self::is_sidecar(name) {
            return Err(FsError::invalid_path(
                name,
                "names ending in .meta or .lease are reserved by the store",
            ));
        }
        Ok(())
    }

    // Held across a lease read-check-write when the backend cannot do it atomically.
    async fn lease_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if self.conditional {
            None
        } else {
            Some(self.lease_mutex.lock().await)
        }
    }

    async fn read_metadata(&self, name: &str) -> FsResult<HashMap<String, String>> {
        let meta_name = Self::meta_name(name);
        match self.operator.read(&meta_name).await {
            Ok(buf) => Ok(serde_json::from_slice(&buf.to_bytes())?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(store_err(e, &meta_name)),
        }
    }

    // The record and its etag, None when no lease was ever taken.
    async fn read_lease(&self, name: &str) -> FsResult<Option<(LeaseRecord, Option<String>)>> {
        let lease_name = Self::lease_name(name);
        let etag = match self.operator.stat(&lease_name).await {
            Ok(meta) => meta.etag().map(|x| x.to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_err(e, &lease_name)),
        };

        match self.operator.read(&lease_name).await {
            Ok(buf) => {
                let record: LeaseRecord = serde_json::from_slice(&buf.to_bytes())?;
                Ok(Some((record, etag)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(e, &lease_name)),
        }
    }

    async fn write_lease(
        &self,
        name: &str,
        record: &LeaseRecord,
        previous: Option<&Option<String>>,
    ) -> FsResult<()> {
        let lease_name = Self::lease_name(name);
        let data = Bytes::from(serde_json::to_vec(record)?);

        let res = match (self.conditional, previous) {
            (true, None) => {
                self.operator
                    .write_with(&lease_name, data)
                    .if_not_exists(true)
                    .await
                    .map(|_| ())
            }
            (true, Some(Some(etag))) => {
                self.operator
                    .write_with(&lease_name, data)
                    .if_match(etag)
                    .await
                    .map(|_| ())
            }
            _ => self.operator.write(&lease_name, data).await.map(|_| ()),
        };

        match res {
            Ok(()) => Ok(()),
            Err(e) => match store_err(e, &lease_name) {
                FsError::LeaseConflict(_) => Err(FsError::lease_conflict(name)),
                e => Err(e),
            },
        }
    }

    async fn ensure_exists(&self, name: &str) -> FsResult<()> {
        self.operator
            .stat(name)
            .await
            .map(|_| ())
            .map_err(|e| store_err(e, name))
    }
}

impl ObjectStore for OpendalObjectStore {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    async fn stat(&self, name: &str) -> FsResult<ObjectStatus> {
        if Self::is_sidecar(name) {
            return Err(FsError::file_not_found(name));
        }
        let meta = self
            .operator
            .stat(name)
            .await
            .map_err(|e| store_err(e, name))?;
        let mtime = meta
            .last_modified()
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);

        Ok(ObjectStatus {
            name: name.to_string(),
            len: meta.content_length() as i64,
            mtime,
            metadata: self.read_metadata(name).await?,
        })
    }

    async fn download(&self, name: &str) -> FsResult<Bytes> {
        if Self::is_sidecar(name) {
            return Err(FsError::file_not_found(name));
        }
        let buf = self
            .operator
            .read(name)
            .await
            .map_err(|e| store_err(e, name))?;
        Ok(buf.to_bytes())
    }

    async fn upload(&self, name: &str, data: Bytes) -> FsResult<()> {
        Self::check_blob_name(name)?;
        self.operator
            .write(name, data)
            .await
            .map_err(|e| store_err(e, name))?;

        let meta_name = Self::meta_name(name);
        self.operator
            .delete(&meta_name)
            .await
            .map_err(|e| store_err(e, &meta_name))
    }

    async fn upload_if_absent(&self, name: &str, data: Bytes) -> FsResult<bool> {
        Self::check_blob_name(name)?;
        if self.conditional {
            return match self.operator.write_with(name, data).if_not_exists(true).await {
                Ok(_) => Ok(true),
                Err(e) if matches!(e.kind(), ErrorKind::ConditionNotMatch | ErrorKind::AlreadyExists) => {
                    Ok(false)
                }
                Err(e) => Err(store_err(e, name)),
            };
        }

        if self.exists(name).await? {
            return Ok(false);
        }
        self.operator
            .write(name, data)
            .await
            .map_err(|e| store_err(e, name))?;
        Ok(true)
    }

    async fn set_metadata(&self, name: &str, metadata: HashMap<String, String>) -> FsResult<()> {
        Self::check_blob_name(name)?;
        self.ensure_exists(name).await?;
        let meta_name = Self::meta_name(name);
        let data = Bytes::from(serde_json::to_vec(&metadata)?);
        self.operator
            .write(&meta_name, data)
            .await
            .map_err(|e| store_err(e, &meta_name))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> FsResult<()> {
        Self::check_blob_name(name)?;
        let _guard = self.lease_guard().await;
        if let Some((record, _)) = self.read_lease(name).await? {
            if record.is_active() {
                return Err(FsError::lease_conflict(format!(
                    "{} has an active lease and cannot be deleted",
                    name
                )));
            }
        }

        for path in [name.to_string(), Self::meta_name(name), Self::lease_name(name)] {
            self.operator
                .delete(&path)
                .await
                .map_err(|e| store_err(e, &path))?;
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "/",
        };

        let entries = self
            .operator
            .list_with(dir)
            .recursive(true)
            .await
            .map_err(|e| store_err(e, dir))?;

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|x| x.metadata().is_file())
            .map(|x| x.path().trim_start_matches('/').to_string())
            .filter(|x| x.starts_with(prefix) && !Self::is_sidecar(x))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn acquire_lease(&self, name: &str, duration: Duration) -> FsResult<LeaseToken> {
        Self::check_blob_name(name)?;
        let _guard = self.lease_guard().await;
        self.ensure_exists(name).await?;

        let previous = match self.read_lease(name).await? {
            Some((record, _)) if record.is_active() => {
                return Err(FsError::lease_conflict(name));
            }
            Some((_, etag)) => Some(etag),
            None => None,
        };

        let token = LeaseToken::generate();
        let record = LeaseRecord::new(&token, duration);
        self.write_lease(name, &record, previous.as_ref()).await?;
        debug!("lease {} acquired on {} for {:?}", token, name, duration);
        Ok(token)
    }

    async fn renew_lease(&self, name: &str, token: &LeaseToken) -> FsResult<()> {
        let _guard = self.lease_guard().await;
        match self.read_lease(name).await? {
            Some((mut record, etag)) if record.token == token.as_str() => {
                record.renew();
                match self.write_lease(name, &record, Some(&etag)).await {
                    Err(e) if e.is_conflict() => Err(FsError::lease_lost(name)),
                    res => res,
                }
            }
            _ => Err(FsError::lease_lost(format!("{} is not held by {}", name, token))),
        }
    }

    // The record is overwritten rather than deleted, so the write can be made conditional
    // on the etag that was read: a lease taken over in between is left alone.
    async fn release_lease(&self, name: &str, token: &LeaseToken) -> FsResult<()> {
        let _guard = self.lease_guard().await;
        match self.read_lease(name).await? {
            Some((record, etag)) if record.token == token.as_str() => {
                match self.write_lease(name, &LeaseRecord::released(), Some(&etag)).await {
                    Err(e) if e.is_conflict() => Err(FsError::lease_lost(name)),
                    res => res,
                }
            }
            _ => Err(FsError::lease_lost(format!("{} is not held by {}", name, token))),
        }
    }

    async fn break_lease(&self, name: &str) -> FsResult<()> {
        let _guard = self.lease_guard().await;
        self.ensure_exists(name).await?;
        let lease_name = Self::lease_name(name);
        self.operator
            .delete(&lease_name)
            .await
            .map_err(|e| store_err(e, &lease_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> OpendalObjectStore {
        let mut conf = StoreConf::default();
        conf.init().unwrap();
        OpendalObjectStore::with_conf(&conf, "index").unwrap()
    }

    #[tokio::test]
    async fn metadata_sidecar() {
        let store = memory_store();
        store.upload("s1/_0.cfs", Bytes::from_static(b"abc")).await.unwrap();

        let mut meta = HashMap::new();
        meta.insert("CachedLength".to_string(), "3".to_string());
        store.set_metadata("s1/_0.cfs", meta).await.unwrap();

        let status = store.stat("s1/_0.cfs").await.unwrap();
        assert_eq!(status.len, 3);
        assert_eq!(status.cached_length(), Some(3));
        assert_eq!(store.list("s1/").await.unwrap(), vec!["s1/_0.cfs"]);

        store.upload("s1/_0.cfs", Bytes::from_static(b"abcd")).await.unwrap();
        assert!(store.get_metadata("s1/_0.cfs").await.unwrap().is_empty());

        assert!(store.stat("s1/none").await.unwrap_err().is_not_found());
        assert!(store
            .set_metadata("s1/none", HashMap::new())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn lease_records() {
        let store = memory_store();
        let lease = Duration::from_secs(60);
        assert!(store.acquire_lease("write.lock", lease).await.unwrap_err().is_not_found());

        assert!(store.upload_if_absent("write.lock", Bytes::from_static(b"write.lock")).await.unwrap());
        assert!(!store.upload_if_absent("write.lock", Bytes::new()).await.unwrap());

        let token = store.acquire_lease("write.lock", lease).await.unwrap();
        assert!(store.acquire_lease("write.lock", lease).await.unwrap_err().is_conflict());
        store.renew_lease("write.lock", &token).await.unwrap();
        assert!(store.delete("write.lock").await.unwrap_err().is_conflict());
        assert!(store.list("").await.unwrap().contains(&"write.lock".to_string()));

        store.release_lease("write.lock", &token).await.unwrap();
        assert!(store.release_lease("write.lock", &token).await.unwrap_err().is_lease_error());

        let token = store.acquire_lease("write.lock", lease).await.unwrap();
        store.break_lease("write.lock").await.unwrap();
        assert!(store.renew_lease("write.lock", &token).await.is_err());
        store.delete("write.lock").await.unwrap();
        assert!(!store.exists("write.lock").await.unwrap());
    }

    #[tokio::test]
    async fn release_keeps_newer_lease() {
        let store = memory_store();
        store.upload("write.lock", Bytes::from_static(b"write.lock")).await.unwrap();

        let stale = store
            .acquire_lease("write.lock", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let current = store
            .acquire_lease("write.lock", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.release_lease("write.lock", &stale).await.unwrap_err().is_lease_error());
        assert!(store
            .acquire_lease("write.lock", Duration::from_secs(60))
            .await
            .unwrap_err()
            .is_conflict());
        store.renew_lease("write.lock", &current).await.unwrap();

        store.release_lease("write.lock", &current).await.unwrap();
        assert!(store.renew_lease("write.lock", &current).await.unwrap_err().is_lease_error());
        let next = store
            .acquire_lease("write.lock", Duration::from_secs(60))
            .await
            .unwrap();
        store.release_lease("write.lock", &next).await.unwrap();
        assert_eq!(store.list("").await.unwrap(), vec!["write.lock"]);
    }

    #[tokio::test]
    async fn sidecar_names_are_reserved() {
        let store = memory_store();
        store.upload("_0.cfs", Bytes::from_static(b"abc")).await.unwrap();
        store.set_metadata("_0.cfs", HashMap::new()).await.unwrap();

        assert!(store.upload("_0.cfs.meta", Bytes::new()).await.is_err());
        assert!(store.upload_if_absent("x.lease", Bytes::new()).await.is_err());
        assert!(store.stat("_0.cfs.meta").await.unwrap_err().is_not_found());
        assert!(store.download("_0.cfs.meta").await.unwrap_err().is_not_found());
        assert!(!store.exists("_0.cfs.meta").await.unwrap());
        assert_eq!(store.list("").await.unwrap(), vec!["_0.cfs"]);
    }

    #[test]
    fn unknown_scheme() {
        let conf = StoreConf {
            scheme: "ftp".to_string(),
            ..Default::default()
        };
        assert!(OpendalObjectStore::with_conf(&conf, "index").is_err());
    }
}
