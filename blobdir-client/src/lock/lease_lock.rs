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

use crate::lock::Lock;
use crate::DirectoryMetrics;
use blobdir_common::conf::LockConf;
use blobdir_common::state::LeaseToken;
use blobdir_common::FsResult;
use blobdir_store::object::ObjectStore;
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct RenewalTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    lost: Arc<AtomicBool>,
}

impl RenewalTask {
    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    // Returns once the loop has exited, so no renewal can happen afterwards.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("lease renewal task ended abnormally: {}", e);
        }
    }
}

#[derive(Default)]
struct LeaseState {
    token: Option<LeaseToken>,
    renewal: Option<RenewalTask>,
}

impl LeaseState {
    // A renewal failure only raises a flag; the held token is dropped here, on the next call.
    fn check_lost(&mut self, blob: &str) {
        if self.renewal.as_ref().is_some_and(|x| x.is_lost()) {
            warn!("lease on {} was lost, lock is no longer held", blob);
            if let Some(task) = self.renewal.take() {
                task.handle.abort();
            }
            self.token = None;
        }
    }
}

/// Lock backed by a lease on a small marker blob.
///
/// While held, a background task renews the lease every `renew_interval`. If a renewal
/// fails the lock counts as lost; the next `obtain` or `is_locked` notices and tries again
/// from scratch.
pub struct LeaseLock<S: ObjectStore> {
    name: String,
    blob: String,
    store: Arc<S>,
    conf: LockConf,
    metrics: Arc<DirectoryMetrics>,
    state: AsyncMutex<LeaseState>,
}

impl<S: ObjectStore> LeaseLock<S> {
    pub fn new(
        store: Arc<S>,
        name: impl Into<String>,
        blob: impl Into<String>,
        conf: LockConf,
        metrics: Arc<DirectoryMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            blob: blob.into(),
            store,
            conf,
            metrics,
            state: AsyncMutex::new(LeaseState::default()),
        }
    }

    pub fn blob_name(&self) -> &str {
        &self.blob
    }

    /// Whether this instance currently holds a lease, without contacting the store.
    pub async fn is_held(&self) -> bool {
        let mut state = self.state.lock().await;
        state.check_lost(&self.blob);
        state.token.is_some()
    }

    // None when someone else holds the lease.
    async fn try_acquire(&self) -> FsResult<Option<LeaseToken>> {
        match self
            .store
            .acquire_lease(&self.blob, self.conf.lease_duration)
            .await
        {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.is_conflict() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_marker(&self) -> FsResult<()> {
        let created = self
            .store
            .upload_if_absent(&self.blob, Bytes::from(self.name.clone()))
            .await?;
        if created {
            debug!("created lock marker {}", self.blob);
        }
        Ok(())
    }

    fn start_renewal(&self, token: LeaseToken) -> RenewalTask {
        let cancel = CancellationToken::new();
        let lost = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(Self::renew_loop(
            self.store.clone(),
            self.blob.clone(),
            token,
            self.conf.renew_interval,
            cancel.clone(),
            lost.clone(),
            self.metrics.clone(),
        ));

        RenewalTask {
            cancel,
            handle,
            lost,
        }
    }

    async fn renew_loop(
        store: Arc<S>,
        blob: String,
        token: LeaseToken,
        every: Duration,
        cancel: CancellationToken,
        lost: Arc<AtomicBool>,
        metrics: Arc<DirectoryMetrics>,
    ) {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = interval.tick() => {
                    match store.renew_lease(&blob, &token).await {
                        Ok(()) => debug!("renewed lease {} on {}", token, blob),
                        Err(e) => {
                            warn!("failed to renew lease {} on {}: {}", token, blob, e);
                            metrics.lease_renew_failures.inc();
                            lost.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Extends the held lease once. Without a held lease this does nothing.
    pub async fn renew(&self) -> FsResult<()> {
        let state = self.state.lock().await;
        match &state.token {
            Some(token) => self.store.renew_lease(&self.blob, token).await,
            None => Ok(()),
        }
    }

    /// Ends any lease on the marker, whoever holds it, and deletes the marker.
    pub async fn break_lock(&self) -> FsResult<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.renewal.take() {
            task.stop().await;
        }
        state.token = None;

        match self.store.break_lease(&self.blob).await {
            Err(e) if !e.is_not_found() => return Err(e),
            _ => (),
        }

        match self.store.delete(&self.blob).await {
            Ok(()) => (),
            Err(e) if e.is_conflict() => {
                warn!("lock {} was taken again while being broken", self.blob)
            }
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => (),
        }

        info!("broke lock {}", self.blob);
        Ok(())
    }
}

impl<S: ObjectStore> Lock for LeaseLock<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn obtain(&self) -> FsResult<bool> {
        let mut state = self.state.lock().await;
        state.check_lost(&self.blob);
        if state.token.is_some() {
            return Ok(true);
        }

        let token = match self.store.acquire_lease(&self.blob, self.conf.lease_duration).await {
            Ok(token) => Some(token),
            Err(e) if e.is_conflict() => None,
            Err(e) if e.is_not_found() => {
                self.create_marker().await?;
                self.try_acquire().await?
            }
            Err(e) => return Err(e),
        };

        match token {
            Some(token) => {
                info!("obtained lock {} with lease {}", self.blob, token);
                self.metrics.lock_obtained.inc();
                state.renewal = Some(self.start_renewal(token.clone()));
                state.token = Some(token);
                Ok(true)
            }
            None => {
                debug!("lock {} is held elsewhere", self.blob);
                self.metrics.lock_conflicts.inc();
                Ok(false)
            }
        }
    }

    async fn release(&self) -> FsResult<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.renewal.take() {
            task.stop().await;
        }

        // Local state is cleared even if the store call fails; the lease then runs out.
        let token = match state.token.take() {
            Some(v) => v,
            None => return Ok(()),
        };

        match self.store.release_lease(&self.blob, &token).await {
            Ok(()) => {
                info!("released lock {}", self.blob);
                Ok(())
            }
            Err(e) if e.is_not_found() || e.is_lease_error() => {
                warn!("lease {} on {} was already gone: {}", token, self.blob, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn is_locked(&self) -> FsResult<bool> {
        let mut state = self.state.lock().await;
        state.check_lost(&self.blob);
        if state.token.is_some() {
            return Ok(true);
        }

        match self
            .store
            .acquire_lease(&self.blob, self.conf.probe_duration)
            .await
        {
            Ok(probe) => {
                self.store.release_lease(&self.blob, &probe).await?;
                debug!("probe on {}: unlocked", self.blob);
                Ok(false)
            }
            Err(e) if e.is_conflict() => {
                debug!("probe on {}: locked", self.blob);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<S: ObjectStore> Drop for LeaseLock<S> {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().renewal.take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}
