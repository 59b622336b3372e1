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
use blobdir_common::FsResult;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counters of one directory instance, registered in a registry of its own so several
/// directories can live in one process.
pub struct DirectoryMetrics {
    registry: Registry,
    pub cache_hits: IntCounter,
    pub cache_refreshes: IntCounter,
    pub cache_stale_removed: IntCounter,
    pub uploads: IntCounter,
    pub upload_bytes: IntCounter,
    pub download_bytes: IntCounter,
    pub lock_obtained: IntCounter,
    pub lock_conflicts: IntCounter,
    pub lease_renew_failures: IntCounter,
}

impl DirectoryMetrics {
    pub const PREFIX: &'static str = "blobdir";

    pub fn new(dir_name: &str) -> FsResult<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> FsResult<IntCounter> {
            let opts = Opts::new(format!("{}_{}", Self::PREFIX, name), help)
                .const_label("dir", dir_name);
            let c = IntCounter::with_opts(opts).map_err(metrics_err)?;
            registry.register(Box::new(c.clone())).map_err(metrics_err)?;
            Ok(c)
        };

        Ok(Self {
            cache_hits: counter("cache_hits", "opens served from a fresh local entry")?,
            cache_refreshes: counter("cache_refreshes", "opens that downloaded the blob")?,
            cache_stale_removed: counter(
                "cache_stale_removed",
                "local entries removed because the blob vanished",
            )?,
            uploads: counter("uploads", "files uploaded on close")?,
            upload_bytes: counter("upload_bytes", "bytes uploaded")?,
            download_bytes: counter("download_bytes", "bytes downloaded")?,
            lock_obtained: counter("lock_obtained", "successful lock obtains")?,
            lock_conflicts: counter("lock_conflicts", "obtains refused by a held lease")?,
            lease_renew_failures: counter("lease_renew_failures", "failed lease renewals")?,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every counter.
    pub fn text(&self) -> FsResult<String> {
        let mut buf = vec![];
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(metrics_err)?;
        String::from_utf8(buf).map_err(|e| FsError::common(e.to_string()))
    }
}

fn metrics_err(e: prometheus::Error) -> FsError {
    FsError::common(format!("metrics: {}", e))
}
