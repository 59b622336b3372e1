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

use crate::file::BlobCodec;
use crate::sync::MutexRegistry;
use crate::DirectoryMetrics;
use blobdir_common::conf::BlobDirConf;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use std::sync::Arc;

/// State shared by a directory and every file handle it opens.
pub struct FileContext<S, C> {
    pub(crate) conf: BlobDirConf,
    pub(crate) store: Arc<S>,
    pub(crate) cache: C,
    pub(crate) registry: MutexRegistry,
    pub(crate) codec: BlobCodec,
    pub(crate) metrics: Arc<DirectoryMetrics>,
}

impl<S: ObjectStore, C: CacheStore> FileContext<S, C> {
    pub fn new(
        conf: BlobDirConf,
        store: Arc<S>,
        cache: C,
        registry: MutexRegistry,
        metrics: Arc<DirectoryMetrics>,
    ) -> Self {
        let codec = BlobCodec::new(conf.compress.clone());
        Self {
            conf,
            store,
            cache,
            registry,
            codec,
            metrics,
        }
    }

    pub fn conf(&self) -> &BlobDirConf {
        &self.conf
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn registry(&self) -> &MutexRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &BlobCodec {
        &self.codec
    }

    pub fn metrics(&self) -> &Arc<DirectoryMetrics> {
        &self.metrics
    }

    pub fn sub_directory(&self) -> &str {
        &self.conf.directory.sub_directory
    }

    /// Remote name of a file: `sub/dir/name`, or just `name` at the container root.
    pub fn blob_name(&self, name: &str) -> String {
        let sub = self.sub_directory();
        if sub.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", sub, name)
        }
    }

    /// Prefix shared by every blob of this directory.
    pub fn blob_prefix(&self) -> String {
        let sub = self.sub_directory();
        if sub.is_empty() {
            String::new()
        } else {
            format!("{}/", sub)
        }
    }
}
