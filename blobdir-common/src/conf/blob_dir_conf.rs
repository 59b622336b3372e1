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

use crate::conf::{CompressConf, DirectoryConf, LockConf, LogConf, StoreConf};
use crate::error::FsError;
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration, one section per concern:
///
/// ```toml
/// [directory]
/// catalog = "index/shard1"
///
/// [store]
/// scheme = "s3"
/// properties = { endpoint = "http://127.0.0.1:9000", region = "us-east-1" }
///
/// [lock]
/// lease_duration = "60s"
/// renew_interval = "30s"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BlobDirConf {
    pub directory: DirectoryConf,
    pub store: StoreConf,
    pub lock: LockConf,
    pub compress: CompressConf,
    pub log: LogConf,
}

impl BlobDirConf {
    pub const ENV_CONF_FILE: &'static str = "BLOBDIR_CONF_FILE";

    pub fn from_file(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FsError::conf(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> FsResult<Self> {
        let mut conf: Self = toml::from_str(content)?;
        conf.init()?;
        Ok(conf)
    }

    /// Loads the file named by `path`, falling back to $BLOBDIR_CONF_FILE, then defaults.
    pub fn load(path: Option<&str>) -> FsResult<Self> {
        let path = path
            .map(|x| x.to_string())
            .or_else(|| std::env::var(Self::ENV_CONF_FILE).ok());
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let mut conf = Self::default();
                conf.init()?;
                Ok(conf)
            }
        }
    }

    pub fn init(&mut self) -> FsResult<()> {
        self.directory.init()?;
        self.store.init()?;
        self.lock.init()?;
        Ok(())
    }

    pub fn to_toml(&self) -> FsResult<String> {
        toml::to_string_pretty(self).map_err(|e| FsError::conf(e.to_string()))
    }
}
