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

use crate::common::DurationUnit;
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Remote object store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConf {
    // memory, fs, s3 or azblob
    pub scheme: String,

    // Backend specific keys: endpoint, region, access_key_id, secret_access_key,
    // account_name, account_key, root.
    pub properties: HashMap<String, String>,

    pub retry_times: u32,

    #[serde(skip)]
    pub retry_interval: Duration,
    #[serde(alias = "retry_interval")]
    pub retry_interval_str: String,

    #[serde(skip)]
    pub retry_max_delay: Duration,
    #[serde(alias = "retry_max_delay")]
    pub retry_max_delay_str: String,

    #[serde(skip)]
    pub io_timeout: Duration,
    #[serde(alias = "io_timeout")]
    pub io_timeout_str: String,
}

impl StoreConf {
    pub const SCHEME_MEMORY: &'static str = "memory";
    pub const SCHEME_FS: &'static str = "fs";
    pub const SCHEME_S3: &'static str = "s3";
    pub const SCHEME_AZBLOB: &'static str = "azblob";

    pub const ENDPOINT: &'static str = "endpoint";
    pub const REGION: &'static str = "region";
    pub const ROOT: &'static str = "root";
    pub const ACCESS_KEY_ID: &'static str = "access_key_id";
    pub const SECRET_ACCESS_KEY: &'static str = "secret_access_key";
    pub const ACCOUNT_NAME: &'static str = "account_name";
    pub const ACCOUNT_KEY: &'static str = "account_key";

    pub fn init(&mut self) -> FsResult<()> {
        self.retry_interval = DurationUnit::from_str(&self.retry_interval_str)?.as_duration();
        self.retry_max_delay = DurationUnit::from_str(&self.retry_max_delay_str)?.as_duration();
        self.io_timeout = DurationUnit::from_str(&self.io_timeout_str)?.as_duration();
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|x| x.as_str())
    }
}

impl Default for StoreConf {
    fn default() -> Self {
        Self {
            scheme: Self::SCHEME_MEMORY.to_string(),
            properties: HashMap::new(),
            retry_times: 3,

            retry_interval: Duration::from_millis(100),
            retry_interval_str: "100ms".to_string(),

            retry_max_delay: Duration::from_secs(5),
            retry_max_delay_str: "5s".to_string(),

            io_timeout: Duration::from_secs(60),
            io_timeout_str: "60s".to_string(),
        }
    }
}
