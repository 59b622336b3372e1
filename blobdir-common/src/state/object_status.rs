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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Original (uncompressed) byte length recorded when a blob is uploaded from the cache.
pub const CACHED_LENGTH: &str = "CachedLength";

/// Local modification time in milliseconds at upload; informational only.
pub const CACHED_LAST_MODIFIED: &str = "CachedLastModified";

/// Remote view of one blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatus {
    pub name: String,
    pub len: i64,
    // Server side last-modified in milliseconds.
    pub mtime: i64,
    pub metadata: HashMap<String, String>,
}

impl ObjectStatus {
    pub fn cached_length(&self) -> Option<i64> {
        self.metadata
            .get(CACHED_LENGTH)
            .and_then(|x| x.trim().parse::<i64>().ok())
    }

    pub fn cached_last_modified(&self) -> Option<i64> {
        self.metadata
            .get(CACHED_LAST_MODIFIED)
            .and_then(|x| x.trim().parse::<i64>().ok())
    }

    /// Length of the content once it is materialized in the local cache.
    pub fn logical_len(&self) -> i64 {
        self.cached_length().unwrap_or(self.len)
    }
}

/// Local view of one cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatus {
    pub len: i64,
    pub mtime: i64,
}
