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

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;

pub struct Utils;

impl Utils {
    pub fn uuid() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn temp_dir() -> PathBuf {
        std::env::temp_dir()
    }

    // Directory used by tests that need a scratch location; unique per call.
    pub fn test_sub_dir(name: impl AsRef<str>) -> String {
        let dir = Self::temp_dir()
            .join("blobdir-test")
            .join(name.as_ref())
            .join(Self::uuid());
        dir.to_string_lossy().to_string()
    }

    pub fn rand_str(len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    /// Extension of a file name without the leading dot, lowercased.
    pub fn extension(name: &str) -> Option<String> {
        let file = name.rsplit('/').next().unwrap_or(name);
        match file.rfind('.') {
            Some(idx) if idx + 1 < file.len() => Some(file[idx + 1..].to_lowercase()),
            _ => None,
        }
    }
}
