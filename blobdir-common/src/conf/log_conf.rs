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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConf {
    pub level: String,

    // "stdout" or a directory for daily rolling files.
    pub log_dir: String,

    pub file_name: String,

    pub display_target: bool,

    pub display_thread: bool,
}

impl Default for LogConf {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: "stdout".to_string(),
            file_name: "blobdir.log".to_string(),
            display_target: true,
            display_thread: false,
        }
    }
}
