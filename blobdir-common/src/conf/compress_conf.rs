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

use crate::common::Utils;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CompressConf {
    pub enable: bool,

    // Extensions (without the dot) stored deflate-compressed remotely.
    pub extensions: Vec<String>,
}

impl CompressConf {
    pub fn should_compress(&self, name: &str) -> bool {
        if !self.enable {
            return false;
        }
        match Utils::extension(name) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|x| x.trim_start_matches('.').eq_ignore_ascii_case(&ext)),
            None => false,
        }
    }
}
