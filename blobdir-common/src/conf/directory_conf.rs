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
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Disk,
    Memory,
}

/// Where the directory lives remotely and where its local replica is kept.
///
/// `catalog` is `container[/sub/dir]`. The container is always lowercased; the
/// sub-directory keeps its case only when `multi_case_path` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConf {
    pub catalog: String,

    pub multi_case_path: bool,

    // Local cache root, empty means <temp>/BlobDirectory/<name>.
    pub cache_dir: String,

    pub cache_kind: CacheKind,

    #[serde(skip)]
    pub container: String,

    #[serde(skip)]
    pub sub_directory: String,
}

impl DirectoryConf {
    pub const DEFAULT_CATALOG: &'static str = "blobdir";
    pub const CACHE_ROOT: &'static str = "BlobDirectory";

    pub fn with_catalog(catalog: impl Into<String>) -> Self {
        let mut conf = Self {
            catalog: catalog.into(),
            ..Default::default()
        };
        conf.parse_catalog();
        conf
    }

    pub fn init(&mut self) -> FsResult<()> {
        self.parse_catalog();
        Ok(())
    }

    fn parse_catalog(&mut self) {
        let catalog = self.catalog.trim().trim_matches('/');
        let catalog = if catalog.is_empty() {
            Self::DEFAULT_CATALOG
        } else {
            catalog
        };

        let mut parts = catalog.split('/').filter(|x| !x.is_empty());
        self.container = parts.next().unwrap_or(Self::DEFAULT_CATALOG).to_lowercase();

        let sub_directory = parts.collect::<Vec<_>>().join("/");
        self.sub_directory = if self.multi_case_path {
            sub_directory
        } else {
            sub_directory.to_lowercase()
        };
    }

    /// `container/sub/dir`, the identity used in logs and for the default cache location.
    pub fn name(&self) -> String {
        format!("{}/{}", self.container, self.sub_directory)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn cache_path(&self) -> PathBuf {
        if self.cache_dir.is_empty() {
            let mut path = Utils::temp_dir().join(Self::CACHE_ROOT);
            for part in self.name().split('/') {
                path.push(part);
            }
            path
        } else {
            PathBuf::from(&self.cache_dir)
        }
    }
}

impl Default for DirectoryConf {
    fn default() -> Self {
        let mut conf = Self {
            catalog: Self::DEFAULT_CATALOG.to_string(),
            multi_case_path: false,
            cache_dir: "".to_string(),
            cache_kind: CacheKind::Disk,
            container: "".to_string(),
            sub_directory: "".to_string(),
        };
        conf.parse_catalog();
        conf
    }
}

#[cfg(test)]
mod tests {
    use super::DirectoryConf;

    #[test]
    fn flat_catalog() {
        let conf = DirectoryConf::with_catalog("Index");
        assert_eq!(conf.container, "index");
        assert_eq!(conf.sub_directory, "");
        assert_eq!(conf.name(), "index");
    }

    #[test]
    fn nested_catalog_is_lowercased() {
        let conf = DirectoryConf::with_catalog("Index/Shard1/Level2");
        assert_eq!(conf.container, "index");
        assert_eq!(conf.sub_directory, "shard1/level2");
        assert_eq!(conf.name(), "index/shard1/level2");
    }

    #[test]
    fn multi_case_keeps_sub_directory_case() {
        let mut conf = DirectoryConf {
            catalog: "Index/Shard1".to_string(),
            multi_case_path: true,
            ..Default::default()
        };
        conf.init().unwrap();
        assert_eq!(conf.container, "index");
        assert_eq!(conf.sub_directory, "Shard1");
    }

    #[test]
    fn empty_catalog_falls_back() {
        let conf = DirectoryConf::with_catalog("  ");
        assert_eq!(conf.name(), DirectoryConf::DEFAULT_CATALOG);
        assert!(conf.cache_path().ends_with(DirectoryConf::DEFAULT_CATALOG));
    }
}
