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

use std::fmt::Display;
use std::io::ErrorKind;
use std::time::Duration;

/// Error kinds surfaced by the directory, the lock and both storage facades.
///
/// `FileNotFound` is the single normalized "absent" kind: every backend maps its own
/// status representation (HTTP 404, `io::ErrorKind::NotFound`, opendal `NotFound`)
/// onto it, so callers only ever match one variant.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("{0}")]
    Common(String),

    #[error("io error: {0}")]
    IO(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("lease conflict: {0}")]
    LeaseConflict(String),

    #[error("lease lost: {0}")]
    LeaseLost(String),

    #[error("invalid path {0}")]
    InvalidPath(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("object store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Conf(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl FsError {
    pub fn common(msg: impl Display) -> Self {
        Self::Common(msg.to_string())
    }

    pub fn file_not_found(name: impl Display) -> Self {
        Self::FileNotFound(name.to_string())
    }

    pub fn lease_conflict(name: impl Display) -> Self {
        Self::LeaseConflict(name.to_string())
    }

    pub fn lease_lost(msg: impl Display) -> Self {
        Self::LeaseLost(msg.to_string())
    }

    pub fn invalid_path(path: impl Display, reason: impl Display) -> Self {
        Self::InvalidPath(format!("{}: {}", path, reason))
    }

    pub fn unsupported(op: impl Display) -> Self {
        Self::Unsupported(op.to_string())
    }

    pub fn store(msg: impl Display) -> Self {
        Self::Store(msg.to_string())
    }

    pub fn conf(msg: impl Display) -> Self {
        Self::Conf(msg.to_string())
    }

    pub fn timeout(what: impl Display, after: Duration) -> Self {
        Self::Timeout(format!("{} after {:?}", what, after))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::FileNotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, FsError::LeaseConflict(_))
    }

    pub fn is_lease_error(&self) -> bool {
        matches!(self, FsError::LeaseConflict(_) | FsError::LeaseLost(_))
    }
}

impl From<std::io::Error> for FsError {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            ErrorKind::NotFound => FsError::FileNotFound(value.to_string()),
            _ => FsError::IO(value.to_string()),
        }
    }
}

impl From<String> for FsError {
    fn from(value: String) -> Self {
        FsError::Common(value)
    }
}

impl From<&str> for FsError {
    fn from(value: &str) -> Self {
        FsError::Common(value.to_string())
    }
}

impl From<serde_json::Error> for FsError {
    fn from(value: serde_json::Error) -> Self {
        FsError::Common(format!("json: {}", value))
    }
}

impl From<toml::de::Error> for FsError {
    fn from(value: toml::de::Error) -> Self {
        FsError::Conf(value.to_string())
    }
}

impl From<tokio::task::JoinError> for FsError {
    fn from(value: tokio::task::JoinError) -> Self {
        FsError::Common(format!("background task failed: {}", value))
    }
}
