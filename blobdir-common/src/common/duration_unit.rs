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

use crate::error::FsError;
use crate::FsResult;
use std::fmt;
use std::time::Duration;

/// Human readable duration used by configuration files: "500ms", "30s", "10m", "6h", "1d".
/// A bare number is read as seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationUnit {
    millis: u64,
}

impl DurationUnit {
    pub const MS: &'static str = "ms";
    pub const SECOND: &'static str = "s";
    pub const MINUTE: &'static str = "m";
    pub const HOUR: &'static str = "h";
    pub const DAY: &'static str = "d";

    pub fn new(millis: u64) -> Self {
        Self { millis }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> FsResult<Self> {
        let value = s.trim().to_lowercase();
        if value.is_empty() {
            return Err(FsError::conf("empty duration"));
        }

        let split = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        let (num, unit) = value.split_at(split);
        let num: u64 = num
            .parse()
            .map_err(|_| FsError::conf(format!("invalid duration '{}'", s)))?;

        let factor = match unit.trim() {
            Self::MS => 1,
            "" | Self::SECOND => 1000,
            Self::MINUTE => 60 * 1000,
            Self::HOUR => 60 * 60 * 1000,
            Self::DAY => 24 * 60 * 60 * 1000,
            other => {
                return Err(FsError::conf(format!(
                    "invalid duration unit '{}' in '{}'",
                    other, s
                )))
            }
        };

        Ok(Self::new(num * factor))
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis % 1000 != 0 {
            write!(f, "{}ms", self.millis)
        } else {
            write!(f, "{}s", self.millis / 1000)
        }
    }
}
