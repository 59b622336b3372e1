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
use crate::error::FsError;
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Distributed lease lock timing.
///
/// The lease is renewed at `renew_interval`, which must stay strictly below
/// `lease_duration`; the defaults (60s lease, renew every 30s) are what other
/// processes sharing the same store expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConf {
    #[serde(skip)]
    pub lease_duration: Duration,
    #[serde(alias = "lease_duration")]
    pub lease_duration_str: String,

    #[serde(skip)]
    pub renew_interval: Duration,
    #[serde(alias = "renew_interval")]
    pub renew_interval_str: String,

    // Lifetime of the temporary lease taken by is_locked().
    #[serde(skip)]
    pub probe_duration: Duration,
    #[serde(alias = "probe_duration")]
    pub probe_duration_str: String,

    // Sleep between attempts in obtain_timeout().
    #[serde(skip)]
    pub poll_interval: Duration,
    #[serde(alias = "poll_interval")]
    pub poll_interval_str: String,
}

impl LockConf {
    pub const LEASE_DURATION: Duration = Duration::from_secs(60);
    pub const RENEW_INTERVAL: Duration = Duration::from_secs(30);
    pub const PROBE_DURATION: Duration = Duration::from_secs(15);

    pub fn init(&mut self) -> FsResult<()> {
        self.lease_duration = DurationUnit::from_str(&self.lease_duration_str)?.as_duration();
        self.renew_interval = DurationUnit::from_str(&self.renew_interval_str)?.as_duration();
        self.probe_duration = DurationUnit::from_str(&self.probe_duration_str)?.as_duration();
        self.poll_interval = DurationUnit::from_str(&self.poll_interval_str)?.as_duration();
        self.check()
    }

    pub fn check(&self) -> FsResult<()> {
        if self.renew_interval.is_zero() || self.renew_interval >= self.lease_duration {
            return Err(FsError::conf(format!(
                "lock.renew_interval {:?} must be shorter than lock.lease_duration {:?}",
                self.renew_interval, self.lease_duration
            )));
        }
        if self.probe_duration.is_zero() {
            return Err(FsError::conf("lock.probe_duration must be positive"));
        }
        Ok(())
    }
}

impl Default for LockConf {
    fn default() -> Self {
        Self {
            lease_duration: Self::LEASE_DURATION,
            lease_duration_str: "60s".to_string(),

            renew_interval: Self::RENEW_INTERVAL,
            renew_interval_str: "30s".to_string(),

            probe_duration: Self::PROBE_DURATION,
            probe_duration_str: "15s".to_string(),

            poll_interval: Duration::from_secs(1),
            poll_interval_str: "1s".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LockConf;
    use std::time::Duration;

    #[test]
    fn default_is_valid() {
        let mut conf = LockConf::default();
        conf.init().unwrap();
        assert_eq!(conf.lease_duration, Duration::from_secs(60));
        assert_eq!(conf.renew_interval, Duration::from_secs(30));
    }

    #[test]
    fn renew_must_be_shorter_than_lease() {
        let mut conf = LockConf {
            renew_interval_str: "60s".to_string(),
            ..Default::default()
        };
        assert!(conf.init().is_err());
    }
}
