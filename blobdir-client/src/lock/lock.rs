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

use blobdir_common::error::FsError;
use blobdir_common::FsResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Exclusive lock shared across processes.
#[trait_variant::make(Send)]
pub trait Lock: Send + Sync {
    fn name(&self) -> &str;

    /// Returns true iff this instance holds the lock afterwards. A lock held by someone
    /// else is not an error.
    async fn obtain(&self) -> FsResult<bool>;

    /// Releasing a lock that is not held is a no-op.
    async fn release(&self) -> FsResult<()>;

    async fn is_locked(&self) -> FsResult<bool>;

    /// Retries `obtain` every `poll` until it succeeds or `wait` has elapsed.
    fn obtain_timeout(
        &self,
        wait: Duration,
        poll: Duration,
    ) -> impl Future<Output = FsResult<bool>> + Send {
        async move {
            let deadline = Instant::now() + wait;
            loop {
                if self.obtain().await? {
                    return Ok(true);
                }

                let now = Instant::now();
                if now >= deadline {
                    return Err(FsError::timeout(format!("obtain lock {}", self.name()), wait));
                }
                tokio::time::sleep(poll.min(deadline - now)).await;
            }
        }
    }
}
