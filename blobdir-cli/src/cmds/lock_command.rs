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

use blobdir_client::lock::Lock;
use blobdir_client::BlobDirectory;
use blobdir_common::common::DurationUnit;
use blobdir_common::FsResult;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use clap::Subcommand;

const DEFAULT_LOCK: &str = "write.lock";

#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Report whether anyone holds the lock
    Status {
        #[arg(default_value = DEFAULT_LOCK)]
        name: String,
    },

    /// Obtain the lock, hold it for a while, then release it
    Obtain {
        #[arg(default_value = DEFAULT_LOCK)]
        name: String,

        #[arg(long, default_value = "0s", help = "How long to keep trying (e.g., '30s')")]
        wait: String,

        #[arg(long, default_value = "0s", help = "How long to hold the lock before releasing")]
        hold: String,
    },

    /// Forcibly break the lock, whoever holds it
    Break {
        #[arg(default_value = DEFAULT_LOCK)]
        name: String,
    },
}

impl LockCommand {
    pub async fn execute<S: ObjectStore, C: CacheStore>(
        self,
        dir: &BlobDirectory<S, C>,
    ) -> FsResult<()> {
        match self {
            LockCommand::Status { name } => {
                let lock = dir.make_lock(&name);
                let state = if lock.is_locked().await? {
                    "locked"
                } else {
                    "unlocked"
                };
                println!("{}: {}", lock.blob_name(), state);
                Ok(())
            }

            LockCommand::Obtain { name, wait, hold } => {
                let wait = DurationUnit::from_str(&wait)?.as_duration();
                let hold = DurationUnit::from_str(&hold)?.as_duration();
                let lock = dir.make_lock(&name);

                let obtained = if wait.is_zero() {
                    lock.obtain().await?
                } else {
                    lock.obtain_timeout(wait, dir.conf().lock.poll_interval).await?
                };
                if !obtained {
                    println!("{}: held by another process", lock.blob_name());
                    return Ok(());
                }

                println!("{}: obtained", lock.blob_name());
                if !hold.is_zero() {
                    tokio::time::sleep(hold).await;
                }
                lock.release().await?;
                println!("{}: released", lock.blob_name());
                Ok(())
            }

            LockCommand::Break { name } => {
                dir.clear_lock(&name).await?;
                println!("{}: broken", dir.blob_name(&name));
                Ok(())
            }
        }
    }
}
