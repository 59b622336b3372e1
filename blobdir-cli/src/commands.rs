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

use crate::cmds::{FsCommand, LockCommand};
use blobdir_client::BlobDirectory;
use blobdir_common::FsResult;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Fs(FsCommand),

    /// Inspect, obtain or break a directory lock
    #[command(subcommand)]
    Lock(LockCommand),

    /// Delete every local cache entry
    ClearCache,

    /// Print this directory's counters in Prometheus text format
    Metrics,

    /// Show version information
    Version,
}

impl Commands {
    pub async fn execute<S: ObjectStore, C: CacheStore>(
        self,
        dir: BlobDirectory<S, C>,
    ) -> FsResult<()> {
        match self {
            Commands::Fs(cmd) => cmd.execute(&dir).await,
            Commands::Lock(cmd) => cmd.execute(&dir).await,
            Commands::ClearCache => {
                dir.clear_cache().await?;
                println!("cleared cache of {}", dir.name());
                Ok(())
            }
            Commands::Metrics => {
                print!("{}", dir.metrics().text()?);
                Ok(())
            }
            Commands::Version => {
                println!("blobdir {}", blobdir_common::VERSION);
                Ok(())
            }
        }
    }
}
