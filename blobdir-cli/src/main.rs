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

mod cmds;
mod commands;

use blobdir_client::BlobDirectory;
use blobdir_common::common::Logger;
use blobdir_common::conf::{BlobDirConf, CacheKind};
use blobdir_common::FsResult;
use blobdir_store::object::OpendalObjectStore;
use clap::Parser;
use commands::Commands;

#[derive(Parser, Debug)]
#[command(author, version = blobdir_common::VERSION, about, long_about = None)]
pub struct BlobDirArgs {
    /// Configuration file path (optional)
    #[arg(
        short,
        long,
        help = "Configuration file path (optional)",
        global = true
    )]
    pub conf: Option<String>,

    /// Directory catalog, overrides [directory].catalog (e.g., 'index/shard1')
    #[arg(long, help = "Directory catalog (e.g., 'index/shard1')", global = true)]
    pub catalog: Option<String>,

    /// Local cache directory, overrides [directory].cache_dir
    #[arg(long, help = "Local cache directory", global = true)]
    pub cache_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl BlobDirArgs {
    pub fn get_conf(&self) -> FsResult<BlobDirConf> {
        let mut conf = BlobDirConf::load(self.conf.as_deref())?;
        if let Some(catalog) = &self.catalog {
            conf.directory.catalog = catalog.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            conf.directory.cache_dir = cache_dir.clone();
        }
        conf.init()?;
        Ok(conf)
    }
}

fn main() -> FsResult<()> {
    let args = BlobDirArgs::parse();
    if let Commands::Version = args.command {
        println!("blobdir {}", blobdir_common::VERSION);
        return Ok(());
    }

    let conf = args.get_conf()?;
    Logger::init(conf.log.clone());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("blobdir-cli")
        .build()?;

    rt.block_on(async move {
        let result = run(args.command, conf).await;
        if let Err(e) = &result {
            eprintln!("Error: {}", e);
        }
        result
    })
}

async fn run(command: Commands, conf: BlobDirConf) -> FsResult<()> {
    let store = OpendalObjectStore::with_conf(&conf.store, &conf.directory.container)?;
    match conf.directory.cache_kind {
        CacheKind::Disk => {
            let dir = BlobDirectory::with_local_cache(conf, store)?;
            command.execute(dir).await
        }
        CacheKind::Memory => {
            let dir = BlobDirectory::with_memory_cache(conf, store)?;
            command.execute(dir).await
        }
    }
}
