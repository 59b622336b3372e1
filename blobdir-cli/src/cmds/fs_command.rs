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

use blobdir_client::BlobDirectory;
use blobdir_common::common::LocalTime;
use blobdir_common::fs::{Reader, Writer};
use blobdir_common::FsResult;
use blobdir_store::cache::CacheStore;
use blobdir_store::object::ObjectStore;
use clap::Subcommand;
use serde_json::json;
use std::io::Write as _;
use std::path::Path;

const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Subcommand, Debug)]
pub enum FsCommand {
    /// List files of the directory
    Ls,

    /// Print a file to stdout
    Cat { name: String },

    /// Copy a file to the local filesystem
    Get {
        name: String,
        #[arg(help = "Local destination, defaults to the file name")]
        dest: Option<String>,
    },

    /// Upload a local file
    Put {
        src: String,
        #[arg(help = "File name in the directory, defaults to the source file name")]
        name: Option<String>,
    },

    /// Delete a file
    Rm { name: String },

    /// Show remote status of a file as JSON
    Stat { name: String },
}

impl FsCommand {
    pub async fn execute<S: ObjectStore, C: CacheStore>(
        self,
        dir: &BlobDirectory<S, C>,
    ) -> FsResult<()> {
        match self {
            FsCommand::Ls => {
                for name in dir.list_all().await? {
                    let len = dir.file_length(&name).await?;
                    println!("{:>12}  {}", len, name);
                }
                Ok(())
            }

            FsCommand::Cat { name } => {
                let mut reader = dir.open_input(&name).await?;
                let mut buf = vec![0u8; BUFFER_SIZE];
                let mut stdout = std::io::stdout().lock();
                loop {
                    let n = reader.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    stdout.write_all(&buf[..n])?;
                }
                stdout.flush()?;
                reader.complete().await
            }

            FsCommand::Get { name, dest } => {
                let dest = dest.unwrap_or_else(|| name.clone());
                let mut reader = dir.open_input(&name).await?;
                let data = reader.read_all().await?;
                tokio::fs::write(&dest, &data).await?;
                println!("{} -> {} ({} bytes)", dir.blob_name(&name), dest, data.len());
                reader.complete().await
            }

            FsCommand::Put { src, name } => {
                let name = match name {
                    Some(v) => v,
                    None => Path::new(&src)
                        .file_name()
                        .map(|x| x.to_string_lossy().to_string())
                        .unwrap_or_else(|| src.clone()),
                };

                let data = tokio::fs::read(&src).await?;
                let mut writer = dir.create_output(&name).await?;
                writer.write(&data).await?;
                writer.complete().await?;
                println!("{} -> {} ({} bytes)", src, dir.blob_name(&name), data.len());
                Ok(())
            }

            FsCommand::Rm { name } => {
                dir.delete_file(&name).await?;
                println!("deleted {}", dir.blob_name(&name));
                Ok(())
            }

            FsCommand::Stat { name } => {
                let blob = dir.blob_name(&name);
                let status = dir.store().stat(&blob).await?;
                let cached = match dir.cache().status(&name).await {
                    Ok(v) => json!({ "len": v.len, "mtime": LocalTime::mills_to_string(v.mtime) }),
                    Err(e) if e.is_not_found() => json!(null),
                    Err(e) => return Err(e),
                };

                let value = json!({
                    "name": name,
                    "blob": blob,
                    "len": status.logical_len(),
                    "stored_len": status.len,
                    "mtime": LocalTime::mills_to_string(status.mtime),
                    "metadata": status.metadata,
                    "cache": cached,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
        }
    }
}
