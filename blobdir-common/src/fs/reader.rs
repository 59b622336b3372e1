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
use std::future::Future;

/// Random access byte cursor over one file.
///
/// Reading at end of file returns 0; `read_full` turns a short read into an error.
#[trait_variant::make(Send)]
pub trait Reader: Send {
    fn name(&self) -> &str;

    fn len(&self) -> i64;

    fn pos(&self) -> i64;

    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize>;

    async fn seek(&mut self, pos: i64) -> FsResult<()>;

    async fn complete(&mut self) -> FsResult<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remaining(&self) -> i64 {
        (self.len() - self.pos()).max(0)
    }

    fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    fn read_full(&mut self, buf: &mut [u8]) -> impl Future<Output = FsResult<()>> + Send {
        async move {
            let mut off = 0;
            while off < buf.len() {
                let n = self.read(&mut buf[off..]).await?;
                if n == 0 {
                    return Err(FsError::IO(format!(
                        "{}: unexpected eof, pos {}, len {}, wanted {} more bytes",
                        self.name(),
                        self.pos(),
                        self.len(),
                        buf.len() - off
                    )));
                }
                off += n;
            }
            Ok(())
        }
    }

    fn read_at(&mut self, pos: i64, buf: &mut [u8]) -> impl Future<Output = FsResult<usize>> + Send {
        async move {
            self.seek(pos).await?;
            self.read(buf).await
        }
    }

    fn read_all(&mut self) -> impl Future<Output = FsResult<Vec<u8>>> + Send {
        async move {
            let mut res = vec![0u8; self.remaining() as usize];
            self.read_full(&mut res).await?;
            Ok(res)
        }
    }
}
