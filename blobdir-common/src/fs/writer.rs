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

use crate::FsResult;

/// Append-only byte sink. Nothing is visible to readers until `complete` returns.
#[trait_variant::make(Send)]
pub trait Writer: Send {
    fn name(&self) -> &str;

    fn pos(&self) -> i64;

    async fn write(&mut self, buf: &[u8]) -> FsResult<()>;

    async fn flush(&mut self) -> FsResult<()>;

    async fn complete(&mut self) -> FsResult<()>;

    // Discards everything written so far.
    async fn cancel(&mut self) -> FsResult<()>;
}
