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

use crate::cache::cache_store::check_name;
use crate::cache::CacheStore;
use blobdir_common::common::LocalTime;
use blobdir_common::error::FsError;
use blobdir_common::fs::{Reader, Writer};
use blobdir_common::state::CacheStatus;
use blobdir_common::FsResult;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone)]
struct MemEntry {
    data: Bytes,
    mtime: i64,
}

/// Cache kept entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<DashMap<String, MemEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    type Reader = MemoryCacheReader;
    type Writer = MemoryCacheWriter;

    async fn exists(&self, name: &str) -> FsResult<bool> {
        check_name(name)?;
        Ok(self.entries.contains_key(name))
    }

    async fn status(&self, name: &str) -> FsResult<CacheStatus> {
        check_name(name)?;
        match self.entries.get(name) {
            Some(e) => Ok(CacheStatus {
                len: e.data.len() as i64,
                mtime: e.mtime,
            }),
            None => Err(FsError::file_not_found(name)),
        }
    }

    async fn open_read(&self, name: &str) -> FsResult<MemoryCacheReader> {
        check_name(name)?;
        match self.entries.get(name) {
            Some(e) => Ok(MemoryCacheReader {
                name: name.to_string(),
                data: e.data.clone(),
                pos: 0,
            }),
            None => Err(FsError::file_not_found(name)),
        }
    }

    async fn open_write(&self, name: &str) -> FsResult<MemoryCacheWriter> {
        check_name(name)?;
        Ok(MemoryCacheWriter {
            name: name.to_string(),
            entries: self.entries.clone(),
            buf: Some(BytesMut::new()),
        })
    }

    async fn delete(&self, name: &str) -> FsResult<()> {
        check_name(name)?;
        self.entries.remove(name);
        Ok(())
    }

    async fn list(&self) -> FsResult<Vec<String>> {
        let mut res: Vec<String> = self.entries.iter().map(|x| x.key().clone()).collect();
        res.sort();
        Ok(res)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCacheReader {
    name: String,
    data: Bytes,
    pos: i64,
}

impl Reader for MemoryCacheReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> i64 {
        self.data.len() as i64
    }

    fn pos(&self) -> i64 {
        self.pos
    }

    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let start = self.pos as usize;
        let n = (self.remaining() as usize).min(buf.len());
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as i64;
        Ok(n)
    }

    async fn seek(&mut self, pos: i64) -> FsResult<()> {
        if pos < 0 {
            return Err(FsError::common(format!("{}: invalid seek position {}", self.name, pos)));
        }
        self.pos = pos.min(self.len());
        Ok(())
    }

    async fn complete(&mut self) -> FsResult<()> {
        Ok(())
    }
}

pub struct MemoryCacheWriter {
    name: String,
    entries: Arc<DashMap<String, MemEntry>>,
    buf: Option<BytesMut>,
}

impl MemoryCacheWriter {
    fn buf(&mut self) -> FsResult<&mut BytesMut> {
        match self.buf.as_mut() {
            Some(v) => Ok(v),
            None => Err(FsError::common(format!("{}: writer already closed", self.name))),
        }
    }
}

impl Writer for MemoryCacheWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn pos(&self) -> i64 {
        self.buf.as_ref().map(|x| x.len() as i64).unwrap_or(0)
    }

    async fn write(&mut self, buf: &[u8]) -> FsResult<()> {
        self.buf()?.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> FsResult<()> {
        Ok(())
    }

    async fn complete(&mut self) -> FsResult<()> {
        if let Some(buf) = self.buf.take() {
            let entry = MemEntry {
                data: buf.freeze(),
                mtime: LocalTime::mills() as i64,
            };
            self.entries.insert(self.name.clone(), entry);
        }
        Ok(())
    }

    async fn cancel(&mut self) -> FsResult<()> {
        self.buf.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_on_complete() {
        let store = MemoryCacheStore::new();
        store.write_all("seg", b"v1").await.unwrap();
        let mut old = store.open_read("seg").await.unwrap();

        let mut writer = store.open_write("seg").await.unwrap();
        writer.write(b"version2").await.unwrap();
        assert_eq!(store.length("seg").await.unwrap(), 2);
        writer.complete().await.unwrap();

        assert_eq!(store.length("seg").await.unwrap(), 8);
        assert_eq!(old.read_all().await.unwrap(), b"v1");

        store.clear().await.unwrap();
        assert!(!store.exists("seg").await.unwrap());
        assert!(store.open_read("seg").await.unwrap_err().is_not_found());
    }
}
