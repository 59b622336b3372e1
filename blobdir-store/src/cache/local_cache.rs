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
use blobdir_common::common::{LocalTime, Utils};
use blobdir_common::error::FsError;
use blobdir_common::fs::{Reader, Writer};
use blobdir_common::state::CacheStatus;
use blobdir_common::FsResult;
use log::warn;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

const TMP_SUFFIX: &str = ".blobdir-tmp";

/// Cache entries stored as plain files in one local directory.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    dir: PathBuf,
}

impl LocalCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> FsResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            FsError::IO(format!("failed to create cache dir {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> FsResult<PathBuf> {
        check_name(name)?;
        Ok(self.dir.join(name))
    }
}

impl CacheStore for LocalCacheStore {
    type Reader = LocalCacheReader;
    type Writer = LocalCacheWriter;

    async fn exists(&self, name: &str) -> FsResult<bool> {
        let path = self.path(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn status(&self, name: &str) -> FsResult<CacheStatus> {
        let path = self.path(name)?;
        let meta = tokio::fs::metadata(&path).await?;
        let mtime = meta
            .modified()
            .map(LocalTime::system_time_mills)
            .unwrap_or(0);
        Ok(CacheStatus {
            len: meta.len() as i64,
            mtime,
        })
    }

    async fn open_read(&self, name: &str) -> FsResult<LocalCacheReader> {
        let path = self.path(name)?;
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len() as i64;
        Ok(LocalCacheReader {
            name: name.to_string(),
            file: Arc::new(Mutex::new(file)),
            len,
            pos: 0,
        })
    }

    async fn open_write(&self, name: &str) -> FsResult<LocalCacheWriter> {
        let path = self.path(name)?;
        let tmp_path = self
            .dir
            .join(format!("{}.{}{}", name, Utils::rand_str(8), TMP_SUFFIX));
        let file = File::create(&tmp_path).await?;
        Ok(LocalCacheWriter {
            name: name.to_string(),
            path,
            tmp_path,
            inner: Some(BufWriter::new(file)),
            pos: 0,
        })
    }

    async fn delete(&self, name: &str) -> FsResult<()> {
        let path = self.path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> FsResult<Vec<String>> {
        let mut res = vec![];
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(TMP_SUFFIX) {
                res.push(name);
            }
        }
        res.sort();
        Ok(res)
    }
}

/// Clones share the open file and keep independent positions.
#[derive(Debug, Clone)]
pub struct LocalCacheReader {
    name: String,
    file: Arc<Mutex<File>>,
    len: i64,
    pos: i64,
}

impl Reader for LocalCacheReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> i64 {
        self.len
    }

    fn pos(&self) -> i64 {
        self.pos
    }

    async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        let want = (self.remaining() as usize).min(buf.len());
        if want == 0 {
            return Ok(0);
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(self.pos as u64)).await?;
        let n = file.read(&mut buf[..want]).await?;
        self.pos += n as i64;
        Ok(n)
    }

    async fn seek(&mut self, pos: i64) -> FsResult<()> {
        if pos < 0 {
            return Err(FsError::common(format!("{}: invalid seek position {}", self.name, pos)));
        }
        self.pos = pos.min(self.len);
        Ok(())
    }

    async fn complete(&mut self) -> FsResult<()> {
        Ok(())
    }
}

/// Writes into a temporary file that replaces the entry atomically on `complete`.
pub struct LocalCacheWriter {
    name: String,
    path: PathBuf,
    tmp_path: PathBuf,
    inner: Option<BufWriter<File>>,
    pos: i64,
}

impl LocalCacheWriter {
    fn inner(&mut self) -> FsResult<&mut BufWriter<File>> {
        match self.inner.as_mut() {
            Some(v) => Ok(v),
            None => Err(FsError::common(format!("{}: writer already closed", self.name))),
        }
    }
}

impl Writer for LocalCacheWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn pos(&self) -> i64 {
        self.pos
    }

    async fn write(&mut self, buf: &[u8]) -> FsResult<()> {
        self.inner()?.write_all(buf).await?;
        self.pos += buf.len() as i64;
        Ok(())
    }

    async fn flush(&mut self) -> FsResult<()> {
        self.inner()?.flush().await?;
        Ok(())
    }

    async fn complete(&mut self) -> FsResult<()> {
        let mut inner = match self.inner.take() {
            Some(v) => v,
            None => return Ok(()),
        };
        inner.flush().await?;
        inner.get_ref().sync_all().await?;
        drop(inner);

        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        Ok(())
    }

    async fn cancel(&mut self) -> FsResult<()> {
        if self.inner.take().is_some() {
            match tokio::fs::remove_file(&self.tmp_path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => (),
            }
        }
        Ok(())
    }
}

impl Drop for LocalCacheWriter {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.tmp_path) {
                warn!("failed to remove {}: {}", self.tmp_path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path().join("cache")).unwrap();

        let mut writer = store.open_write("_0.cfs").await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        writer.flush().await.unwrap();
        assert!(!store.exists("_0.cfs").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());

        writer.complete().await.unwrap();
        assert_eq!(store.length("_0.cfs").await.unwrap(), 11);
        assert!(store.modified_time("_0.cfs").await.unwrap() > 0);

        let mut reader = store.open_read("_0.cfs").await.unwrap();
        let mut buf = [0u8; 5];
        reader.read_full(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        let mut dup = reader.clone();
        assert_eq!(dup.pos(), 5);
        assert_eq!(dup.read_all().await.unwrap(), b" world");
        assert_eq!(reader.read_at(6, &mut buf).await.unwrap(), 5);
        assert_eq!(&buf, b"world");
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert!(reader.read_full(&mut buf).await.is_err());

        assert_eq!(store.list().await.unwrap(), vec!["_0.cfs"]);
        store.delete("_0.cfs").await.unwrap();
        store.delete("_0.cfs").await.unwrap();
        assert!(store.status("_0.cfs").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn cancel_and_drop_leave_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path()).unwrap();

        let mut writer = store.open_write("a").await.unwrap();
        writer.write(b"abc").await.unwrap();
        writer.cancel().await.unwrap();

        {
            let mut writer = store.open_write("b").await.unwrap();
            writer.write(b"abc").await.unwrap();
        }

        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejects_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::new(dir.path()).unwrap();
        assert!(store.open_write("a/b").await.is_err());
        assert!(store.exists("..").await.is_err());
    }
}
