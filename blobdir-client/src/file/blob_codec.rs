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

use blobdir_common::conf::CompressConf;
use blobdir_common::error::FsError;
use blobdir_common::FsResult;
use bytes::Bytes;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Decides per file name whether remote content is deflate-compressed.
#[derive(Debug, Clone, Default)]
pub struct BlobCodec {
    conf: CompressConf,
}

impl BlobCodec {
    pub fn new(conf: CompressConf) -> Self {
        Self { conf }
    }

    pub fn is_compressed(&self, name: &str) -> bool {
        self.conf.should_compress(name)
    }

    pub fn encode(&self, name: &str, data: &[u8]) -> FsResult<Bytes> {
        if !self.is_compressed(name) {
            return Ok(Bytes::copy_from_slice(data));
        }

        let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    pub fn decode(&self, name: &str, data: Bytes) -> FsResult<Bytes> {
        if !self.is_compressed(name) {
            return Ok(data);
        }

        let mut out = vec![];
        DeflateDecoder::new(data.as_ref())
            .read_to_end(&mut out)
            .map_err(|e| FsError::IO(format!("{}: corrupt deflate stream: {}", name, e)))?;
        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_extensions_are_compressed() {
        let codec = BlobCodec::new(CompressConf {
            enable: true,
            extensions: vec!["cfs".to_string()],
        });

        let data = "abcdefgh".repeat(256);
        let encoded = codec.encode("_0.cfs", data.as_bytes()).unwrap();
        assert!(encoded.len() < data.len());
        assert_eq!(codec.decode("_0.cfs", encoded).unwrap(), data.as_bytes());

        let plain = codec.encode("segments_1", data.as_bytes()).unwrap();
        assert_eq!(plain.len(), data.len());

        assert!(codec.decode("_0.cfs", Bytes::from_static(b"not deflate")).is_err());
    }
}
