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

mod blob_dir_conf;
pub use self::blob_dir_conf::BlobDirConf;

mod directory_conf;
pub use self::directory_conf::*;

mod store_conf;
pub use self::store_conf::StoreConf;

mod lock_conf;
pub use self::lock_conf::LockConf;

mod compress_conf;
pub use self::compress_conf::CompressConf;

mod log_conf;
pub use self::log_conf::LogConf;
