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

mod fs_error;
pub use self::fs_error::FsError;

/// Returns `Err(FsError::Common)` built from a message or a format string.
#[macro_export]
macro_rules! err_box {
    ($msg:expr) => {
        Err($crate::error::FsError::common($msg))
    };
    ($fmt:expr, $($arg:tt)+) => {
        Err($crate::error::FsError::common(format!($fmt, $($arg)+)))
    };
}

/// Returns `Err` wrapping an already typed error.
#[macro_export]
macro_rules! err_ext {
    ($e:expr) => {
        Err($e.into())
    };
}

/// Builds an `FsError::Common` without wrapping it in `Err`.
#[macro_export]
macro_rules! err_msg {
    ($fmt:expr) => {
        $crate::error::FsError::common($fmt)
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::error::FsError::common(format!($fmt, $($arg)+))
    };
}
