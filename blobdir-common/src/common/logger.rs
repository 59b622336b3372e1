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

use crate::conf::LogConf;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

// Keeps the non-blocking file writer alive for the lifetime of the process.
static LOG_GUARD: OnceCell<Option<WorkerGuard>> = OnceCell::new();

pub struct Logger;

impl Logger {
    pub const STDOUT: &'static str = "stdout";

    /// Installs the global subscriber. Library crates log through the `log` facade;
    /// `try_init` also installs the `log` bridge, so those records reach the same output.
    /// Calling it more than once is harmless; only the first call takes effect.
    pub fn init(conf: LogConf) {
        LOG_GUARD.get_or_init(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(conf.level.to_lowercase()));

            let (writer, guard) = if conf.log_dir.is_empty() || conf.log_dir == Self::STDOUT {
                (BoxMakeWriter::new(std::io::stdout), None)
            } else {
                let appender = tracing_appender::rolling::daily(&conf.log_dir, &conf.file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(non_blocking), Some(guard))
            };

            let res = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_target(conf.display_target)
                .with_thread_names(conf.display_thread)
                .with_ansi(false)
                .try_init();

            if let Err(e) = res {
                eprintln!("logger already initialized: {}", e);
            }
            guard
        });
    }

    pub fn init_default() {
        Self::init(LogConf::default())
    }
}
