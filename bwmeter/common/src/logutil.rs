// Copyright (c) Facebook, Inc. and its affiliates.
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


use std::fs::OpenOptions;
use std::path::Path;

use slog::Drain;
use slog::Level;
use slog::error;
use slog::o;

/// Plain stderr logger, used before config is loaded and in tests.
pub fn get_logger() -> slog::Logger {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stderr());
    slog::Logger::root(slog_term::FullFormat::new(plain).build().fuse(), o!())
}

fn filtered_root<D>(drain: D, debug: bool) -> slog::Logger
where
    D: 'static + slog::SendSyncRefUnwindSafeDrain<Ok = (), Err = slog::Never> + std::panic::UnwindSafe,
{
    let level = if debug { Level::Debug } else { Level::Info };
    slog::Logger::root(slog::LevelFilter::new(drain, level).fuse(), o!())
}

/// Build the root logger for the process.
///
/// Records always go to stderr. When `log_path` is given they are also
/// appended to that file. If the file cannot be opened we keep logging to
/// stderr only and say so.
pub fn setup(log_path: Option<&Path>, debug: bool) -> slog::Logger {
    let term = slog_term::FullFormat::new(slog_term::PlainSyncDecorator::new(std::io::stderr()))
        .build()
        .fuse();

    let path = match log_path {
        Some(path) => path,
        None => return filtered_root(term, debug),
    };

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let file = slog_term::FullFormat::new(slog_term::PlainSyncDecorator::new(file))
                .build()
                .fuse();
            filtered_root(slog::Duplicate::new(term, file).fuse(), debug)
        }
        Err(e) => {
            let logger = filtered_root(term, debug);
            error!(
                logger,
                "Fail to open log path {}: {}. Logging to stderr only.",
                path.display(),
                e
            );
            logger
        }
    }
}
