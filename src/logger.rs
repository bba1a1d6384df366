/*
 * This file is part of Cyclone.
 *
 * Copyright (C) 2025 Cyclone contributors
 *
 * Cyclone is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Cyclone is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Cyclone. If not, see <https://www.gnu.org/licenses/>.
 */

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::macros::format_description;
use tracing::warn;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::constants::paths;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "CYCLONE_LOG";

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Append log records to this file as well as stderr
    pub file: Option<PathBuf>,
    /// Also send records to the systemd journal when it is running
    pub journald: bool,
}

/// Where records end up after `init_logging`
#[derive(Debug, Clone, Default)]
pub struct LogSinks {
    pub file: Option<PathBuf>,
    pub journald: bool,
}

pub fn log_level() -> String {
    env::var(LOG_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

/// Open `path` for appending, creating it and its parent directory if needed
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. A log file that cannot be opened, or a
/// journal that is not running, is reported and skipped.
pub fn init_logging(opts: &LogOptions) -> LogSinks {
    let level = log_level();
    let timer = UtcTime::new(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .with_timer(timer.clone());

    let mut file_error = None;
    let file_layer = match &opts.file {
        Some(path) => match open_log_file(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_level(true)
                    .with_timer(timer),
            ),
            Err(e) => {
                file_error = Some((path.clone(), e));
                None
            }
        },
        None => None,
    };

    let mut journald_error = None;
    let journald_layer = if opts.journald && Path::new(paths::JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer),
            Err(e) => {
                journald_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    let sinks = LogSinks {
        file: file_layer.as_ref().and(opts.file.clone()),
        journald: journald_layer.is_some(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(&level))
        .with(stderr_layer)
        .with(file_layer)
        .with(journald_layer)
        .init();

    if let Some((path, e)) = file_error {
        warn!("cannot open log file {}: {}; logging to stderr only", path.display(), e);
    }
    if let Some(e) = journald_error {
        warn!("cannot connect to the systemd journal: {}", e);
    } else if opts.journald && !sinks.journald {
        warn!("systemd journal not running; --journald ignored");
    }

    sinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_log_level_default() {
        env::remove_var(LOG_ENV);
        assert_eq!(log_level(), "info");
    }

    #[test]
    #[serial]
    fn test_log_level_from_env() {
        env::set_var(LOG_ENV, "debug");
        assert_eq!(log_level(), "debug");
        env::set_var(LOG_ENV, "  ");
        assert_eq!(log_level(), "info");
        env::remove_var(LOG_ENV);
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log").join("pi-cyclone.log");

        let mut f = open_log_file(&path).unwrap();
        writeln!(f, "first").unwrap();
        drop(f);
        let mut f = open_log_file(&path).unwrap();
        writeln!(f, "second").unwrap();
        drop(f);

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_unwritable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        assert!(open_log_file(&blocker.join("pi-cyclone.log")).is_err());
    }
}
