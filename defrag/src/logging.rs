// voldefrag
// Copyright (C) 2026 the voldefrag contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! A `log::Log` implementor writing the append-only, UTF-8, line-oriented,
//! timestamp-prefixed format §6 specifies:
//! `YYYY-MM-DDTHH:MM:SS.sss<space><message>`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// The CLI's `-d` debug-level table has seven names but `log::Level` only
/// has five variants. `Progress`/`DetailedProgress` map onto `Info`;
/// `DetailedFileInfo`/`DetailedGapFinding`/`DetailedGapFilling` map onto
/// `Debug`/`Trace`, distinguished at the call site by which one phases use,
/// not by a wider enum here.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Fatal,
    Warning,
    Progress,
    DetailedProgress,
    DetailedFileInfo,
    DetailedGapFinding,
    DetailedGapFilling,
}

impl DebugLevel {
    pub const fn to_level_filter(self) -> LevelFilter {
        match self {
            DebugLevel::Fatal => LevelFilter::Error,
            DebugLevel::Warning => LevelFilter::Warn,
            DebugLevel::Progress | DebugLevel::DetailedProgress => LevelFilter::Info,
            DebugLevel::DetailedFileInfo => LevelFilter::Debug,
            DebugLevel::DetailedGapFinding | DebugLevel::DetailedGapFilling => LevelFilter::Trace,
        }
    }
}

pub struct SessionLogger {
    file: Mutex<Option<File>>,
    filter: LevelFilter,
}

impl SessionLogger {
    pub fn to_stderr(level: DebugLevel) -> Self {
        Self {
            file: Mutex::new(None),
            filter: level.to_level_filter(),
        }
    }

    pub fn to_file(path: &Path, level: DebugLevel) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(Some(file)),
            filter: level.to_level_filter(),
        })
    }

    fn format_line(record: &Record) -> String {
        let now = Local::now();
        format!("{}{} {}\n", now.format("%Y-%m-%dT%H:%M:%S"), format_millis(now), record.args())
    }

    /// Installs this logger as the global `log` facade target. Call once
    /// from `main`; subsequent calls are a no-op (per `log::set_logger`'s
    /// contract).
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let filter = self.filter;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(filter);
        Ok(())
    }
}

fn format_millis(now: chrono::DateTime<Local>) -> String {
    use chrono::Timelike;
    format!(".{:03}", now.nanosecond() / 1_000_000)
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = Self::format_line(record);
        let mut guard = self.file.lock().unwrap_or_else(|poison| poison.into_inner());
        match guard.as_mut() {
            Some(file) => {
                let _ = file.write_all(line.as_bytes());
            }
            None => {
                eprint!("{line}");
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_level_table_maps_onto_log_level_filter() {
        assert_eq!(DebugLevel::Fatal.to_level_filter(), LevelFilter::Error);
        assert_eq!(DebugLevel::DetailedGapFilling.to_level_filter(), LevelFilter::Trace);
        assert!(DebugLevel::Progress.to_level_filter() <= DebugLevel::DetailedProgress.to_level_filter());
    }

    #[test]
    fn logger_writes_a_line_to_its_own_file() {
        let dir = std::env::temp_dir().join(format!("voldefrag-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.log");

        let logger = SessionLogger::to_file(&path, DebugLevel::Progress).unwrap();
        let record = Record::builder()
            .args(format_args!("hello"))
            .level(Level::Info)
            .build();
        logger.log(&record);
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.trim_end().ends_with("hello"));
        assert!(contents.contains('T'));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
