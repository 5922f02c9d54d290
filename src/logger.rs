/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Structured, append-only session logging for validation
    runs, with a SHA-256 digest sealing each session log.

  Security / Safety Notes:
    Log lines carry package names, file names, and URLs only.

  Dependencies:
    std::sync::Mutex, chrono for timestamps, sha2 for digests.

  Operational Scope:
    Shared by main and the validator; file sink optional so
    tests and `--no-log` runs write to stderr only.

  Revision History:
    2026-10-17 RMS  Adapted session logger for regcheck.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{RegcheckError, Result};

/// Severity of a log event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn always_echoed(self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session logger writing to stderr and, optionally, a log file.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
}

impl Logger {
    /// Open (appending) the log at `path`, creating parent directories.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match &path {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_append(file_path)?))),
            None => None,
        };
        Ok(Self {
            file,
            path,
            verbose,
        })
    }

    /// Emit an entry at `level`; warnings and errors always reach stderr.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let payload = format_line(level, code, message.as_ref());

        if self.verbose || level.always_echoed() {
            eprintln!("{payload}");
        }

        let Some(file) = &self.file else {
            return;
        };
        let Ok(mut guard) = file.lock() else {
            return;
        };
        if writeln!(guard, "{payload}").and_then(|()| guard.flush()).is_err() {
            eprintln!(
                "{}",
                format_line(LogLevel::Error, "LOGGER", "Failed to write to log file")
            );
        }
    }

    /// Convenience wrapper for `INFO` level events.
    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    /// Convenience wrapper for `WARN` level events.
    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    /// Convenience wrapper for `ERROR` level events.
    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    /// Convenience wrapper for `DEBUG` level events, shown with `--verbose`.
    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Path of the session log file, if one is open.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Seal the session log with a `<log>.hash` SHA-256 digest.
    ///
    /// Returns the digest path, or `None` when no file sink is configured.
    pub fn finalize(&self) -> Result<Option<PathBuf>> {
        let Some(path) = self.path() else {
            return Ok(None);
        };
        if let Some(file) = &self.file {
            if let Ok(mut guard) = file.lock() {
                guard.flush()?;
            }
        }
        let data = std::fs::read(path).map_err(|err| {
            RegcheckError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);

        let mut hash_os = path.as_os_str().to_os_string();
        hash_os.push(".hash");
        let hash_path = PathBuf::from(hash_os);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(&hash_path, format!("{digest:x}  {file_name}\n")).map_err(|err| {
            RegcheckError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        Ok(Some(hash_path))
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            RegcheckError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            RegcheckError::Filesystem(format!(
                "Failed to open log file {}: {err}",
                path.display()
            ))
        })
}

fn format_line(level: LogLevel, code: &str, message: &str) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    format!("{timestamp} [{level}] [{code}] {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_follow_session_format() {
        let line = format_line(LogLevel::Warn, "PROBE", "slow host");
        let (stamp, rest) = line.split_once(' ').unwrap();
        assert!(stamp.ends_with('Z'));
        assert_eq!(rest, "[WARN] [PROBE] slow host");
    }

    #[test]
    fn file_sink_appends_and_is_sealed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("regcheck.log");
        let logger = Logger::new(Some(path.clone()), false).unwrap();
        logger.info("INIT", "starting");
        logger.debug("PROBE", "https://cdn.example.com/a.zip ok");

        let hash_path = logger.finalize().unwrap().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("[INFO] [INIT] starting"));

        let expected = format!("{:x}  regcheck.log\n", Sha256::digest(contents.as_bytes()));
        assert_eq!(std::fs::read_to_string(hash_path).unwrap(), expected);
    }

    #[test]
    fn stderr_only_logger_has_nothing_to_seal() {
        let logger = Logger::new(None, false).unwrap();
        logger.error("INDEX", "index.json unreadable");
        assert!(logger.path().is_none());
        assert!(logger.finalize().unwrap().is_none());
    }
}
