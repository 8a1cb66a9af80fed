//! Helpers for the daily append-only log file.
//!
//! The binary writes logs through `tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)`,
//! which names each day's file `<prefix>.<YYYY-MM-DD>` (UTC date).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::Result;

pub const LOG_FILE_PREFIX: &str = "signalbot.log";

/// Path of the log file written on `date`.
pub fn daily_log_path(dir: impl AsRef<Path>, date: NaiveDate) -> PathBuf {
    dir.as_ref()
        .join(format!("{LOG_FILE_PREFIX}.{}", date.format("%Y-%m-%d")))
}

/// Last `lines` lines of the file at `path`. `Ok(None)` when it does not exist.
pub fn tail_lines(path: impl AsRef<Path>, lines: usize) -> Result<Option<String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(Some(all[start..].join("\n").trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_uses_rolling_appender_naming() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let path = daily_log_path("logs", date);
        assert_eq!(path, PathBuf::from("logs/signalbot.log.2024-03-01"));
    }

    #[test]
    fn tail_returns_last_lines() {
        let dir = std::env::temp_dir().join(format!("signalbot-tail-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.log");
        let body: String = (1..=15).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, body).unwrap();

        let tail = tail_lines(&path, 3).unwrap().unwrap();
        assert_eq!(tail, "line 13\nline 14\nline 15");

        let all = tail_lines(&path, 100).unwrap().unwrap();
        assert!(all.starts_with("line 1\n"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn tail_of_missing_file_is_none() {
        assert!(tail_lines("no/such/file.log", 10).unwrap().is_none());
    }
}
