//! Shared helpers: timestamped logging to the cache-dir log file.
//!
//! Stdout is reserved for command output (digest lines, listings); log lines
//! go to stderr and the log file.

use std::fs::OpenOptions;
use std::io::Write;

use chrono::Local;

pub const LOG_FILE: &str = "logs.txt";

fn is_quiet() -> bool {
    if std::env::var("CREST_QUIET")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false)
    {
        return true;
    }
    std::env::var("CREST_LOG")
        .map(|v| v.to_lowercase() == "quiet" || v.to_lowercase() == "error")
        .unwrap_or(false)
}

fn append_to_log_file(line: &str) {
    let path = crate::cache::cache_dir().join(LOG_FILE);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&path) {
        let _ = writeln!(file, "{}", line);
    }
}

/// Log an informational message (stderr + log file; stderr suppressed when quiet).
pub fn log(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let line = format!("[{}] {}", timestamp, message);
    if !is_quiet() {
        eprintln!("{}", line);
    }
    append_to_log_file(&line);
}

/// Log an error message (always printed to stderr, plus log file).
pub fn log_error(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let line = format!("[{}] ERROR: {}", timestamp, message);
    eprintln!("{}", line);
    append_to_log_file(&line);
}
