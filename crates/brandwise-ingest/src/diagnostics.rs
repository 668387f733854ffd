//! Persistent record of unexpected failures
//!
//! Remote and contention errors are explained on the terminal. Anything else
//! is appended here in full so it can be sent to whoever maintains the tool.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const FAILURE_LOG_NAME: &str = "failures.log";

/// Append a timestamped entry with the full error chain to `path`.
pub fn append_failure(path: &Path, context: &str, error: &anyhow::Error) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let entry = format!(
        "[{}] {context}\n{error:?}\n\n",
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    file.write_all(entry.as_bytes())?;
    file.sync_data()
}
