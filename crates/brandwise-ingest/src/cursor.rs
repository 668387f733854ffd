//! Feed position persistence
//!
//! The cursor records the latest submission time that made it into an archive
//! file. It is the only thing that decides where the next fetch starts, so it
//! is written atomically and only after the archive exists.

use crate::error::Result;
use brandwise_common::fs::{read_json_optional, write_json_atomic};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `strftime` pattern for [`Cursor::display_label`] and archive names.
pub const LABEL_FORMAT: &str = "%Y_%m_%d_%H_%M";

/// Last position ingested from the feed.
///
/// Serialized with the field names of existing `checkpoint.json` files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Unix seconds of the latest ingested submission time
    #[serde(rename = "submission_time")]
    pub position: i64,

    /// The same instant as `YYYY_MM_DD_HH_MM`, in the feed's own UTC offset
    #[serde(rename = "submission_time_str")]
    pub display_label: String,
}

impl Cursor {
    pub fn from_submission_time(time: &DateTime<FixedOffset>) -> Self {
        Self {
            position: time.timestamp(),
            display_label: time.format(LABEL_FORMAT).to_string(),
        }
    }

    /// Feed filter selecting records strictly after this cursor.
    ///
    /// `position` is truncated to whole seconds, so reviews submitted later in
    /// the same second as the cursor are fetched again rather than skipped.
    pub fn filter(&self) -> String {
        format!("SubmissionTime:gt:{}", self.position)
    }
}

/// File-backed home of the single [`Cursor`] of a feed.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no run has completed yet.
    pub fn load(&self) -> Result<Option<Cursor>> {
        let cursor = read_json_optional(&self.path)?;
        debug!(path = %self.path.display(), ?cursor, "Loaded cursor");
        Ok(cursor)
    }

    /// Replace the stored cursor. A crash mid-save leaves the previous value.
    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        write_json_atomic(&self.path, cursor)?;
        debug!(path = %self.path.display(), position = cursor.position, "Saved cursor");
        Ok(())
    }
}
