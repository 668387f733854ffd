//! Page-at-a-time persistence of fetched rows
//!
//! Each page is on disk before the next one is requested. A crash after page
//! N leaves pages 1..N in the working file; the cursor has not moved, so the
//! next run fetches those reviews again and appends them a second time. That
//! duplication is accepted: removing it would mean buffering a whole run.

use crate::error::Result;
use crate::record::{append_rows, RowRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The single file a run appends to before it is archived.
#[derive(Debug)]
pub struct WorkingFile {
    path: PathBuf,
    rows_written: u64,
}

impl WorkingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Rows appended through this handle (not counting earlier runs)
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Append one page of rows and flush it to disk.
    pub fn append(&mut self, rows: &[RowRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        append_rows(&self.path, rows)?;
        self.rows_written += rows.len() as u64;
        debug!(
            path = %self.path.display(),
            rows = rows.len(),
            total = self.rows_written,
            "Appended page to working file"
        );
        Ok(())
    }
}
