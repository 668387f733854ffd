//! Archive the working file, then advance the cursor
//!
//! The order is what makes a run restartable: if the rename fails the cursor
//! still points at the previous run, and the working file is appended to by
//! the next one.

use crate::cursor::{Cursor, CursorStore};
use crate::error::{IngestError, Result};
use crate::sink::WorkingFile;
use std::path::{Path, PathBuf};
use tracing::info;

/// First free `<stem>_<label>.csv` next to the working file.
///
/// When an earlier run already produced that name (two runs ending in the same
/// minute), `_1`, `_2`, ... is appended.
pub fn archive_path(working: &Path, label: &str) -> PathBuf {
    let dir = working.parent().unwrap_or_else(|| Path::new(""));
    let stem = working
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Reviews".to_string());

    let candidate = dir.join(format!("{stem}_{label}.csv"));
    if !candidate.exists() {
        return candidate;
    }

    (1u32..)
        .map(|n| dir.join(format!("{stem}_{label}_{n}.csv")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Rename the working file to its archive name and save `cursor`.
///
/// Returns the archive path. A failed rename leaves both the working file and
/// the stored cursor untouched.
pub fn finalize_run(working: &WorkingFile, cursor: &Cursor, store: &CursorStore) -> Result<PathBuf> {
    let archive = archive_path(working.path(), &cursor.display_label);

    std::fs::rename(working.path(), &archive)
        .map_err(|e| IngestError::contention(working.path(), e))?;
    info!(archive = %archive.display(), "Archived working file");

    store.save(cursor)?;
    info!(
        position = cursor.position,
        label = %cursor.display_label,
        "Advanced cursor"
    );

    Ok(archive)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::RowRecord;
    use tempfile::TempDir;

    fn cursor() -> Cursor {
        Cursor {
            position: 1_715_595_630,
            display_label: "2024_05_13_10_20".to_string(),
        }
    }

    #[test]
    fn test_archive_path_collision_suffix() {
        let dir = TempDir::new().unwrap();
        let working = dir.path().join("Reviews.csv");

        let first = archive_path(&working, "2024_05_13_10_20");
        assert_eq!(first, dir.path().join("Reviews_2024_05_13_10_20.csv"));

        std::fs::write(&first, "").unwrap();
        let second = archive_path(&working, "2024_05_13_10_20");
        assert_eq!(second, dir.path().join("Reviews_2024_05_13_10_20_1.csv"));

        std::fs::write(&second, "").unwrap();
        assert_eq!(
            archive_path(&working, "2024_05_13_10_20"),
            dir.path().join("Reviews_2024_05_13_10_20_2.csv")
        );
    }

    #[test]
    fn test_finalize_renames_then_saves_cursor() {
        let dir = TempDir::new().unwrap();
        let mut working = WorkingFile::new(dir.path().join("Reviews.csv"));
        working.append(&[RowRecord::default()]).unwrap();
        let store = CursorStore::new(dir.path().join("checkpoint.json"));

        let archive = finalize_run(&working, &cursor(), &store).unwrap();

        assert!(archive.is_file());
        assert!(!working.exists());
        assert_eq!(store.load().unwrap(), Some(cursor()));
    }

    #[test]
    fn test_failed_rename_keeps_cursor() {
        let dir = TempDir::new().unwrap();
        // Nothing to rename.
        let working = WorkingFile::new(dir.path().join("Reviews.csv"));
        let store = CursorStore::new(dir.path().join("checkpoint.json"));

        let err = finalize_run(&working, &cursor(), &store).unwrap_err();

        assert!(matches!(err, IngestError::Contention { .. }));
        assert_eq!(store.load().unwrap(), None);
    }
}
