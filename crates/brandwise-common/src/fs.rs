//! Crash-safe file helpers
//!
//! Every helper that replaces a file writes a sibling temporary file first and
//! renames it over the target. Rename within one directory is atomic on the
//! platforms we run on, so a concurrent reader (or the next process after a
//! crash) sees either the old contents or the new contents, never a mix.

use crate::error::{CommonError, Result};
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

fn parent_dir(path: &Path) -> Result<&Path> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(Path::new(".")),
        Some(parent) => Ok(parent),
        None => Err(CommonError::NoParent(path.to_path_buf())),
    }
}

/// Replace `path` with the bytes produced by `write`.
///
/// The closure receives a temporary file in the same directory as `path`.
/// If it fails, the temporary file is removed and `path` is left untouched.
pub fn replace_atomic<F, E>(path: &Path, write: F) -> std::result::Result<(), E>
where
    F: FnOnce(&mut File) -> std::result::Result<(), E>,
    E: From<io::Error> + From<CommonError>,
{
    let dir = parent_dir(path)?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    replace_atomic(path, |file| -> Result<()> {
        file.write_all(&bytes)?;
        Ok(())
    })
}

/// Read a JSON state file.
///
/// A missing or blank file is `Ok(None)`. Anything else that does not parse is
/// reported as [`CommonError::CorruptState`] rather than silently reset.
pub fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| CommonError::CorruptState {
            path: path.to_path_buf(),
            source,
        })
}

/// Turns free-form labels (brand or category names) into file names.
#[derive(Debug, Clone)]
pub struct FileNameSanitizer {
    non_word: Regex,
}

impl FileNameSanitizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            non_word: Regex::new(r"[^\w]+")?,
        })
    }

    /// Trim, then collapse every run of non-word characters into one `_`.
    pub fn stem(&self, label: &str) -> String {
        self.non_word.replace_all(label.trim(), "_").into_owned()
    }

    /// `<stem>.csv`, using `fallback` when the label has no usable characters.
    pub fn csv_name(&self, label: &str, fallback: &str) -> String {
        let stem = self.stem(label);
        if stem.is_empty() {
            format!("{}.csv", self.stem(fallback))
        } else {
            format!("{stem}.csv")
        }
    }
}
