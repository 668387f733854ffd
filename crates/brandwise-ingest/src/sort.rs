//! Canonical ordering of partition files
//!
//! Every partition file is read whole, stably sorted by `(Category, Product)`
//! and atomically rewritten. Sorting an already sorted file reproduces it byte
//! for byte.

use crate::error::Result;
use crate::progress::create_spinner;
use crate::record::{read_rows, write_rows, RowRecord};
use brandwise_common::fs::replace_atomic;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortReport {
    pub files: usize,
    pub rows: u64,
}

/// Stable sort by `(Category, Product)`; empty values sort first.
pub fn canonical_order(rows: &mut [RowRecord]) {
    rows.sort_by(|a, b| {
        (a.category.as_str(), a.product.as_str()).cmp(&(b.category.as_str(), b.product.as_str()))
    });
}

/// Rewrite one partition file in canonical order. Returns its row count.
pub fn sort_partition_file(path: &Path) -> Result<usize> {
    let mut rows = read_rows(path)?;
    canonical_order(&mut rows);
    replace_atomic(path, |file| write_rows(file, &rows))?;
    debug!(path = %path.display(), rows = rows.len(), "Sorted partition file");
    Ok(rows.len())
}

/// Every `*.csv` below `root`, in a deterministic order.
pub fn partition_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "csv") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Sort every partition file under `root`. A missing root is an empty pass.
pub fn sort_partitions(root: &Path, show_progress: bool) -> Result<SortReport> {
    if !root.exists() {
        info!(root = %root.display(), "No partition files to sort");
        return Ok(SortReport::default());
    }

    let files = partition_files(root)?;
    let spinner = create_spinner("Sorting partition files", show_progress);
    let mut report = SortReport::default();

    for path in &files {
        spinner.set_message(format!("Sorting {}", path.display()));
        let rows = sort_partition_file(path).inspect_err(|_| spinner.abandon())?;
        report.files += 1;
        report.rows += rows as u64;
    }
    spinner.finish_and_clear();

    info!(files = report.files, rows = report.rows, "Sorted partition files");
    Ok(report)
}
