//! Normalized review rows and their CSV representation
//!
//! Every CSV the pipeline touches (working file, archives, partition files)
//! shares one header. All columns are text; nothing is type-inferred, so values
//! like an eye color code of `"01"` survive a round trip unchanged.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

/// Column names, in file order.
pub const CSV_HEADERS: [&str; 12] = [
    "Category",
    "Brand",
    "Product",
    "Incentivised",
    "Rating",
    "ReviewTitle",
    "Review",
    "ReviewBy",
    "Eyes",
    "Skin",
    "Skintone",
    "Hair",
];

/// One review, flattened.
///
/// Field order must match [`CSV_HEADERS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RowRecord {
    pub category: String,
    pub brand: String,
    pub product: String,
    pub incentivised: String,
    pub rating: String,
    pub review_title: String,
    pub review: String,
    pub review_by: String,
    pub eyes: String,
    pub skin: String,
    pub skintone: String,
    pub hair: String,
}

/// Encode rows into one buffer, optionally preceded by the header.
fn encode_rows(rows: &[RowRecord], with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        writer.write_record(CSV_HEADERS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// Append `rows` to the CSV at `path`, creating it with a header if it is
/// missing or empty.
///
/// A file that does not end with a line break was cut short mid-row by an
/// earlier crash. That partial row is dropped before appending so the new rows
/// start on a record boundary.
///
/// The rows are encoded up front and handed to the OS in a single write, then
/// synced, so after this returns they are on disk.
pub fn append_rows(path: &Path, rows: &[RowRecord]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let mut len = file.metadata()?.len();
    if len > 0 && !ends_with_newline(&mut file, len)? {
        let keep = last_record_start(&mut file)?;
        warn!(
            path = %path.display(),
            dropped_bytes = len - keep,
            "File ended mid-row; dropping the partial last row"
        );
        file.set_len(keep)?;
        file.sync_data()?;
        len = keep;
    }

    let bytes = encode_rows(rows, len == 0)?;
    file.write_all(&bytes)?;
    file.sync_data()?;
    Ok(())
}

fn ends_with_newline(file: &mut File, len: u64) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Byte offset at which the final record of `file` begins.
///
/// Parsed with the CSV reader rather than by scanning for line breaks, since
/// quoted review text may itself span lines.
fn last_record_start(file: &mut File) -> Result<u64> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(&mut *file);

    let mut record = csv::ByteRecord::new();
    let mut start = 0;
    loop {
        let before = reader.position().byte();
        if !reader.read_byte_record(&mut record)? {
            break;
        }
        start = record.position().map_or(before, |pos| pos.byte());
    }
    Ok(start)
}

/// Write a complete CSV (header + rows) to `writer`.
pub fn write_rows<W: Write>(writer: W, rows: &[RowRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(CSV_HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row of a CSV written by this crate.
pub fn read_rows(path: &Path) -> Result<Vec<RowRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<RowRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
