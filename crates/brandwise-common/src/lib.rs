//! Brandwise Common Library
//!
//! Shared plumbing for the Brandwise workspace members.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup for console and rolling files
//! - **Files**: atomic replace-by-rename and partition file naming
//!
//! # Example
//!
//! ```no_run
//! use brandwise_common::fs::{read_json_optional, write_json_atomic};
//! use std::collections::BTreeMap;
//!
//! fn bump(path: &std::path::Path) -> brandwise_common::Result<()> {
//!     let mut counts: BTreeMap<String, u64> = read_json_optional(path)?.unwrap_or_default();
//!     *counts.entry("runs".to_string()).or_default() += 1;
//!     write_json_atomic(path, &counts)
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod fs;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
