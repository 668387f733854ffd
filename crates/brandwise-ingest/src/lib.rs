//! Brandwise Ingest Library
//!
//! Pulls product reviews from a paginated catalog API into CSV files and
//! redistributes them into per-brand partition files.
//!
//! # Pipeline
//!
//! - **Fetch** ([`run::Ingestor`]): resume from the saved [`cursor::Cursor`],
//!   page through the feed, append every page to the working file, then archive
//!   the working file and advance the cursor.
//! - **Distribute** ([`partition::PartitionEngine`]): split archived files into
//!   per-brand (optionally per-brand-per-category) files.
//! - **Sort** ([`sort::sort_partitions`]): rewrite every partition file in
//!   `(Category, Product)` order.
//!
//! # Example
//!
//! ```no_run
//! use brandwise_ingest::{config::IngestConfig, run::{Ingestor, RunOutcome}};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     match Ingestor::new(config)?.run().await? {
//!         RunOutcome::Archived(summary) => println!("saved {}", summary.archive.display()),
//!         RunOutcome::NothingNew { .. } => println!("nothing new"),
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod error;
pub mod feed;
pub mod finalize;
pub mod normalize;
pub mod partition;
pub mod progress;
pub mod record;
pub mod run;
pub mod sink;
pub mod sort;

// Re-export commonly used types
pub use error::{IngestError, Result};
pub use record::RowRecord;
