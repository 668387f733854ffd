//! One ingestion run, end to end
//!
//! load cursor → probe → (categories) → page loop (normalize, append) →
//! archive → save cursor. Any error before the archive rename leaves the
//! cursor where it was.

use crate::config::IngestConfig;
use crate::cursor::{Cursor, CursorStore};
use crate::error::{IngestError, Result};
use crate::feed::{fetch_categories, reviews_query, FeedClient, Pager, Review};
use crate::finalize::finalize_run;
use crate::normalize::{normalize_page, PositionTracker};
use crate::progress::create_fetch_bar;
use crate::sink::WorkingFile;
use futures::TryStreamExt;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The feed had nothing after the cursor. Nothing was renamed or saved.
    NothingNew { resumed_from: Option<Cursor> },
    /// Rows were fetched, archived, and the cursor advanced.
    Archived(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: u64,
    pub pages: u64,
    pub archive: PathBuf,
    pub cursor: Cursor,
}

/// Drives ingestion runs for one feed and one data directory.
pub struct Ingestor {
    config: IngestConfig,
    client: FeedClient,
    store: CursorStore,
    run_id: Uuid,
    show_progress: bool,
}

impl Ingestor {
    /// Validates the configuration, creates the data directory and builds the
    /// feed client (resolving the passkey).
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let client = FeedClient::new(&config)?;
        let store = CursorStore::new(config.cursor_path());

        Ok(Self {
            config,
            client,
            store,
            run_id: Uuid::new_v4(),
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Use a caller-chosen identifier, e.g. one already shown to the operator.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Identifier attached to this ingestor's log span and failure log entries
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let span = info_span!("ingest_run", run_id = %self.run_id);
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> Result<RunOutcome> {
        let resumed_from = self.store.load()?;
        match &resumed_from {
            Some(cursor) => info!(
                position = cursor.position,
                label = %cursor.display_label,
                "Resuming after saved cursor"
            ),
            None => info!("No saved cursor; fetching the whole feed"),
        }

        let pager = Pager::open(
            &self.client,
            reviews_query(resumed_from.as_ref()),
            self.config.page_size,
        )
        .await?;
        let total = pager.total_count();
        if total == 0 {
            info!("No new reviews");
            return Ok(RunOutcome::NothingNew { resumed_from });
        }
        info!(total, "New reviews available");

        let categories = fetch_categories(&self.client, self.config.page_size).await?;

        let mut working = WorkingFile::new(self.config.working_file_path());
        if working.exists() {
            warn!(
                path = %working.path().display(),
                "Working file left by an interrupted run; appending to it"
            );
        }

        let bar = create_fetch_bar(total, self.show_progress);
        let mut positions = PositionTracker::new();
        let mut pages = 0u64;

        let stream = pager.pages::<Review>();
        futures::pin_mut!(stream);
        while let Some(page) = stream.try_next().await.inspect_err(|_| bar.abandon())? {
            let rows = normalize_page(&page.response, &categories, &mut positions);
            working.append(&rows).inspect_err(|_| bar.abandon())?;
            pages += 1;
            bar.inc(page.returned_count());
            debug!(
                offset = page.offset,
                returned = page.returned_count(),
                total = page.total_count,
                "Page persisted"
            );
        }
        bar.finish_and_clear();

        let rows = working.rows_written();
        if rows == 0 {
            info!("Feed returned no reviews");
            return Ok(RunOutcome::NothingNew { resumed_from });
        }

        let Some(cursor) = positions.cursor() else {
            return Err(IngestError::Timestamp(format!(
                "none of the {rows} fetched reviews had a parsable submission time; \
                 the cursor cannot advance"
            )));
        };

        let archive = finalize_run(&working, &cursor, &self.store)?;
        info!(rows, pages, archive = %archive.display(), "Run complete");

        Ok(RunOutcome::Archived(RunSummary {
            rows,
            pages,
            archive,
            cursor,
        }))
    }
}
