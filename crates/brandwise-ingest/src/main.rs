//! Brandwise - review feed ingestion and brand partitioning

use brandwise_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use brandwise_ingest::config::IngestConfig;
use brandwise_ingest::diagnostics::append_failure;
use brandwise_ingest::partition::{BrandCasing, PartitionEngine, PartitionLayout};
use brandwise_ingest::run::{Ingestor, RunOutcome};
use brandwise_ingest::sort::sort_partitions;
use brandwise_ingest::IngestError;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "brandwise")]
#[command(author, version, about = "Review feed ingestion and brand partitioning")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the working file, archives, cursor and failure log
    #[arg(long, env = "BRANDWISE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch reviews newer than the saved cursor and archive them
    Fetch {
        /// API passkey (falls back to passkey.config in the data directory)
        #[arg(long, env = "BRANDWISE_PASSKEY", hide_env_values = true)]
        passkey: Option<String>,

        /// API base URL
        #[arg(long, env = "BRANDWISE_API_BASE_URL")]
        api_base_url: Option<String>,

        /// Records per page (1-100)
        #[arg(long, env = "BRANDWISE_PAGE_SIZE")]
        page_size: Option<u64>,
    },

    /// Split archived review files into per-brand files, then sort them
    Distribute {
        /// Root directory of the partition files
        #[arg(long, env = "BRANDWISE_PARTITION_DIR")]
        partition_dir: Option<PathBuf>,

        /// Where distributed source files are moved
        #[arg(long, env = "BRANDWISE_ARCHIVE_DIR")]
        archive_dir: Option<PathBuf>,

        /// How brand names are normalized
        #[arg(long, value_enum, env = "BRANDWISE_BRAND_CASING")]
        casing: Option<BrandCasing>,

        /// One file per brand, or one directory per brand with a file per category
        #[arg(long, value_enum, env = "BRANDWISE_LAYOUT")]
        layout: Option<PartitionLayout>,

        /// Rows grouped in memory at a time
        #[arg(long, env = "BRANDWISE_CHUNK_ROWS")]
        chunk_rows: Option<usize>,
    },

    /// Sort every partition file by category and product
    Sort {
        /// Root directory of the partition files
        #[arg(long, env = "BRANDWISE_PARTITION_DIR")]
        partition_dir: Option<PathBuf>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Distribute { .. } => "distribute",
            Self::Sort { .. } => "sort",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("brandwise")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Ignoring invalid LOG_* settings: {e:#}");
            log_config
        },
    };

    // The tool works without logging
    let _guard = init_logging(&log_config)
        .inspect_err(|e| eprintln!("Logging disabled: {e:#}"))
        .ok();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => return report_failure(e, None),
    };

    let run_id = Uuid::new_v4();
    let context = format!("{} run_id={run_id}", cli.command.name());
    let failure_log = config.failure_log_path();
    let show_progress = !cli.no_progress && std::io::stderr().is_terminal();

    let result = match cli.command {
        Command::Fetch { .. } => {
            tokio::select! {
                result = fetch(config, run_id, show_progress) => result,
                _ = interrupted() => {
                    warn!(%run_id, "Interrupted");
                    eprintln!(
                        "Interrupted. Pages saved so far stay in the working file; run `brandwise fetch` again to continue."
                    );
                    return ExitCode::from(130);
                },
            }
        },
        Command::Distribute { .. } => {
            let _span = info_span!("distribute", %run_id).entered();
            distribute(&config, show_progress)
        },
        Command::Sort { .. } => {
            let _span = info_span!("sort", %run_id).entered();
            sort(&config, show_progress)
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(e, Some((&failure_log, &context))),
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Environment and `.env`, then command-line flags.
fn load_config(cli: &Cli) -> brandwise_ingest::Result<IngestConfig> {
    let mut config = IngestConfig::from_env()?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    match &cli.command {
        Command::Fetch {
            passkey,
            api_base_url,
            page_size,
        } => {
            if let Some(passkey) = passkey {
                config.passkey = Some(passkey.clone());
            }
            if let Some(url) = api_base_url {
                config.api_base_url = url.clone();
            }
            if let Some(size) = page_size {
                config.page_size = *size;
            }
        },
        Command::Distribute {
            partition_dir,
            archive_dir,
            casing,
            layout,
            chunk_rows,
        } => {
            if let Some(dir) = partition_dir {
                config.partition_dir = dir.clone();
            }
            if let Some(dir) = archive_dir {
                config.archive_dir = dir.clone();
            }
            if let Some(casing) = casing {
                config.casing = *casing;
            }
            if let Some(layout) = layout {
                config.layout = *layout;
            }
            if let Some(rows) = chunk_rows {
                config.chunk_rows = *rows;
            }
        },
        Command::Sort { partition_dir } => {
            if let Some(dir) = partition_dir {
                config.partition_dir = dir.clone();
            }
        },
    }

    config.validate()?;
    Ok(config)
}

async fn fetch(config: IngestConfig, run_id: Uuid, show_progress: bool) -> brandwise_ingest::Result<()> {
    let ingestor = Ingestor::new(config)?
        .with_run_id(run_id)
        .with_progress(show_progress);

    match ingestor.run().await? {
        RunOutcome::Archived(summary) => {
            println!(
                "Saved {} reviews to {} (up to {})",
                summary.rows,
                summary.archive.display(),
                summary.cursor.display_label
            );
        },
        RunOutcome::NothingNew {
            resumed_from: Some(cursor),
        } => println!("No new reviews since {}", cursor.display_label),
        RunOutcome::NothingNew { resumed_from: None } => println!("The feed has no reviews yet"),
    }
    Ok(())
}

fn distribute(config: &IngestConfig, show_progress: bool) -> brandwise_ingest::Result<()> {
    let engine = PartitionEngine::new(config.partition())?.with_progress(show_progress);
    let report = engine.distribute()?;

    if report.distributed.is_empty() {
        println!("No new files to distribute");
    } else {
        println!(
            "Distributed {} rows from {} files into {} partition files",
            report.rows,
            report.distributed.len(),
            report.partitions.len()
        );
    }

    for path in &report.incomplete {
        println!(
            "Warning: {} is left over from a distribution that did not finish. Its rows may already be in the brand files; check them before renaming it back.",
            path.display()
        );
    }
    for path in &report.blocked {
        println!(
            "Warning: {} was skipped because a file with its processing_ name already exists.",
            path.display()
        );
    }

    sort(config, show_progress)
}

fn sort(config: &IngestConfig, show_progress: bool) -> brandwise_ingest::Result<()> {
    let report = sort_partitions(&config.partition().partition_dir, show_progress)?;
    info!(files = report.files, rows = report.rows, "Sort pass complete");
    println!("Sorted {} partition files ({} rows)", report.files, report.rows);
    Ok(())
}

/// Print an error the way its kind calls for and pick the exit code.
///
/// Unexpected errors are also appended to the failure log, when one is known.
fn report_failure(err: IngestError, failure_log: Option<(&Path, &str)>) -> ExitCode {
    let causes = err.causes();
    error!(error = %err, causes = ?causes, "Command failed");

    if err.is_remote() {
        eprintln!("Error: {err}");
        for cause in &causes {
            eprintln!("  Caused by: {cause}");
        }
        eprintln!("Nothing was archived and the cursor was not moved; run the command again later.");
        return ExitCode::FAILURE;
    }

    if err.is_actionable() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let err = anyhow::Error::from(err);
    match failure_log {
        Some((path, context)) => match append_failure(path, context, &err) {
            Ok(()) => eprintln!(
                "Unexpected error: {err}. Details were written to {}",
                path.display()
            ),
            Err(log_err) => {
                eprintln!("Unexpected error: {err:?}");
                eprintln!("(could not write {}: {log_err})", path.display());
            },
        },
        None => eprintln!("Unexpected error: {err:?}"),
    }
    ExitCode::FAILURE
}
