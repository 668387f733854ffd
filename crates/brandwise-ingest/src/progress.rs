//! Progress indicators for long-running commands
//!
//! Purely cosmetic; hidden when requested or when stderr is not a terminal.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Progress bar counting fetched reviews
pub fn create_fetch_bar(total: u64, visible: bool) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(total), draw_target(visible));
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("Downloading reviews");
    pb
}

/// Spinner for operations without a known length
pub fn create_spinner(message: &str, visible: bool) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, draw_target(visible));
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    if visible {
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

fn draw_target(visible: bool) -> ProgressDrawTarget {
    if visible {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}
