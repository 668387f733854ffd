//! Raw feed records to flat CSV rows
//!
//! Pure functions: no I/O. Missing values never fail a row; they become a fixed
//! placeholder (`"Unknown"`, `"No"`) or an empty string.

use crate::cursor::Cursor;
use crate::feed::{CategoryTable, FeedResponse, Review};
use crate::record::RowRecord;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::warn;

/// Placeholder for a missing brand, product name or rating.
pub const UNKNOWN: &str = "Unknown";

/// Upper-case the first character and put a `/` before every later
/// upper-case character: `"oliveUndertone"` becomes `"Olive/Undertone"`.
pub fn slash_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut chars = input.chars();

    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
    }
    for c in chars {
        if c.is_uppercase() {
            out.push('/');
        }
        out.push(c);
    }
    out
}

/// `"<n> out of 5 stars."`, or `"Unknown"` when there is no rating.
pub fn rating_label(rating: Option<&Value>) -> String {
    let n = match rating {
        None | Some(Value::Null) => return UNKNOWN.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => return UNKNOWN.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };
    format!("{n} out of 5 stars.")
}

/// Running maximum of the submission times seen during a run.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    latest: Option<DateTime<FixedOffset>>,
    unparsable: u64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw `SubmissionTime` into the maximum.
    ///
    /// Returns `false` (and counts it) when the value is not RFC 3339.
    pub fn observe(&mut self, raw: &str) -> bool {
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(time) => {
                if self.latest.is_none_or(|latest| time > latest) {
                    self.latest = Some(time);
                }
                true
            }
            Err(e) => {
                self.unparsable += 1;
                warn!(submission_time = raw, error = %e, "Ignoring unparsable submission time");
                false
            }
        }
    }

    pub fn latest(&self) -> Option<&DateTime<FixedOffset>> {
        self.latest.as_ref()
    }

    /// Number of submission times that could not be parsed
    pub fn unparsable(&self) -> u64 {
        self.unparsable
    }

    /// Cursor for the latest submission time, if any was seen.
    pub fn cursor(&self) -> Option<Cursor> {
        self.latest.as_ref().map(Cursor::from_submission_time)
    }
}

/// Flatten every review of a page, in page order.
///
/// Product details come from the page's own `Includes.Products`; category
/// names from the run's category table.
pub fn normalize_page(
    page: &FeedResponse<Review>,
    categories: &CategoryTable,
    positions: &mut PositionTracker,
) -> Vec<RowRecord> {
    page.results
        .iter()
        .map(|review| {
            match review.submission_time.as_deref() {
                Some(raw) => {
                    positions.observe(raw);
                }
                None => warn!(product_id = ?review.product_id, "Review has no submission time"),
            }
            normalize_review(page, review, categories)
        })
        .collect()
}

fn normalize_review(
    page: &FeedResponse<Review>,
    review: &Review,
    categories: &CategoryTable,
) -> RowRecord {
    let product = review
        .product_id
        .as_ref()
        .and_then(|id| page.includes.products.get(id));

    let category = product
        .and_then(|p| p.category_id.as_ref())
        .and_then(|id| categories.get(id))
        .cloned()
        .unwrap_or_default();

    let brand = product
        .and_then(|p| p.brand.as_ref())
        .and_then(|b| b.name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN);

    let product_name = product
        .and_then(|p| p.name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN);

    let label = |key: &str| review.context_label(key).unwrap_or_default().to_string();

    RowRecord {
        category,
        brand: brand.to_string(),
        product: product_name.to_string(),
        incentivised: review
            .context_label("IncentivizedReview")
            .unwrap_or("No")
            .to_string(),
        rating: rating_label(review.rating.as_ref()),
        review_title: review.title.clone().unwrap_or_default(),
        review: review.review_text.clone().unwrap_or_default(),
        review_by: review.user_nickname.clone().unwrap_or_default(),
        eyes: label("eyeColor"),
        skin: label("skinType"),
        skintone: slash_case(&label("skinTone")),
        hair: label("hairColor"),
    }
}
