//! Remote feed access: client, pagination and the category side table
//!
//! Reviews are requested oldest first so that a run's last record is (normally)
//! its newest, and a resumed run only asks for records after the saved cursor.

pub mod catalog;
pub mod client;
pub mod pager;
pub mod types;

pub use catalog::{fetch_categories, CategoryTable};
pub use client::{FeedClient, FeedQuery};
pub use pager::{Page, Pager, MAX_PAGE_SIZE};
pub use types::{FeedResponse, Review};

use crate::cursor::Cursor;

pub const REVIEWS_PATH: &str = "data/reviews.json";
pub const CATEGORIES_PATH: &str = "data/categories.json";

/// Query for English reviews, oldest first, with product side tables.
///
/// With a cursor, only reviews submitted after it are selected.
pub fn reviews_query(after: Option<&Cursor>) -> FeedQuery {
    let query = FeedQuery::new(REVIEWS_PATH)
        .param("Filter", "contentlocale:en*")
        .param("Sort", "SubmissionTime:asc")
        .param("Include", "Products,Comments")
        .param("Stats", "Reviews");

    match after {
        Some(cursor) => query.param("Filter", cursor.filter()),
        None => query,
    }
}
