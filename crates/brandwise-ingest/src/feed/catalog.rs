//! Category id to name side table

use crate::error::Result;
use crate::feed::client::{FeedClient, FeedQuery};
use crate::feed::pager::Pager;
use crate::feed::types::Category;
use crate::feed::CATEGORIES_PATH;
use futures::TryStreamExt;
use std::collections::HashMap;
use tracing::info;

/// Category names keyed by category id.
pub type CategoryTable = HashMap<String, String>;

/// Download the whole category list.
pub async fn fetch_categories(client: &FeedClient, page_size: u64) -> Result<CategoryTable> {
    let pager = Pager::open(client, FeedQuery::new(CATEGORIES_PATH), page_size).await?;
    info!(total = pager.total_count(), "Downloading categories");

    let pages = pager.pages::<Category>();
    futures::pin_mut!(pages);

    let mut table = CategoryTable::new();
    while let Some(page) = pages.try_next().await? {
        for category in page.response.results {
            if let (Some(id), Some(name)) = (category.id, category.name) {
                table.insert(id, name);
            }
        }
    }

    info!(categories = table.len(), "Category table ready");
    Ok(table)
}
