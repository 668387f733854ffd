//! Wire types of the catalog feed API
//!
//! Only the fields the pipeline reads are modelled; everything else in the
//! payload is ignored. Every field is optional on the wire.

use serde::Deserialize;
use std::collections::HashMap;

/// Envelope shared by every paginated endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedResponse<T> {
    #[serde(default)]
    pub total_results: u64,

    #[serde(default = "Vec::new")]
    pub results: Vec<T>,

    #[serde(default)]
    pub includes: Includes,

    #[serde(default)]
    pub has_errors: bool,

    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

/// Side tables embedded in a page (`Include=Products`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Includes {
    #[serde(default)]
    pub products: HashMap<String, Product>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub name: Option<String>,
    pub category_id: Option<String>,
    pub brand: Option<Brand>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Brand {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Review {
    pub product_id: Option<String>,
    /// Usually an integer, occasionally a string
    pub rating: Option<serde_json::Value>,
    pub title: Option<String>,
    pub review_text: Option<String>,
    pub user_nickname: Option<String>,
    /// RFC 3339, e.g. `2024-05-13T10:20:30.000+00:00`
    pub submission_time: Option<String>,
    pub context_data_values: Option<HashMap<String, ContextDataValue>>,
}

impl Review {
    /// `ContextDataValues.<key>.ValueLabel`, if present and non-empty.
    pub fn context_label(&self, key: &str) -> Option<&str> {
        self.context_data_values
            .as_ref()?
            .get(key)?
            .value_label
            .as_deref()
            .filter(|label| !label.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextDataValue {
    pub value_label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Category {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl std::fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => f.write_str(code),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("unspecified error"),
        }
    }
}
