//! HTTP client for the catalog feed API

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::feed::types::FeedResponse;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Endpoint plus the endpoint-specific query parameters.
///
/// Parameters may repeat (the API ANDs repeated `Filter` values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl FeedQuery {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

// Request URLs carry the passkey; keep them out of error messages and logs.
fn redact(err: reqwest::Error) -> IngestError {
    IngestError::Http(err.without_url())
}

/// Issues single page requests. Holds no pagination state.
pub struct FeedClient {
    client: Client,
    base_url: String,
    passkey: String,
    api_version: String,
}

impl FeedClient {
    /// Build a client from configuration.
    ///
    /// The passkey is resolved here, once, and kept for the lifetime of the
    /// client.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("brandwise/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            passkey: config.resolve_passkey()?,
            api_version: config.api_version.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch `limit` records starting at `offset`.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        query: &FeedQuery,
        offset: u64,
        limit: u64,
    ) -> Result<FeedResponse<T>> {
        debug!(endpoint = %query.path, offset, limit, "Requesting page");

        let offset = offset.to_string();
        let limit = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("Offset", offset.as_str()),
            ("Limit", limit.as_str()),
            ("apiversion", self.api_version.as_str()),
            ("passkey", self.passkey.as_str()),
        ];
        params.extend(query.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let body = self
            .client
            .get(self.url(&query.path))
            .query(&params)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(redact)?
            .bytes()
            .await
            .map_err(redact)?;

        let response: FeedResponse<T> =
            serde_json::from_slice(&body).map_err(|source| IngestError::Decode {
                endpoint: query.path.clone(),
                source,
            })?;

        if response.has_errors {
            let messages = response
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(IngestError::Api {
                endpoint: query.path.clone(),
                messages,
            });
        }

        Ok(response)
    }
}
