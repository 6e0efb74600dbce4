//! Page fetcher over the FHIR REST search interaction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::{debug, warn};
use url::Url;

use crate::error::{DirectoryResult, FetchError};
use crate::types::{Page, RequestOptions};

use super::PageFetcher;

/// Media type requested from the search endpoint.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Error bodies longer than this are cut before they reach an error message.
const MAX_ERROR_BODY: usize = 512;

/// Fetches search pages with `GET {base}/{type}?{query}`.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPageFetcher {
    /// Creates a fetcher with its own client.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: base_url.to_string(),
                message: format!("failed to build HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;
        Self::with_client(client, base_url)
    }

    /// Creates a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: base_url.to_string(),
                message: "expected an http(s) base URL".to_string(),
            });
        }
        Ok(Self { client, base_url })
    }

    /// Returns the search endpoint base.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the search URL for one request.
    pub fn search_url(&self, resource_type: &str, options: &RequestOptions) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(resource_type);
        }

        let pairs = options.to_query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(&pairs);
        }
        url
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn execute(
        &self,
        resource_type: &str,
        options: &RequestOptions,
    ) -> DirectoryResult<Page> {
        let url = self.search_url(resource_type, options);
        debug!(url = %url, "Fetching search page");

        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        };

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Search endpoint returned an error");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate(&body),
            }
            .into());
        }

        Ok(Page::from_json(&body, resource_type)?)
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
