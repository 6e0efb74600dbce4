//! The page fetcher boundary.
//!
//! The harvest loop only ever asks for one page at a time through
//! [`PageFetcher`]. [`HttpPageFetcher`] implements it against a FHIR REST
//! search endpoint; tests substitute scripted fetchers.

mod http;

use async_trait::async_trait;

use crate::error::DirectoryResult;
use crate::types::{Page, RequestOptions};

pub use http::{FHIR_JSON, HttpPageFetcher};

/// Executes one search request and returns the resulting page.
///
/// Entries of the returned page must already be classified as match or
/// include. Implementations own any timeout; they must not retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Searches `resource_type` with `options`.
    async fn execute(
        &self,
        resource_type: &str,
        options: &RequestOptions,
    ) -> DirectoryResult<Page>;
}
