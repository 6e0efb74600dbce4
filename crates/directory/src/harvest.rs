//! The paging loop.
//!
//! One harvest run issues the initial search, then keeps rebuilding a full
//! request from each page's continuation until the server stops sending one
//! or the match cap is reached. Pages are fetched strictly one after another
//! with a fixed delay between them. Any error ends the run and the partially
//! merged result set is dropped.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::continuation::{ContinuationRebuilder, DuplicateKeyPolicy};
use crate::error::DirectoryResult;
use crate::fetch::PageFetcher;
use crate::integrity::{BrokenReference, IntegrityValidator};
use crate::merge::{BundleMerger, ResultSet};
use crate::registry::RelationRegistry;
use crate::types::SearchRequest;

/// Default pause between page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(1000);

/// Tuning for a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSettings {
    /// Pause observed after each page before the next request.
    pub page_delay: Duration,

    /// How repeated filter keys in a continuation are treated.
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }
}

impl HarvestSettings {
    /// Sets the page delay.
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Sets the duplicate-key policy.
    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }
}

/// The outcome of a completed run.
#[derive(Debug, Clone)]
pub struct Harvest {
    /// Every harvested entry.
    pub result_set: ResultSet,

    /// Broken mandatory references found in `result_set`.
    pub diagnostics: Vec<BrokenReference>,

    /// Number of pages requested.
    pub pages_fetched: usize,
}

/// Runs paged searches through a [`PageFetcher`].
#[derive(Debug)]
pub struct Harvester<F> {
    fetcher: F,
    settings: HarvestSettings,
    validator: IntegrityValidator,
}

impl<F: PageFetcher> Harvester<F> {
    /// Creates a harvester validating against the directory relations.
    pub fn new(fetcher: F, settings: HarvestSettings) -> Self {
        Self {
            fetcher,
            settings,
            validator: IntegrityValidator::default(),
        }
    }

    /// Replaces the registry used for integrity validation.
    pub fn with_registry(mut self, registry: RelationRegistry) -> Self {
        self.validator = IntegrityValidator::new(registry);
        self
    }

    /// Returns the page fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns the run settings.
    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Harvests every page of `request`.
    pub async fn run(&self, request: &SearchRequest) -> DirectoryResult<Harvest> {
        let rebuilder = ContinuationRebuilder::new(self.settings.duplicate_keys);
        let cap = request.options.match_cap;
        let mut merger = BundleMerger::new();
        let mut options = request.options.clone();
        let mut pages_fetched = 0usize;

        info!(
            resource_type = %request.resource_type,
            filters = request.options.filters.len(),
            includes = request.options.includes.len(),
            match_cap = ?cap,
            "Starting harvest"
        );

        loop {
            let page = self
                .fetcher
                .execute(&request.resource_type, &options)
                .await?;
            pages_fetched += 1;

            let continuation = merger.fold(page);
            debug!(
                page = pages_fetched,
                matches = merger.result_set().match_count(),
                includes = merger.result_set().include_count(),
                "Merged page"
            );

            if merger.cap_reached(cap) {
                info!(
                    matches = merger.result_set().match_count(),
                    match_cap = ?cap,
                    "Match cap reached"
                );
                break;
            }

            let Some(continuation) = continuation else {
                break;
            };
            options = rebuilder.rebuild(&request.options, &continuation)?;

            if !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        let result_set = merger.finish();
        let diagnostics = self.validator.validate(&result_set);

        info!(
            pages = pages_fetched,
            matches = result_set.match_count(),
            includes = result_set.include_count(),
            broken_references = diagnostics.len(),
            "Harvest complete"
        );

        Ok(Harvest {
            result_set,
            diagnostics,
            pages_fetched,
        })
    }
}
