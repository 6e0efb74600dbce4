//! Run configuration for the directory harvester.
//!
//! Every option can be given on the command line or through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DIRECTORY_BASE_URL` | digital health sandbox | FHIR server base URL |
//! | `DIRECTORY_RESOURCE_TYPE` | PractitionerRole | Resource type to search |
//! | `DIRECTORY_FILTER` | | Semicolon-separated `field=value` filters |
//! | `DIRECTORY_INCLUDE` | | Comma-separated `[iterate:]Source:relation[:Target]` includes |
//! | `DIRECTORY_PAGE_SIZE` | | Requested page size (`_count`) |
//! | `DIRECTORY_MATCH_CAP` | | Stop after this many matches |
//! | `DIRECTORY_PAGE_DELAY_MS` | 1000 | Pause between pages (milliseconds) |
//! | `DIRECTORY_DUPLICATE_KEYS` | keep-all | keep-all, last-wins or first-wins |
//! | `DIRECTORY_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `DIRECTORY_LOG_LEVEL` | info | Log level |
//! | `DIRECTORY_IDENTIFIER_SYSTEM` | Medicare provider number | Identifier system for report rows |
//!
//! # Example
//!
//! ```rust
//! use helios_directory::HarvestConfig;
//!
//! let config = HarvestConfig {
//!     match_cap: Some(100),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::continuation::DuplicateKeyPolicy;
use crate::harvest::HarvestSettings;
use crate::registry::RelationRegistry;
use crate::report::DEFAULT_IDENTIFIER_SYSTEM;
use crate::types::{Filter, IncludeDescriptor, RequestOptions, SearchRequest};

/// Default FHIR server searched when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://sandbox.digitalhealth.gov.au/FhirServerR4-PDA/fhir";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Configuration of one harvest run.
#[derive(Debug, Clone, Parser)]
#[command(name = "directory-harvest")]
#[command(about = "Harvest a paged FHIR provider-directory search")]
pub struct HarvestConfig {
    /// FHIR server base URL.
    #[arg(long, env = "DIRECTORY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Resource type to search.
    #[arg(long, env = "DIRECTORY_RESOURCE_TYPE", default_value = "PractitionerRole")]
    pub resource_type: String,

    /// Search filter as field=value. Repeatable.
    #[arg(long = "filter", env = "DIRECTORY_FILTER", value_delimiter = ';')]
    pub filters: Vec<Filter>,

    /// Include directive as Source:relation[:Target]. Repeatable.
    /// Prefix with `iterate:` to follow a relation of included resources.
    #[arg(long = "include", env = "DIRECTORY_INCLUDE", value_delimiter = ',')]
    pub includes: Vec<IncludeDescriptor>,

    /// Requested page size.
    #[arg(long, env = "DIRECTORY_PAGE_SIZE")]
    pub page_size: Option<u32>,

    /// Stop paging once this many matches have been collected.
    #[arg(long, env = "DIRECTORY_MATCH_CAP")]
    pub match_cap: Option<usize>,

    /// Pause between page requests in milliseconds.
    #[arg(long, env = "DIRECTORY_PAGE_DELAY_MS", default_value = "1000")]
    pub page_delay_ms: u64,

    /// Treatment of repeated filter keys in continuation links.
    #[arg(long, env = "DIRECTORY_DUPLICATE_KEYS", default_value = "keep-all")]
    pub duplicate_keys: DuplicateKeyPolicy,

    /// Request timeout in seconds.
    #[arg(long, env = "DIRECTORY_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "DIRECTORY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Identifier system reported for practitioner roles.
    #[arg(long, env = "DIRECTORY_IDENTIFIER_SYSTEM", default_value = DEFAULT_IDENTIFIER_SYSTEM)]
    pub identifier_system: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            resource_type: "PractitionerRole".to_string(),
            filters: Vec::new(),
            includes: Vec::new(),
            page_size: None,
            match_cap: None,
            page_delay_ms: 1000,
            duplicate_keys: DuplicateKeyPolicy::KeepAll,
            request_timeout: 30,
            log_level: "info".to_string(),
            identifier_system: DEFAULT_IDENTIFIER_SYSTEM.to_string(),
        }
    }
}

impl HarvestConfig {
    /// Creates a configuration from command line arguments and the
    /// environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::try_parse().unwrap_or_default()
    }

    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(_) => errors.push(format!("Base URL must be http(s): {}", self.base_url)),
            Err(e) => errors.push(format!("Invalid base URL '{}': {}", self.base_url, e)),
        }

        if !self.resource_type.starts_with(|c: char| c.is_ascii_uppercase())
            || !self.resource_type.chars().all(|c| c.is_ascii_alphanumeric())
        {
            errors.push(format!("Invalid resource type '{}'", self.resource_type));
        }

        if self.page_size == Some(0) {
            errors.push("Page size cannot be 0".to_string());
        }

        if self.match_cap == Some(0) {
            errors.push("Match cap cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!("Unknown log level '{}'", self.log_level));
        }

        let registry = RelationRegistry::directory();
        for include in &self.includes {
            if !include.iterate && include.source_type != self.resource_type {
                errors.push(format!(
                    "Include {} does not start from the searched type {}",
                    include, self.resource_type
                ));
            } else if !registry.is_known(include) {
                errors.push(format!("Unknown include relation {}", include));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the initial search request.
    pub fn search_request(&self) -> SearchRequest {
        let mut options = RequestOptions {
            filters: self.filters.clone(),
            page_size_hint: self.page_size,
            match_cap: self.match_cap,
            ..Default::default()
        };
        for include in &self.includes {
            options.push_include(include.clone());
        }

        SearchRequest {
            resource_type: self.resource_type.clone(),
            options,
        }
    }

    /// Returns the harvest loop settings.
    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            page_delay: Duration::from_millis(self.page_delay_ms),
            duplicate_keys: self.duplicate_keys,
        }
    }

    /// Returns the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
