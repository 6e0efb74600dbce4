//! # helios-directory - Paged FHIR Directory Harvesting
//!
//! This crate harvests provider-directory data (practitioner roles,
//! practitioners, locations, services, organizations, endpoints) from a FHIR
//! REST search endpoint that returns results in pages.
//!
//! ## Features
//!
//! - **Continuation rebuilding**: every next-page request is rebuilt from the
//!   server's `next` link with the original `_include` directives restored
//! - **Merging**: match entries keep their server multiplicity; included
//!   entries are stored once per `(type, id)`
//! - **Local resolution**: references resolve against the harvested set with
//!   no further network calls
//! - **Integrity diagnostics**: missing mandatory targets are reported, never
//!   raised as errors
//! - **Report rows**: flattened practitioner-role rows for downstream writers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use helios_directory::{HarvestSettings, Harvester, HttpPageFetcher};
//! use helios_directory::types::{IncludeDescriptor, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = HttpPageFetcher::new("https://example.org/fhir", Duration::from_secs(30))?;
//!     let harvester = Harvester::new(fetcher, HarvestSettings::default());
//!
//!     let request = SearchRequest::new("PractitionerRole")
//!         .with_filter("family", "Kidman")
//!         .with_include(IncludeDescriptor::new("PractitionerRole", "practitioner"))
//!         .with_match_cap(500);
//!
//!     let harvest = harvester.run(&request).await?;
//!     for broken in &harvest.diagnostics {
//!         println!("{}", broken);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Keys, references, typed resources, pages and requests
//! - [`registry`] - Includable relations per resource type
//! - [`continuation`] - Next-page request rebuilding
//! - [`fetch`] - The page fetcher boundary and its HTTP implementation
//! - [`merge`] - Folding pages into a result set
//! - [`resolve`] - Reference lookup within a result set
//! - [`integrity`] - Broken mandatory reference detection
//! - [`harvest`] - The paging loop
//! - [`report`] - Flattened report rows
//! - [`config`] - Command line and environment configuration
//! - [`error`] - Error types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod continuation;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod integrity;
pub mod merge;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod types;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use continuation::{ContinuationRebuilder, DuplicateKeyPolicy};
pub use error::{DirectoryError, DirectoryResult, FetchError, ParseError, ProtocolError};
pub use fetch::{HttpPageFetcher, PageFetcher};
pub use harvest::{Harvest, HarvestSettings, Harvester};
pub use integrity::{BrokenReference, IntegrityValidator};
pub use merge::{BundleMerger, ResultSet};
pub use registry::RelationRegistry;
pub use report::{RoleReportRow, role_rows};
pub use resolve::ReferenceResolver;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initializes the tracing subscriber for logging.
///
/// Output goes to stderr so that stdout stays free for report rows. `RUST_LOG`
/// overrides `level` when set. Call once at startup.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_directory={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
