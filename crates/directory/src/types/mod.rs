//! Core types for directory harvesting.
//!
//! - [`EntityKey`], [`Reference`] - identity and typed pointers
//! - [`Resource`] and its variants - typed directory payloads
//! - [`Entry`], [`Page`], [`SearchBundle`] - one page of search results
//! - [`SearchRequest`], [`RequestOptions`], [`IncludeDescriptor`] - what to ask for
//!
//! # Examples
//!
//! ```
//! use helios_directory::types::{IncludeDescriptor, SearchRequest};
//!
//! let request = SearchRequest::new("PractitionerRole")
//!     .with_filter("name", "kidman")
//!     .with_include(IncludeDescriptor::new("PractitionerRole", "practitioner"))
//!     .with_page_size(50)
//!     .with_match_cap(500);
//!
//! assert_eq!(request.options.includes.len(), 1);
//! ```
//!
//! ```
//! use helios_directory::types::{EntityKey, Reference};
//!
//! let reference = Reference::parse("https://example.org/fhir/Practitioner/123").unwrap();
//! assert_eq!(reference.key(), EntityKey::new("Practitioner", "123"));
//! ```

mod key;
mod page;
mod request;
mod resource;

pub use key::{EntityKey, Reference};

pub use page::{
    BundleEntry, BundleEntrySearch, BundleLink, Entry, EntryRole, Page, SearchBundle,
    SearchEntryMode,
};

pub use request::{
    COUNT_PARAM, Filter, INCLUDE_ITERATE_PARAM, INCLUDE_PARAM, IncludeDescriptor, RequestOptions,
    SearchRequest,
};

pub use resource::{
    CodeableConcept, Coding, Endpoint, HealthcareService, HumanName, Identifier, Location,
    Organization, Practitioner, PractitionerRole, ReferenceValue, Resource,
};
