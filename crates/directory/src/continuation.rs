//! Continuation rebuilding.
//!
//! Servers hand back a `next` link whose query sometimes omits `_include`
//! directives present in the original request. Following that link verbatim
//! silently drops those joins, so instead the link's query is decoded into
//! [`RequestOptions`], the original includes are restored, and a full search
//! is issued from the result.
//!
//! # Example
//!
//! ```
//! use helios_directory::continuation::ContinuationRebuilder;
//! use helios_directory::types::{IncludeDescriptor, RequestOptions};
//!
//! let original = RequestOptions::new()
//!     .with_filter("name", "kidman")
//!     .with_include(IncludeDescriptor::new("PractitionerRole", "location"));
//!
//! let next = ContinuationRebuilder::default()
//!     .rebuild(
//!         &original,
//!         "https://example.org/fhir/PractitionerRole?name=kidman&_getpagesoffset=20",
//!     )
//!     .unwrap();
//!
//! assert_eq!(next.includes, original.includes);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParseError;
use crate::types::{
    COUNT_PARAM, Filter, INCLUDE_ITERATE_PARAM, INCLUDE_PARAM, IncludeDescriptor, RequestOptions,
};

/// What to do when a continuation repeats a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateKeyPolicy {
    /// Keep every occurrence in order. Repeated FHIR parameters are ANDed.
    #[default]
    KeepAll,
    /// Keep only the last occurrence of each key.
    LastWins,
    /// Keep only the first occurrence of each key.
    FirstWins,
}

impl DuplicateKeyPolicy {
    /// Returns the configuration name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateKeyPolicy::KeepAll => "keep-all",
            DuplicateKeyPolicy::LastWins => "last-wins",
            DuplicateKeyPolicy::FirstWins => "first-wins",
        }
    }

    /// Applies the policy to an ordered filter list.
    pub fn apply(&self, filters: Vec<Filter>) -> Vec<Filter> {
        match self {
            DuplicateKeyPolicy::KeepAll => filters,
            DuplicateKeyPolicy::FirstWins => {
                let mut seen = HashSet::new();
                filters
                    .into_iter()
                    .filter(|f| seen.insert(f.field.clone()))
                    .collect()
            }
            DuplicateKeyPolicy::LastWins => {
                let mut seen = HashSet::new();
                let mut kept: Vec<Filter> = filters
                    .into_iter()
                    .rev()
                    .filter(|f| seen.insert(f.field.clone()))
                    .collect();
                kept.reverse();
                kept
            }
        }
    }

    /// Picks the value of a parameter the server accepts only once.
    ///
    /// `KeepAll` cannot keep two different values, so it only accepts
    /// repeats that agree.
    pub fn single<T>(&self, key: &str, values: Vec<T>) -> Result<Option<T>, ParseError>
    where
        T: PartialEq + fmt::Display,
    {
        match self {
            DuplicateKeyPolicy::FirstWins => Ok(values.into_iter().next()),
            DuplicateKeyPolicy::LastWins => Ok(values.into_iter().last()),
            DuplicateKeyPolicy::KeepAll => {
                if values.windows(2).all(|pair| pair[0] == pair[1]) {
                    Ok(values.into_iter().next())
                } else {
                    Err(ParseError::ConflictingValues {
                        key: key.to_string(),
                        values: values.iter().map(ToString::to_string).collect(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicateKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep-all" => Ok(DuplicateKeyPolicy::KeepAll),
            "last-wins" => Ok(DuplicateKeyPolicy::LastWins),
            "first-wins" => Ok(DuplicateKeyPolicy::FirstWins),
            _ => Err(format!("unknown duplicate key policy: {}", s)),
        }
    }
}

/// Turns a continuation indicator plus the original request options into the
/// options for the next page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuationRebuilder {
    duplicate_keys: DuplicateKeyPolicy,
}

impl ContinuationRebuilder {
    /// Creates a rebuilder with the given duplicate-key policy.
    pub fn new(duplicate_keys: DuplicateKeyPolicy) -> Self {
        Self { duplicate_keys }
    }

    /// Returns the duplicate-key policy.
    pub fn duplicate_keys(&self) -> DuplicateKeyPolicy {
        self.duplicate_keys
    }

    /// Builds next-page options.
    ///
    /// The continuation's own pairs are kept verbatim (filters, cursor and
    /// sort tokens, `_count`); any original include whose join is missing is
    /// appended. The original match cap is carried forward.
    pub fn rebuild(
        &self,
        original: &RequestOptions,
        continuation: &str,
    ) -> Result<RequestOptions, ParseError> {
        let mut next = RequestOptions {
            match_cap: original.match_cap,
            ..Default::default()
        };
        let mut filters = Vec::new();
        let mut counts = Vec::new();

        for (key, value) in parse_query_pairs(continuation)? {
            match key.as_str() {
                INCLUDE_PARAM | INCLUDE_ITERATE_PARAM => {
                    let include = IncludeDescriptor::parse(&value, key == INCLUDE_ITERATE_PARAM)?;
                    next.push_include(include);
                }
                COUNT_PARAM => {
                    let count = value
                        .parse::<u32>()
                        .map_err(|_| ParseError::InvalidCount {
                            value: value.clone(),
                        })?;
                    counts.push(count);
                }
                _ => filters.push(Filter::new(key, value)),
            }
        }
        next.filters = self.duplicate_keys.apply(filters);
        next.page_size_hint = self.duplicate_keys.single(COUNT_PARAM, counts)?;

        let mut restored = 0usize;
        for include in &original.includes {
            if next.push_include(include.clone()) {
                restored += 1;
            }
        }

        debug!(
            filters = next.filters.len(),
            includes = next.includes.len(),
            restored_includes = restored,
            "Rebuilt continuation request"
        );

        Ok(next)
    }
}

/// Extracts and decodes the query pairs of a continuation indicator.
///
/// The indicator may be an absolute URL, a relative link or a bare query
/// string. Pairs are split on `&`; each must contain exactly one `=`. Keys and
/// values are form-url-decoded after splitting so encoded separators survive.
pub fn parse_query_pairs(continuation: &str) -> Result<Vec<(String, String)>, ParseError> {
    let without_fragment = continuation.split('#').next().unwrap_or_default();
    let query = match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None => without_fragment,
    };

    let mut pairs = Vec::new();
    for segment in query.split('&') {
        if segment.is_empty() {
            continue;
        }
        if segment.matches('=').count() != 1 {
            return Err(ParseError::MalformedPair {
                pair: segment.to_string(),
            });
        }

        // A single '=' guarantees exactly one decoded pair.
        if let Some((key, value)) = url::form_urlencoded::parse(segment.as_bytes()).next() {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    Ok(pairs)
}
