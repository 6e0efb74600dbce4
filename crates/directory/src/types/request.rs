//! Search request types.
//!
//! A [`SearchRequest`] is created once per harvest run. The per-page variant
//! produced by the continuation rebuilder is a bare [`RequestOptions`] that the
//! page fetcher consumes exactly like the initial options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Query key for forward includes.
pub const INCLUDE_PARAM: &str = "_include";

/// Query key for iterated forward includes.
pub const INCLUDE_ITERATE_PARAM: &str = "_include:iterate";

/// Query key for the requested page size.
pub const COUNT_PARAM: &str = "_count";

/// A single `field=value` filter, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    /// The query parameter name, including any modifier (e.g. `name:exact`).
    pub field: String,

    /// The decoded parameter value.
    pub value: String,
}

impl Filter {
    /// Creates a new filter.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    /// Parses `field=value` as given on a command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => {
                Ok(Filter::new(field.trim(), value.trim()))
            }
            _ => Err(format!("expected field=value, got '{}'", s)),
        }
    }
}

/// An `_include` directive: follow `relation` on `source_type` entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeDescriptor {
    /// The resource type whose reference is followed.
    pub source_type: String,

    /// The reference search parameter to follow.
    pub relation: String,

    /// Optional target resource type filter.
    pub target_type: Option<String>,

    /// Whether the include also applies to included resources.
    pub iterate: bool,
}

impl IncludeDescriptor {
    /// Creates a non-iterating include without a target filter.
    pub fn new(source_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            relation: relation.into(),
            target_type: None,
            iterate: false,
        }
    }

    /// Sets the target type filter.
    pub fn with_target(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Marks the include as `:iterate`.
    pub fn iterating(mut self) -> Self {
        self.iterate = true;
        self
    }

    /// Parses an `_include` value (`Source:relation[:Target]`).
    pub fn parse(value: &str, iterate: bool) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidInclude {
            value: value.to_string(),
        };

        let mut parts = value.split(':');
        let source_type = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let relation = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let target_type = match parts.next() {
            Some(t) if !t.is_empty() => Some(t.to_string()),
            Some(_) => return Err(invalid()),
            None => None,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            source_type: source_type.to_string(),
            relation: relation.to_string(),
            target_type,
            iterate,
        })
    }

    /// Returns true if both descriptors follow the same relation.
    ///
    /// Target filters and `:iterate` do not make a separate join.
    pub fn same_join(&self, other: &IncludeDescriptor) -> bool {
        self.source_type == other.source_type && self.relation == other.relation
    }

    /// Returns the query key this descriptor is sent under.
    pub fn query_key(&self) -> &'static str {
        if self.iterate {
            INCLUDE_ITERATE_PARAM
        } else {
            INCLUDE_PARAM
        }
    }
}

impl fmt::Display for IncludeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_type, self.relation)?;
        if let Some(target) = &self.target_type {
            write!(f, ":{}", target)?;
        }
        Ok(())
    }
}

/// Parses `Source:relation[:Target]`, or `iterate:Source:relation[:Target]`
/// for an `_include:iterate` directive.
impl FromStr for IncludeDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("iterate:") {
            Some(rest) => IncludeDescriptor::parse(rest, true),
            None => IncludeDescriptor::parse(s, false),
        }
    }
}

/// The option set sent with one search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Filters, in application order. Cursor and sort tokens from a
    /// continuation indicator are carried here verbatim.
    pub filters: Vec<Filter>,

    /// Include directives, without duplicate joins.
    pub includes: Vec<IncludeDescriptor>,

    /// Requested page size (`_count`).
    pub page_size_hint: Option<u32>,

    /// Stop paging once this many match entries have been collected.
    /// `None` means unbounded. Never sent to the server.
    pub match_cap: Option<usize>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::new(field, value));
        self
    }

    /// Adds an include directive unless the same join is already present.
    pub fn with_include(mut self, include: IncludeDescriptor) -> Self {
        self.push_include(include);
        self
    }

    /// Sets the page size hint.
    pub fn with_page_size(mut self, count: u32) -> Self {
        self.page_size_hint = Some(count);
        self
    }

    /// Sets the match cap.
    pub fn with_match_cap(mut self, cap: usize) -> Self {
        self.match_cap = Some(cap);
        self
    }

    /// Adds an include directive; returns false if the join was already present.
    pub fn push_include(&mut self, include: IncludeDescriptor) -> bool {
        if self.has_include(&include) {
            return false;
        }
        self.includes.push(include);
        true
    }

    /// Returns true if an include for the same join is present.
    pub fn has_include(&self, include: &IncludeDescriptor) -> bool {
        self.includes.iter().any(|i| i.same_join(include))
    }

    /// Returns the values of every filter on `field`, in order.
    pub fn filter_values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.filters
            .iter()
            .filter(move |f| f.field == field)
            .map(|f| f.value.as_str())
    }

    /// Renders the options as ordered query pairs.
    ///
    /// Filters come first in their original order, followed by includes and
    /// the page size. The match cap is client-side only.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|f| (f.field.clone(), f.value.clone()))
            .collect();

        pairs.extend(
            self.includes
                .iter()
                .map(|i| (i.query_key().to_string(), i.to_string())),
        );

        if let Some(count) = self.page_size_hint {
            pairs.push((COUNT_PARAM.to_string(), count.to_string()));
        }

        pairs
    }
}

/// A complete search against one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The resource type being searched.
    pub resource_type: String,

    /// Options for the first page.
    pub options: RequestOptions,
}

impl SearchRequest {
    /// Creates a request with empty options.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            options: RequestOptions::default(),
        }
    }

    /// Adds a filter.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.with_filter(field, value);
        self
    }

    /// Adds an include directive.
    pub fn with_include(mut self, include: IncludeDescriptor) -> Self {
        self.options = self.options.with_include(include);
        self
    }

    /// Sets the page size hint.
    pub fn with_page_size(mut self, count: u32) -> Self {
        self.options.page_size_hint = Some(count);
        self
    }

    /// Sets the match cap.
    pub fn with_match_cap(mut self, cap: usize) -> Self {
        self.options.match_cap = Some(cap);
        self
    }
}
