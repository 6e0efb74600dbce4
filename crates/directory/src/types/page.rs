//! Search pages and the searchset Bundle they are decoded from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProtocolError;

use super::key::EntityKey;
use super::resource::Resource;

/// Why an entry is in a page, as classified by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    /// The entry satisfied the search filters.
    Match,
    /// The entry was pulled in by an include directive.
    Include,
}

/// One entity in a page or result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// The entity's identity.
    pub key: EntityKey,

    /// Match or include, fixed at fetch time.
    pub role: EntryRole,

    /// The absolute URL the server gave for the entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    /// The typed payload.
    pub resource: Resource,
}

impl Entry {
    /// Creates an entry whose key is taken from `resource`.
    pub fn new(role: EntryRole, id: impl Into<String>, resource: Resource) -> Self {
        Self {
            key: EntityKey::new(resource.resource_type(), id),
            role,
            full_url: None,
            resource,
        }
    }

    /// Returns true for match-role entries.
    pub fn is_match(&self) -> bool {
        self.role == EntryRole::Match
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Entries in server order.
    pub entries: Vec<Entry>,

    /// Indicator for the next page, if there is one.
    pub continuation: Option<String>,

    /// The server-reported total match count, if it sent one.
    pub total: Option<u64>,
}

impl Page {
    /// Creates a page.
    pub fn new(entries: Vec<Entry>, continuation: Option<String>) -> Self {
        Self {
            entries,
            continuation,
            total: None,
        }
    }

    /// Returns the number of match entries in this page.
    pub fn match_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_match()).count()
    }

    /// Decodes a page from a searchset Bundle body.
    pub fn from_json(body: &str, searched_type: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(value, searched_type)
    }

    /// Decodes a page from a searchset Bundle value.
    pub fn from_value(value: Value, searched_type: &str) -> Result<Self, ProtocolError> {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if resource_type != "Bundle" {
            return Err(ProtocolError::NotABundle {
                resource_type: if resource_type.is_empty() {
                    "an untyped body".to_string()
                } else {
                    resource_type.to_string()
                },
            });
        }

        let bundle: SearchBundle = serde_json::from_value(value)?;
        Self::from_bundle(bundle, searched_type)
    }

    /// Classifies a decoded Bundle's entries into a page.
    pub fn from_bundle(bundle: SearchBundle, searched_type: &str) -> Result<Self, ProtocolError> {
        if bundle.bundle_type != "searchset" {
            return Err(ProtocolError::UnexpectedBundleType {
                bundle_type: bundle.bundle_type,
            });
        }

        let continuation = bundle.next_link().map(str::to_string);
        let mut entries = Vec::with_capacity(bundle.entry.len());

        for (index, raw) in bundle.entry.into_iter().enumerate() {
            let mode = raw.search.as_ref().and_then(|s| s.mode);
            if mode == Some(SearchEntryMode::Outcome) {
                warn!(index, "Skipping outcome entry in search page");
                continue;
            }

            let content = raw.resource.ok_or_else(|| ProtocolError::IncompleteEntry {
                index,
                message: "entry has no resource".to_string(),
            })?;
            let resource_type = content
                .get("resourceType")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::IncompleteEntry {
                    index,
                    message: "resource has no resourceType".to_string(),
                })?;
            let id = content
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::IncompleteEntry {
                    index,
                    message: format!("{} has no id", resource_type),
                })?;

            let role = match mode {
                Some(SearchEntryMode::Match) => EntryRole::Match,
                Some(SearchEntryMode::Include) => EntryRole::Include,
                _ if resource_type == searched_type => EntryRole::Match,
                _ => EntryRole::Include,
            };

            if role == EntryRole::Match && resource_type != searched_type {
                return Err(ProtocolError::WrongEntityKind {
                    index,
                    expected: searched_type.to_string(),
                    actual: resource_type,
                });
            }

            let resource = Resource::from_json_lenient(&resource_type, &id, content);
            entries.push(Entry {
                key: EntityKey::new(resource_type, id),
                role,
                full_url: raw.full_url,
                resource,
            });
        }

        debug!(
            entries = entries.len(),
            has_next = continuation.is_some(),
            "Decoded search page"
        );

        Ok(Self {
            entries,
            continuation,
            total: bundle.total,
        })
    }
}

/// A FHIR searchset Bundle as received from a search endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchBundle {
    /// The bundle type; searches return "searchset".
    #[serde(rename = "type", default)]
    pub bundle_type: String,

    /// Total count of matching resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    /// Navigation links.
    #[serde(default)]
    pub link: Vec<BundleLink>,

    /// The bundle entries.
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl SearchBundle {
    /// Returns the URL of the `next` link, if present.
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// A link in a FHIR Bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleLink {
    /// The relation type (self, next, previous, first, last).
    pub relation: String,

    /// The URL.
    pub url: String,
}

/// An entry in a FHIR Bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleEntry {
    /// The full URL of the resource.
    #[serde(rename = "fullUrl", default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    /// The resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    /// Search information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
}

/// Search information for a bundle entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleEntrySearch {
    /// How this entry matched the search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SearchEntryMode>,

    /// Search ranking score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// How a bundle entry matched the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEntryMode {
    /// This is a match to the search parameters.
    Match,
    /// This is included because of _include.
    Include,
    /// This is an OperationOutcome about the search.
    Outcome,
}
