//! Entity identity and typed references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies an entity within a result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// The FHIR resource type (e.g., "PractitionerRole").
    pub resource_type: String,

    /// The logical id of the resource.
    pub id: String,
}

impl EntityKey {
    /// Creates a new key.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// A typed pointer from one entity to another.
///
/// The target may or may not be present in any given result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// The resource type being pointed at.
    pub target_type: String,

    /// The logical id being pointed at.
    pub target_id: String,

    /// Human-readable text carried alongside the pointer.
    pub display: Option<String>,
}

impl Reference {
    /// Creates a reference without display text.
    pub fn new(target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            target_id: target_id.into(),
            display: None,
        }
    }

    /// Sets the display text.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Parses a FHIR reference string.
    ///
    /// Accepts `Type/id`, `Type/id/_history/n` and absolute URLs ending in
    /// `Type/id` (optionally versioned). Contained (`#id`) references and
    /// anything else that does not name a type and id return `None`.
    pub fn parse(reference: &str) -> Option<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let path = trimmed.split(['?', '#']).next().unwrap_or_default();
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.len() >= 4 && segments[segments.len() - 2] == "_history" {
            segments.truncate(segments.len() - 2);
        }

        if segments.len() < 2 {
            return None;
        }

        let id = segments[segments.len() - 1];
        let resource_type = segments[segments.len() - 2];
        if !is_resource_type(resource_type) {
            return None;
        }

        Some(Self::new(resource_type, id))
    }

    /// Returns the key this reference points at.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.target_type.clone(), self.target_id.clone())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target_type, self.target_id)
    }
}

/// FHIR resource type names are alphanumeric and start with an uppercase letter.
fn is_resource_type(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphanumeric())
}
