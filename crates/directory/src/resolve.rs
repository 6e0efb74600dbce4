//! Local reference resolution.
//!
//! Looks references up in a [`ResultSet`]. Nothing here touches the network
//! and nothing fails: a reference whose target was not harvested resolves to
//! `None`.

use crate::merge::ResultSet;
use crate::types::{
    Entry, EntityKey, HealthcareService, Location, Organization, Practitioner, Reference,
    ReferenceValue, Resource,
};

/// Resolves references against a result set.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    result_set: &'a ResultSet,
}

impl<'a> ReferenceResolver<'a> {
    /// Creates a resolver over `result_set`.
    pub fn new(result_set: &'a ResultSet) -> Self {
        Self { result_set }
    }

    /// Returns the entry stored under the reference's key.
    pub fn resolve(&self, reference: &Reference) -> Option<&'a Entry> {
        self.result_set.get(&reference.key())
    }

    /// Looks up a key directly.
    pub fn resolve_key(&self, key: &EntityKey) -> Option<&'a Entry> {
        self.result_set.get(key)
    }

    /// Parses and resolves a reference string.
    pub fn resolve_str(&self, reference: &str) -> Option<&'a Entry> {
        self.resolve(&Reference::parse(reference)?)
    }

    /// Resolves a wire-form reference.
    pub fn resolve_value(&self, reference: &ReferenceValue) -> Option<&'a Entry> {
        self.resolve(&reference.to_reference()?)
    }

    /// Resolves the first reference of a collection.
    ///
    /// Later elements are never consulted, even when the first one does not
    /// resolve.
    pub fn resolve_first(&self, references: &[ReferenceValue]) -> Option<&'a Entry> {
        self.resolve_value(references.first()?)
    }

    /// Resolves a reference to a practitioner.
    pub fn practitioner(&self, reference: &ReferenceValue) -> Option<&'a Practitioner> {
        match &self.resolve_value(reference)?.resource {
            Resource::Practitioner(p) => Some(p),
            _ => None,
        }
    }

    /// Resolves a reference to an organization.
    pub fn organization(&self, reference: &ReferenceValue) -> Option<&'a Organization> {
        match &self.resolve_value(reference)?.resource {
            Resource::Organization(o) => Some(o),
            _ => None,
        }
    }

    /// Resolves a reference to a location.
    pub fn location(&self, reference: &ReferenceValue) -> Option<&'a Location> {
        match &self.resolve_value(reference)?.resource {
            Resource::Location(l) => Some(l),
            _ => None,
        }
    }

    /// Resolves a reference to a healthcare service.
    pub fn healthcare_service(&self, reference: &ReferenceValue) -> Option<&'a HealthcareService> {
        match &self.resolve_value(reference)?.resource {
            Resource::HealthcareService(s) => Some(s),
            _ => None,
        }
    }
}
