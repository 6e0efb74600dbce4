//! Relation registry.
//!
//! Maps each directory resource type to the reference relations it can be
//! joined through with `_include`, keyed by (resource_type, relation).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::IncludeDescriptor;

/// How many references a relation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// At most one reference.
    Single,
    /// Any number of references.
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Single => write!(f, "single"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

/// Definition of one includable relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// The resource type holding the reference.
    pub source_type: String,

    /// The search parameter name used in `_include`.
    pub relation: String,

    /// Resource types the reference may point at.
    pub targets: Vec<String>,

    /// Single- or multi-valued.
    pub cardinality: Cardinality,

    /// Whether every entry of the source type must resolve this relation.
    /// Only single-valued relations can be mandatory.
    pub mandatory: bool,
}

impl RelationDef {
    /// Creates an optional relation.
    pub fn new(
        source_type: impl Into<String>,
        relation: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            relation: relation.into(),
            targets: Vec::new(),
            cardinality,
            mandatory: false,
        }
    }

    /// Sets the target types.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the relation as mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = self.cardinality == Cardinality::Single;
        self
    }

    /// Returns the include descriptor that joins through this relation.
    pub fn include(&self) -> IncludeDescriptor {
        IncludeDescriptor::new(self.source_type.clone(), self.relation.clone())
    }
}

/// Registry of includable relations per resource type.
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    by_type: HashMap<String, Vec<RelationDef>>,
}

impl RelationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the provider-directory relations.
    pub fn directory() -> Self {
        use Cardinality::{Many, Single};

        let mut registry = Self::new();
        let defs = [
            RelationDef::new("PractitionerRole", "practitioner", Single)
                .with_targets(["Practitioner"])
                .mandatory(),
            RelationDef::new("PractitionerRole", "organization", Single)
                .with_targets(["Organization"]),
            RelationDef::new("PractitionerRole", "location", Many).with_targets(["Location"]),
            RelationDef::new("PractitionerRole", "service", Many)
                .with_targets(["HealthcareService"]),
            RelationDef::new("PractitionerRole", "endpoint", Many).with_targets(["Endpoint"]),
            RelationDef::new("HealthcareService", "organization", Single)
                .with_targets(["Organization"]),
            RelationDef::new("HealthcareService", "location", Many).with_targets(["Location"]),
            RelationDef::new("HealthcareService", "endpoint", Many).with_targets(["Endpoint"]),
            RelationDef::new("Location", "organization", Single).with_targets(["Organization"]),
            RelationDef::new("Location", "partof", Single).with_targets(["Location"]),
            RelationDef::new("Location", "endpoint", Many).with_targets(["Endpoint"]),
            RelationDef::new("Organization", "partof", Single).with_targets(["Organization"]),
            RelationDef::new("Organization", "endpoint", Many).with_targets(["Endpoint"]),
            RelationDef::new("Endpoint", "organization", Single).with_targets(["Organization"]),
        ];
        for def in defs {
            registry.register(def);
        }
        registry
    }

    /// Adds or replaces a relation definition.
    pub fn register(&mut self, def: RelationDef) {
        let defs = self.by_type.entry(def.source_type.clone()).or_default();
        match defs.iter_mut().find(|d| d.relation == def.relation) {
            Some(existing) => *existing = def,
            None => defs.push(def),
        }
    }

    /// Returns every relation of a resource type, in registration order.
    pub fn relations(&self, resource_type: &str) -> &[RelationDef] {
        self.by_type
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Looks up one relation.
    pub fn relation(&self, resource_type: &str, relation: &str) -> Option<&RelationDef> {
        self.relations(resource_type)
            .iter()
            .find(|d| d.relation == relation)
    }

    /// Returns the mandatory relations of a resource type.
    pub fn mandatory(&self, resource_type: &str) -> impl Iterator<Item = &RelationDef> {
        self.relations(resource_type).iter().filter(|d| d.mandatory)
    }

    /// Returns true if the include descriptor names a registered relation
    /// whose targets admit its target filter.
    pub fn is_known(&self, include: &IncludeDescriptor) -> bool {
        match self.relation(&include.source_type, &include.relation) {
            Some(def) => include
                .target_type
                .as_ref()
                .is_none_or(|t| def.targets.iter().any(|d| d == t)),
            None => false,
        }
    }
}
