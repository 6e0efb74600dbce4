//! Flattened report rows for harvested practitioner roles.

use serde::Serialize;

use crate::merge::ResultSet;
use crate::resolve::ReferenceResolver;
use crate::types::{
    CodeableConcept, HumanName, Identifier, PractitionerRole, ReferenceValue, Resource,
};

/// Identifier system of the Australian Medicare provider number.
pub const DEFAULT_IDENTIFIER_SYSTEM: &str =
    "http://ns.electronichealth.net.au/id/medicare-provider-number";

/// One row per matched practitioner role.
///
/// Names come from the resolved entries when they were harvested, and from
/// the reference's `display` otherwise. Multi-valued relations contribute
/// their first element only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct RoleReportRow {
    /// PractitionerRole id.
    pub role_id: String,
    /// Id of the referenced practitioner.
    pub practitioner_id: Option<String>,
    pub practitioner_name: Option<String>,
    pub organization_name: Option<String>,
    /// Name of the first location.
    pub location_name: Option<String>,
    /// Name of the first healthcare service.
    pub service_name: Option<String>,
    /// Specialty codes from coded specialties.
    pub specialties: Vec<String>,
    /// Role identifier value under the configured system.
    pub identifier: Option<String>,
}

impl RoleReportRow {
    /// Builds the row for `role`.
    pub fn build(
        role: &PractitionerRole,
        resolver: &ReferenceResolver<'_>,
        identifier_system: &str,
    ) -> Self {
        let practitioner_id = role
            .practitioner
            .as_ref()
            .and_then(ReferenceValue::to_reference)
            .map(|r| r.target_id);

        let practitioner_name = role.practitioner.as_ref().and_then(|r| {
            resolver
                .practitioner(r)
                .and_then(|p| p.name.iter().find_map(HumanName::display))
                .or_else(|| r.display.clone())
        });

        let organization_name = role.organization.as_ref().and_then(|r| {
            resolver
                .organization(r)
                .and_then(|o| o.name.clone())
                .or_else(|| r.display.clone())
        });

        let location_name = role.location.first().and_then(|r| {
            resolver
                .location(r)
                .and_then(|l| l.name.clone())
                .or_else(|| r.display.clone())
        });

        let service_name = role.healthcare_service.first().and_then(|r| {
            resolver
                .healthcare_service(r)
                .and_then(|s| s.name.clone())
                .or_else(|| r.display.clone())
        });

        Self {
            role_id: role.id.clone(),
            practitioner_id,
            practitioner_name,
            organization_name,
            location_name,
            service_name,
            specialties: specialty_codes(&role.specialty),
            identifier: identifier_value(&role.identifier, identifier_system),
        }
    }
}

/// Builds a row for every matched practitioner role, in match order.
pub fn role_rows(result_set: &ResultSet, identifier_system: &str) -> Vec<RoleReportRow> {
    let resolver = ReferenceResolver::new(result_set);
    result_set
        .matches()
        .filter_map(|entry| match &entry.resource {
            Resource::PractitionerRole(role) => Some(role),
            _ => None,
        })
        .map(|role| RoleReportRow::build(role, &resolver, identifier_system))
        .collect()
}

/// Coded specialties; codings without a system are ignored.
fn specialty_codes(specialties: &[CodeableConcept]) -> Vec<String> {
    specialties
        .iter()
        .flat_map(|c| c.coding.iter())
        .filter(|c| c.system.is_some())
        .filter_map(|c| c.code.clone())
        .collect()
}

fn identifier_value(identifiers: &[Identifier], system: &str) -> Option<String> {
    identifiers
        .iter()
        .find(|i| i.system.as_deref() == Some(system))
        .and_then(|i| i.value.clone())
}
