//! Typed payloads for provider-directory resources.
//!
//! Only the elements the directory core and its reports look at are modelled.
//! Resource types outside the directory set are kept as raw JSON.

// Element fields carry their FHIR element names and need no further docs
#![allow(missing_docs)]

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ProtocolError;

use super::key::Reference;

/// A FHIR `Reference` element as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceValue {
    /// Literal reference (`Type/id` or absolute URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Declared target type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,

    /// Logical identifier of the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    /// Text alternative for the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ReferenceValue {
    /// Creates a literal reference.
    pub fn literal(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Default::default()
        }
    }

    /// Converts the wire form into a typed [`Reference`].
    ///
    /// Returns `None` for identifier-only, contained and otherwise
    /// unparseable references.
    pub fn to_reference(&self) -> Option<Reference> {
        let mut parsed = Reference::parse(self.reference.as_deref()?)?;
        parsed.display = self.display.clone();
        Some(parsed)
    }
}

/// A FHIR `Identifier`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A FHIR `Coding`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A FHIR `CodeableConcept`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A FHIR `HumanName`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefix: Vec<String>,
}

impl HumanName {
    /// Renders the name for display, preferring the `text` element.
    pub fn display(&self) -> Option<String> {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Some(text.to_string());
        }

        let parts: Vec<&str> = self
            .prefix
            .iter()
            .chain(self.given.iter())
            .map(String::as_str)
            .chain(self.family.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// A FHIR `PractitionerRole`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerRole {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practitioner: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specialty: Vec<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub healthcare_service: Vec<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint: Vec<ReferenceValue>,
    /// Elements without a typed field, `resourceType` included.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A FHIR `Practitioner`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A FHIR `Location`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managing_organization: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint: Vec<ReferenceValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A FHIR `HealthcareService`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthcareService {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_by: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specialty: Vec<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint: Vec<ReferenceValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A FHIR `Organization`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint: Vec<ReferenceValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A FHIR `Endpoint`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managing_organization: Option<ReferenceValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The payload of a result-set entry, tagged by resource type.
///
/// Serializes back to the FHIR JSON it was decoded from. Elements without a
/// typed field are carried through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    PractitionerRole(PractitionerRole),
    Practitioner(Practitioner),
    Location(Location),
    HealthcareService(HealthcareService),
    Organization(Organization),
    Endpoint(Endpoint),
    /// Any resource type the directory core has no typed model for, or a
    /// directory resource whose elements did not fit the typed model.
    Other { resource_type: String, content: Value },
}

impl Resource {
    /// Decodes a resource from its JSON form.
    ///
    /// `resource_type` and `id` have already been read from `content` by the
    /// caller and are used for error reporting.
    pub fn from_json(
        resource_type: &str,
        id: &str,
        content: Value,
    ) -> Result<Self, ProtocolError> {
        match Self::decode_typed(resource_type, &content) {
            Ok(Some(resource)) => Ok(resource),
            Ok(None) => Ok(Resource::Other {
                resource_type: resource_type.to_string(),
                content,
            }),
            Err(err) => Err(ProtocolError::InvalidResource {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Decodes a resource, keeping it as [`Resource::Other`] when its
    /// elements do not fit the typed model.
    pub fn from_json_lenient(resource_type: &str, id: &str, content: Value) -> Self {
        match Self::decode_typed(resource_type, &content) {
            Ok(Some(resource)) => resource,
            Ok(None) => Resource::Other {
                resource_type: resource_type.to_string(),
                content,
            },
            Err(err) => {
                warn!(
                    resource_type,
                    id,
                    error = %err,
                    "Resource does not fit the typed model, keeping raw JSON"
                );
                Resource::Other {
                    resource_type: resource_type.to_string(),
                    content,
                }
            }
        }
    }

    fn decode_typed(
        resource_type: &str,
        content: &Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let resource = match resource_type {
            "PractitionerRole" => {
                Resource::PractitionerRole(PractitionerRole::deserialize(content)?)
            }
            "Practitioner" => Resource::Practitioner(Practitioner::deserialize(content)?),
            "Location" => Resource::Location(Location::deserialize(content)?),
            "HealthcareService" => {
                Resource::HealthcareService(HealthcareService::deserialize(content)?)
            }
            "Organization" => Resource::Organization(Organization::deserialize(content)?),
            "Endpoint" => Resource::Endpoint(Endpoint::deserialize(content)?),
            _ => return Ok(None),
        };
        Ok(Some(resource))
    }

    /// Returns the FHIR JSON form of the resource.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut value = match self {
            Resource::PractitionerRole(r) => serde_json::to_value(r)?,
            Resource::Practitioner(p) => serde_json::to_value(p)?,
            Resource::Location(l) => serde_json::to_value(l)?,
            Resource::HealthcareService(s) => serde_json::to_value(s)?,
            Resource::Organization(o) => serde_json::to_value(o)?,
            Resource::Endpoint(e) => serde_json::to_value(e)?,
            Resource::Other { content, .. } => return Ok(content.clone()),
        };
        if let Value::Object(map) = &mut value {
            map.entry("resourceType")
                .or_insert_with(|| Value::String(self.resource_type().to_string()));
        }
        Ok(value)
    }

    /// Returns the resource type name.
    pub fn resource_type(&self) -> &str {
        match self {
            Resource::PractitionerRole(_) => "PractitionerRole",
            Resource::Practitioner(_) => "Practitioner",
            Resource::Location(_) => "Location",
            Resource::HealthcareService(_) => "HealthcareService",
            Resource::Organization(_) => "Organization",
            Resource::Endpoint(_) => "Endpoint",
            Resource::Other { resource_type, .. } => resource_type,
        }
    }

    /// Returns the references held under a relation (search parameter) name.
    ///
    /// Relation names follow the FHIR search parameters used in `_include`
    /// (e.g. `service` for `PractitionerRole.healthcareService`). Unknown
    /// relations and untyped resources yield an empty list.
    pub fn references(&self, relation: &str) -> Vec<&ReferenceValue> {
        match (self, relation) {
            (Resource::PractitionerRole(r), "practitioner") => r.practitioner.iter().collect(),
            (Resource::PractitionerRole(r), "organization") => r.organization.iter().collect(),
            (Resource::PractitionerRole(r), "location") => r.location.iter().collect(),
            (Resource::PractitionerRole(r), "service") => r.healthcare_service.iter().collect(),
            (Resource::PractitionerRole(r), "endpoint") => r.endpoint.iter().collect(),
            (Resource::HealthcareService(s), "organization") => s.provided_by.iter().collect(),
            (Resource::HealthcareService(s), "location") => s.location.iter().collect(),
            (Resource::HealthcareService(s), "endpoint") => s.endpoint.iter().collect(),
            (Resource::Location(l), "organization") => l.managing_organization.iter().collect(),
            (Resource::Location(l), "partof") => l.part_of.iter().collect(),
            (Resource::Location(l), "endpoint") => l.endpoint.iter().collect(),
            (Resource::Organization(o), "partof") => o.part_of.iter().collect(),
            (Resource::Organization(o), "endpoint") => o.endpoint.iter().collect(),
            (Resource::Endpoint(e), "organization") => e.managing_organization.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns a human-readable name, if the resource type carries one.
    pub fn display_name(&self) -> Option<String> {
        match self {
            Resource::Practitioner(p) => p.name.iter().find_map(HumanName::display),
            Resource::Location(l) => l.name.clone(),
            Resource::HealthcareService(s) => s.name.clone(),
            Resource::Organization(o) => o.name.clone(),
            Resource::Endpoint(e) => e.name.clone(),
            Resource::PractitionerRole(_) | Resource::Other { .. } => None,
        }
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_practitioner_role_from_json() {
        let content = json!({
            "resourceType": "PractitionerRole",
            "id": "role-1",
            "practitioner": {"reference": "Practitioner/123", "display": "Dr Kidman"},
            "location": [
                {"reference": "Location/loc-1"},
                {"reference": "Location/loc-2"}
            ],
            "healthcareService": [{"reference": "HealthcareService/hs-1"}]
        });

        let resource = Resource::from_json("PractitionerRole", "role-1", content).unwrap();
        assert_eq!(resource.resource_type(), "PractitionerRole");
        assert_eq!(resource.references("location").len(), 2);
        assert_eq!(resource.references("service").len(), 1);

        let practitioner = resource.references("practitioner")[0].to_reference().unwrap();
        assert_eq!(practitioner.target_id, "123");
        assert_eq!(practitioner.display.as_deref(), Some("Dr Kidman"));
    }

    #[test]
    fn test_unknown_type_kept_raw() {
        let content = json!({"resourceType": "Patient", "id": "p1"});
        let resource = Resource::from_json("Patient", "p1", content.clone()).unwrap();
        assert_eq!(
            resource,
            Resource::Other {
                resource_type: "Patient".to_string(),
                content
            }
        );
        assert!(resource.references("organization").is_empty());
    }

    #[test]
    fn test_invalid_typed_payload() {
        let content = json!({"resourceType": "Location", "id": "loc-1", "endpoint": "nope"});
        let err = Resource::from_json("Location", "loc-1", content).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidResource { .. }));
    }

    #[test]
    fn test_serializes_back_to_source_json() {
        let content = json!({
            "resourceType": "PractitionerRole",
            "id": "r1",
            "active": true,
            "practitioner": {"reference": "Practitioner/123", "display": "Dr Kidman"},
            "specialty": [{
                "coding": [{"system": "http://snomed.info/sct", "code": "408443003"}]
            }],
            "telecom": [{"system": "phone", "value": "02 9999 0000", "use": "work"}],
            "availableTime": [{
                "daysOfWeek": ["mon", "tue"],
                "availableStartTime": "09:00:00",
                "availableEndTime": "17:00:00"
            }]
        });

        let resource = Resource::from_json("PractitionerRole", "r1", content.clone()).unwrap();
        let Resource::PractitionerRole(role) = &resource else {
            panic!("expected a typed role: {resource:?}");
        };
        assert!(role.extra.contains_key("telecom"));
        assert!(role.location.is_empty());

        assert_eq!(serde_json::to_value(&resource).unwrap(), content);
    }

    #[test]
    fn test_built_resource_serializes_with_type_and_without_empty_fields() {
        let resource = Resource::Location(Location {
            id: "loc-1".to_string(),
            name: Some("Sydney Clinic".to_string()),
            ..Default::default()
        });

        assert_eq!(
            resource.to_json().unwrap(),
            json!({"resourceType": "Location", "id": "loc-1", "name": "Sydney Clinic"})
        );
    }

    #[test]
    fn test_lenient_decode_keeps_mismatched_payload_raw() {
        // R5 made Endpoint.connectionType a list.
        let content = json!({
            "resourceType": "Endpoint",
            "id": "e1",
            "connectionType": [{"coding": [{"code": "hl7-fhir-rest"}]}]
        });

        let resource = Resource::from_json_lenient("Endpoint", "e1", content.clone());

        assert_eq!(
            resource,
            Resource::Other {
                resource_type: "Endpoint".to_string(),
                content: content.clone()
            }
        );
        assert_eq!(serde_json::to_value(&resource).unwrap(), content);
    }

    #[test]
    fn test_identifier_only_reference_does_not_resolve() {
        let reference = ReferenceValue {
            identifier: Some(Identifier {
                system: Some("https://github.com/synthetichealth/synthea".to_string()),
                value: Some("b675cf86-98df-33c1-8f10-95fd27b53d91".to_string()),
            }),
            display: Some("ALL-ACCESS PHYSICAL THERAPY".to_string()),
            ..Default::default()
        };
        assert!(reference.to_reference().is_none());
    }

    #[test]
    fn test_human_name_display() {
        let name = HumanName {
            family: Some("Kidman".to_string()),
            given: vec!["Nicole".to_string()],
            prefix: vec!["Dr".to_string()],
            ..Default::default()
        };
        assert_eq!(name.display().as_deref(), Some("Dr Nicole Kidman"));

        let texted = HumanName {
            text: Some("N. Kidman".to_string()),
            ..name
        };
        assert_eq!(texted.display().as_deref(), Some("N. Kidman"));
    }
}
