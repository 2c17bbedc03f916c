//! FHIR `Observation` wire model.

use crate::{CodeableConcept, Quantity, Reference, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Registered,
    Preliminary,
    Final,
    Amended,
}

/// A measurement or assessment about the patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub resource_type: ResourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub status: ObservationStatus,

    pub code: CodeableConcept,

    pub subject: Reference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<ObservationComponent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationComponent {
    pub code: CodeableConcept,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

impl Observation {
    pub fn new(status: ObservationStatus, code: CodeableConcept, subject: Reference) -> Self {
        Self {
            resource_type: ResourceKind::Observation,
            id: None,
            status,
            code,
            subject,
            effective_date_time: None,
            value_string: None,
            value_quantity: None,
            component: Vec::new(),
        }
    }

    pub fn with_value_string(mut self, value: impl Into<String>) -> Self {
        self.value_string = Some(value.into());
        self
    }

    pub fn with_effective(mut self, at: DateTime<Utc>) -> Self {
        self.effective_date_time = Some(at);
        self
    }

    pub fn with_component(mut self, component: ObservationComponent) -> Self {
        self.component.push(component);
        self
    }
}
