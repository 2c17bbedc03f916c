//! FHIR `Condition` wire model.

use crate::{codes, CodeableConcept, Coding, Reference, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A diagnosis such as a staged pressure ulcer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub resource_type: ResourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub clinical_status: CodeableConcept,

    pub code: CodeableConcept,

    pub subject: Reference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset_date_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// A new active condition.
    pub fn active(code: CodeableConcept, subject: Reference) -> Self {
        Self {
            resource_type: ResourceKind::Condition,
            id: None,
            clinical_status: CodeableConcept::single(Coding {
                system: codes::CONDITION_CLINICAL_SYSTEM.to_owned(),
                code: codes::CLINICAL_STATUS_ACTIVE.to_owned(),
                display: None,
            }),
            code,
            subject,
            onset_date_time: None,
        }
    }

    pub fn with_onset(mut self, at: DateTime<Utc>) -> Self {
        self.onset_date_time = Some(at);
        self
    }
}
