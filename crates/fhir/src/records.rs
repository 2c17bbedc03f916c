//! The converter's output bundle.

use crate::{Condition, FhirError, FhirResult, Observation, Reference, ResourceKind};
use serde::{Deserialize, Serialize};

/// Observations and conditions derived from one clinical assessment.
///
/// Records are appended once while the set is assembled and are not modified afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecordSet {
    pub observations: Vec<Observation>,
    pub conditions: Vec<Condition>,
    pub success: bool,
    pub message: String,
}

impl StructuredRecordSet {
    /// A successful set with no records.
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            observations: Vec::new(),
            conditions: Vec::new(),
            success: true,
            message: message.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len() + self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records whose kind is not in `kinds`.
    pub fn retain_kinds(mut self, kinds: &[ResourceKind]) -> Self {
        if !kinds.contains(&ResourceKind::Observation) {
            self.observations.clear();
        }
        if !kinds.contains(&ResourceKind::Condition) {
            self.conditions.clear();
        }
        self
    }

    /// Check that every record's subject is `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::SubjectMismatch`] naming the first offending reference.
    pub fn check_subject(&self, expected: &Reference) -> FhirResult<()> {
        let subjects = self
            .observations
            .iter()
            .map(|o| &o.subject)
            .chain(self.conditions.iter().map(|c| &c.subject));

        for subject in subjects {
            if subject != expected {
                return Err(FhirError::SubjectMismatch {
                    expected: expected.reference.clone(),
                    found: subject.reference.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codes, CodeableConcept, Coding, ObservationStatus};

    fn patient(id: &str) -> Reference {
        Reference {
            reference: format!("Patient/{id}"),
        }
    }

    fn sample(subject: Reference) -> StructuredRecordSet {
        StructuredRecordSet {
            observations: vec![Observation::new(
                ObservationStatus::Final,
                CodeableConcept::single(Coding::new(
                    codes::LOINC_SYSTEM,
                    codes::WOUND_ASSESSMENT_PANEL,
                )),
                subject.clone(),
            )],
            conditions: vec![Condition::active(
                CodeableConcept::single(Coding::new(
                    codes::SNOMED_SYSTEM,
                    codes::PRESSURE_ULCER_STAGE_2,
                )),
                subject,
            )],
            success: true,
            message: "ok".into(),
        }
    }

    #[test]
    fn empty_set_is_successful() {
        let set = StructuredRecordSet::empty("nothing to convert");
        assert!(set.success);
        assert!(set.is_empty());
    }

    #[test]
    fn subject_check_accepts_matching_patient() {
        let set = sample(patient("p1"));
        assert_eq!(set.len(), 2);
        set.check_subject(&patient("p1")).expect("subjects match");
    }

    #[test]
    fn subject_check_reports_mismatch() {
        let set = sample(patient("someone-else"));
        let err = set.check_subject(&patient("p1")).expect_err("mismatch");
        match err {
            FhirError::SubjectMismatch { expected, found } => {
                assert_eq!(expected, "Patient/p1");
                assert_eq!(found, "Patient/someone-else");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn retain_kinds_filters() {
        let set = sample(patient("p1")).retain_kinds(&[ResourceKind::Condition]);
        assert!(set.observations.is_empty());
        assert_eq!(set.conditions.len(), 1);
    }
}
