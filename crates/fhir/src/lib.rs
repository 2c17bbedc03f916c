//! FHIR wire/boundary support for wound documentation.
//!
//! This crate provides **wire models** for the small slice of FHIR R4 that WoundSnap exchanges
//! with its collaborators:
//! - `Observation` and `Condition` records produced by the clinical-text converter
//! - `Media` resources carrying the wound photograph to the record store
//! - [`StructuredRecordSet`], the converter's output bundle
//!
//! This crate focuses on:
//! - serialisation/deserialisation in FHIR JSON (camelCase, `resourceType` tags)
//! - strict, path-annotated parsing of collaborator responses
//! - the subject-reference invariant (every record points at the workflow's patient)
//!
//! It does not implement FHIR REST transport; that lives in the core crate's client adapters.

pub mod codes;
pub mod condition;
pub mod datatypes;
pub mod media;
pub mod observation;
pub mod records;
pub mod resource;

pub use condition::Condition;
pub use datatypes::{Annotation, Attachment, CodeableConcept, Coding, Quantity, Reference};
pub use media::{Media, MediaStatus};
pub use observation::{Observation, ObservationComponent, ObservationStatus};
pub use records::StructuredRecordSet;
pub use resource::{parse_created_id, Resource, ResourceKind};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("subject mismatch: expected {expected}, found {found}")]
    SubjectMismatch { expected: String, found: String },
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
