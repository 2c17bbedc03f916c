//! # WoundSnap Core
//!
//! Workflow orchestration for wound-photo documentation.
//!
//! This crate owns the five-step run and the adapters to its collaborators:
//! - image analysis (`clients::analysis`)
//! - clinical text to structured records (`clients::converter`)
//! - record storage (`clients::record_store`)
//! - care-team automation (`clients::automation`)
//!
//! Each adapter picks a live or synthetic backend once, from [`CoreConfig`].
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest`, `cli`, or
//! `api-shared`.

pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod risk;
pub mod workflow;

pub use clients::analysis::{AnalysisResult, WoundMeasurements};
pub use clients::automation::{AutomationEvent, AutomationKind, AutomationOutcome};
pub use clients::{BackendMode, CollaboratorStatus, ConfigurationStatus};
pub use config::CoreConfig;
pub use error::{
    AnalysisError, ConfigError, ConfigResult, ConversionError, StoreError, WorkflowError,
};
pub use risk::{classify, RiskClassification};
pub use workflow::{
    ProgressCallback, WorkflowOrchestrator, WorkflowProgress, WorkflowResult, WorkflowStep,
};

pub use woundsnap_types::{InfectionRisk, PatientId};
