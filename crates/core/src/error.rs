use woundsnap_types::TextError;

/// The image-analysis collaborator could not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("AI analysis unavailable: {0}")]
    Unavailable(String),
}

/// The clinical-text converter could not produce records.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("FHIR conversion unavailable: {0}")]
    Unavailable(String),
}

/// The record store was unreachable or misconfigured.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("EHR storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors in how the orchestrator itself was called.
///
/// Collaborator failures never surface here; they are recorded as failed steps.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid patient id: {0}")]
    InvalidPatientId(#[from] TextError),
}

/// Errors resolving configuration or constructing adapters at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("record store directory unusable: {0}")]
    RecordStoreDir(#[from] woundsnap_photo::PhotoError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
