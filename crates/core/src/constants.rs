//! Constants used throughout the WoundSnap core crate.

/// Number of steps in a workflow run.
pub const TOTAL_STEPS: usize = 5;

/// Context sent to the image-analysis client with every photo.
pub const DEFAULT_PATIENT_CONTEXT: &str = "Patient presenting with wound for assessment";

/// Prompt sent to the live image-analysis model.
pub const ANALYSIS_PROMPT: &str = "Analyze this wound image for clinical assessment";

/// Default per-request timeout for live collaborators, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// `User-Agent` sent by every live adapter.
pub const USER_AGENT: &str = concat!("woundsnap/", env!("CARGO_PKG_VERSION"));

/// Confidence assumed when the live model does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Infection risk assumed when the live model text names no percentage.
pub const DEFAULT_INFECTION_RISK: u8 = 25;

/// Recommendation used when the live model text contains none.
pub const DEFAULT_RECOMMENDATION: &str = "Follow standard wound care protocols";

/// Risk factor used when the live model text names none.
pub const DEFAULT_RISK_FACTOR: &str = "Standard wound assessment";

/// Title given to the photograph when it is filed in the record store.
pub const MEDIA_TITLE: &str = "AI Wound Analysis";
