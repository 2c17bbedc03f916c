//! Image-analysis collaborator: wound photograph in, structured clinical assessment out.
//!
//! [`AnalysisClient`] talks to a hosted vision model's `:predict` endpoint when one is
//! configured and otherwise produces one of two canonical synthetic assessments. When the live
//! call fails it may fall back to the synthetic generator; that policy is invisible to callers.

use crate::clients::{describe_transport_error, http_client, BackendMode, CollaboratorStatus};
use crate::config::AnalysisConfig;
use crate::constants::{ANALYSIS_PROMPT, DEFAULT_CONFIDENCE};
use crate::error::{AnalysisError, ConfigResult};
use crate::extract;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use woundsnap_photo::Photo;
use woundsnap_types::InfectionRisk;

/// Wound dimensions as unit-bearing strings (`"4.2 cm"`, `"Full thickness"`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WoundMeasurements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
}

impl WoundMeasurements {
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.width.is_none() && self.depth.is_none()
    }
}

/// A structured clinical assessment of one wound photograph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wound_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<WoundMeasurements>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Model confidence in `0.0..=1.0`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_risk: Option<InfectionRisk>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healing_stage: Option<String>,
}

#[async_trait]
pub trait ImageAnalysisClient: Send + Sync {
    /// Assess a validated wound photograph.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Unavailable`] when no assessment could be produced.
    async fn analyze(
        &self,
        photo: &Photo,
        patient_context: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError>;

    fn status(&self) -> CollaboratorStatus;
}

// ============================================================================
// Synthetic backend
// ============================================================================

/// The two canonical synthetic assessments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticScenario {
    /// Stage 3 pressure ulcer with 85% infection risk.
    HighRisk,
    /// Stage 2 pressure ulcer with 25% infection risk.
    LowRisk,
}

impl SyntheticScenario {
    pub fn result(self) -> AnalysisResult {
        match self {
            Self::HighRisk => AnalysisResult {
                analysis_text: "Stage 3 pressure ulcer with concerning features identified in the \
                    sacral region. The wound measures approximately 4.2 cm in length and 3.5 cm \
                    in width with full thickness tissue loss. Wound bed shows areas of necrotic \
                    tissue with purulent drainage. Surrounding skin demonstrates significant \
                    erythema extending beyond wound margins with warmth and induration. Signs \
                    suggestive of developing infection requiring immediate clinical attention."
                    .into(),
                wound_type: Some("Pressure Ulcer".into()),
                severity: Some("Stage 3".into()),
                measurements: Some(WoundMeasurements {
                    length: Some("4.2 cm".into()),
                    width: Some("3.5 cm".into()),
                    depth: Some("Full thickness".into()),
                }),
                recommendations: strings(&[
                    "URGENT: Immediate clinical evaluation required",
                    "Culture wound drainage for bacterial identification",
                    "Consider antibiotic therapy",
                    "Debride necrotic tissue",
                    "Implement infection control measures",
                ]),
                confidence: 0.92,
                infection_risk: InfectionRisk::new(85).ok(),
                risk_factors: strings(&[
                    "Purulent drainage",
                    "Extensive erythema",
                    "Tissue necrosis",
                    "Wound enlargement",
                ]),
                healing_stage: Some("Deteriorating".into()),
            },
            Self::LowRisk => AnalysisResult {
                analysis_text: "Stage 2 pressure ulcer identified in the sacral region. The wound \
                    measures approximately 2.3 cm in length and 1.8 cm in width. Partial \
                    thickness skin loss involving epidermis and dermis. Wound bed appears clean \
                    with granulation tissue present. No signs of infection observed. Surrounding \
                    skin shows mild erythema consistent with pressure-related tissue damage."
                    .into(),
                wound_type: Some("Pressure Ulcer".into()),
                severity: Some("Stage 2".into()),
                measurements: Some(WoundMeasurements {
                    length: Some("2.3 cm".into()),
                    width: Some("1.8 cm".into()),
                    depth: Some("Partial thickness".into()),
                }),
                recommendations: strings(&[
                    "Pressure redistribution with appropriate support surface",
                    "Regular repositioning every 2 hours",
                    "Keep wound clean and moist",
                    "Monitor for signs of infection",
                    "Document healing progress with photographs",
                ]),
                confidence: 0.85,
                infection_risk: InfectionRisk::new(25).ok(),
                risk_factors: strings(&["Pressure-related damage"]),
                healing_stage: Some("Healing".into()),
            },
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// How the synthetic backend picks a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioSource {
    /// Always the same scenario.
    Fixed(SyntheticScenario),
    /// Deterministic per seed and photo content.
    Seeded(u64),
    /// Fresh randomness on every call.
    Entropy,
}

#[derive(Clone, Debug)]
pub struct SyntheticAnalysis {
    source: ScenarioSource,
}

impl SyntheticAnalysis {
    pub fn new(source: ScenarioSource) -> Self {
        Self { source }
    }

    /// The scenario used for `photo`.
    ///
    /// A seeded source mixes the seed with the photo digest, so the same photo always gets the
    /// same scenario without any state carried between calls.
    pub fn scenario_for(&self, photo: &Photo) -> SyntheticScenario {
        let high_risk = match self.source {
            ScenarioSource::Fixed(scenario) => return scenario,
            ScenarioSource::Seeded(seed) => {
                let digest = u64::from_str_radix(&photo.sha256()[..16], 16).unwrap_or_default();
                rand::rngs::StdRng::seed_from_u64(seed ^ digest).gen_bool(0.5)
            }
            ScenarioSource::Entropy => rand::thread_rng().gen_bool(0.5),
        };
        if high_risk {
            SyntheticScenario::HighRisk
        } else {
            SyntheticScenario::LowRisk
        }
    }

    pub fn generate(&self, photo: &Photo) -> AnalysisResult {
        let scenario = self.scenario_for(photo);
        tracing::debug!(?scenario, "generated synthetic wound analysis");
        scenario.result()
    }
}

// ============================================================================
// Live backend
// ============================================================================

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    image: PredictImage,
    prompt: &'a str,
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictImage {
    bytes_base64_encoded: String,
}

#[derive(Serialize)]
struct PredictParameters {
    max_output_tokens: u32,
    temperature: f64,
    top_p: f64,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    content: Option<String>,
    text: Option<String>,
    confidence: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct LiveAnalysis {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl LiveAnalysis {
    pub fn new(
        endpoint: String,
        access_token: String,
        timeout: std::time::Duration,
    ) -> ConfigResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            access_token,
        })
    }

    pub async fn analyze(
        &self,
        photo: &Photo,
        patient_context: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let prompt = match patient_context {
            Some(context) if !context.trim().is_empty() => {
                format!("{ANALYSIS_PROMPT}. Context: {}", context.trim())
            }
            _ => ANALYSIS_PROMPT.to_owned(),
        };
        let body = PredictRequest {
            instances: [PredictInstance {
                image: PredictImage {
                    bytes_base64_encoded: photo.to_base64(),
                },
                prompt: &prompt,
                parameters: PredictParameters {
                    max_output_tokens: 500,
                    temperature: 0.1,
                    top_p: 0.8,
                },
            }],
        };

        let response = self
            .client
            .post(format!("{}:predict", self.endpoint.trim_end_matches('/')))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Unavailable(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Unavailable(format!(
                "model endpoint returned {status}"
            )));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Unavailable(describe_transport_error(&e)))?;

        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::Unavailable("response had no predictions".into()))?;
        let confidence = prediction.confidence;
        let text = prediction
            .content
            .or(prediction.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AnalysisError::Unavailable("prediction had no text".into()))?;

        Ok(parse_model_text(text, confidence))
    }
}

/// Turn free model output into a structured assessment.
pub fn parse_model_text(text: String, confidence: Option<f64>) -> AnalysisResult {
    let measurements = WoundMeasurements {
        length: extract::measurement(&text, "length"),
        width: extract::measurement(&text, "width"),
        depth: extract::measurement(&text, "depth"),
    };

    AnalysisResult {
        wound_type: extract::field(&text, "wound type").or_else(|| extract::field(&text, "type")),
        severity: extract::field(&text, "severity").or_else(|| extract::field(&text, "stage")),
        measurements: (!measurements.is_empty()).then_some(measurements),
        recommendations: extract::recommendations(&text),
        confidence: confidence
            .filter(|c| (0.0..=1.0).contains(c))
            .unwrap_or(DEFAULT_CONFIDENCE),
        infection_risk: Some(extract::infection_risk(&text)),
        risk_factors: extract::risk_factors(&text),
        healing_stage: extract::field(&text, "healing stage")
            .or_else(|| extract::field(&text, "healing")),
        analysis_text: text,
    }
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Clone, Debug)]
enum Backend {
    Live {
        live: LiveAnalysis,
        fallback: Option<SyntheticAnalysis>,
    },
    Synthetic(SyntheticAnalysis),
}

/// The configured image-analysis adapter.
#[derive(Clone, Debug)]
pub struct AnalysisClient {
    backend: Backend,
}

impl AnalysisClient {
    /// Pick a backend from `config`.
    ///
    /// The live backend needs both an endpoint and an access token.
    pub fn from_config(config: &AnalysisConfig) -> ConfigResult<Self> {
        let synthetic = SyntheticAnalysis::new(config.scenario);
        let backend = match (&config.endpoint, &config.access_token) {
            (Some(endpoint), Some(token)) => Backend::Live {
                live: LiveAnalysis::new(endpoint.clone(), token.clone(), config.timeout)?,
                fallback: config.fallback_to_synthetic.then_some(synthetic),
            },
            (None, Some(_)) => {
                tracing::warn!("analysis access token set without an endpoint; using synthetic");
                Backend::Synthetic(synthetic)
            }
            _ => Backend::Synthetic(synthetic),
        };
        Ok(Self { backend })
    }

    pub fn synthetic(source: ScenarioSource) -> Self {
        Self {
            backend: Backend::Synthetic(SyntheticAnalysis::new(source)),
        }
    }
}

#[async_trait]
impl ImageAnalysisClient for AnalysisClient {
    async fn analyze(
        &self,
        photo: &Photo,
        patient_context: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        match &self.backend {
            Backend::Synthetic(synthetic) => Ok(synthetic.generate(photo)),
            Backend::Live { live, fallback } => match live.analyze(photo, patient_context).await {
                Ok(result) => Ok(result),
                Err(err) => match fallback {
                    Some(synthetic) => {
                        tracing::warn!(error = %err, "live analysis failed; using synthetic");
                        Ok(synthetic.generate(photo))
                    }
                    None => Err(err),
                },
            },
        }
    }

    fn status(&self) -> CollaboratorStatus {
        match &self.backend {
            Backend::Live { fallback, .. } => CollaboratorStatus::new(
                BackendMode::Live,
                if fallback.is_some() {
                    "model endpoint configured, synthetic fallback on failure"
                } else {
                    "model endpoint configured"
                },
            ),
            Backend::Synthetic(_) => {
                CollaboratorStatus::new(BackendMode::Synthetic, "no model endpoint configured")
            }
        }
    }
}
