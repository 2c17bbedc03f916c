//! Clinical-text converter: free-text assessment in, coded Observation/Condition records out.

use crate::clients::{
    describe_transport_error, http_client, join_url, BackendMode, CollaboratorStatus,
};
use crate::config::{ConverterConfig, ConverterCredentials};
use crate::error::{ConfigResult, ConversionError};
use crate::extract;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use fhir::{
    codes, CodeableConcept, Coding, Condition, Observation, ObservationComponent,
    ObservationStatus, Quantity, Reference, Resource, ResourceKind, StructuredRecordSet,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use woundsnap_types::PatientId;

const DEFAULT_KINDS: [ResourceKind; 2] = [ResourceKind::Observation, ResourceKind::Condition];
const EMPTY_TEXT_MESSAGE: &str = "No clinical text to convert";
const CONVERTED_MESSAGE: &str = "FHIR conversion completed successfully";

#[async_trait]
pub trait ClinicalTextConverter: Send + Sync {
    /// Convert `clinical_text` into records about `patient_id`.
    ///
    /// Blank text yields a successful, empty set. `kinds` limits which record kinds are
    /// returned; `None` means observations and conditions.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Unavailable`] when the backend cannot be reached, rejects
    /// the credentials, or returns records that cannot be used.
    async fn convert(
        &self,
        clinical_text: &str,
        patient_id: &PatientId,
        kinds: Option<&[ResourceKind]>,
    ) -> Result<StructuredRecordSet, ConversionError>;

    fn status(&self) -> CollaboratorStatus;
}

// ============================================================================
// Synthetic backend
// ============================================================================

/// Derives coded records from the wording of the assessment.
#[derive(Clone, Debug, Default)]
pub struct SyntheticConverter;

impl SyntheticConverter {
    pub fn convert(&self, clinical_text: &str, patient_id: &PatientId) -> StructuredRecordSet {
        let subject = Reference::patient(patient_id);
        let now = Utc::now();

        let mut observation = Observation::new(
            ObservationStatus::Final,
            CodeableConcept::single(Coding::new(
                codes::LOINC_SYSTEM,
                codes::WOUND_ASSESSMENT_PANEL,
            )),
            subject.clone(),
        )
        .with_value_string(first_sentence(clinical_text))
        .with_effective(now);

        for (label, code) in [("length", codes::WOUND_LENGTH), ("width", codes::WOUND_WIDTH)] {
            if let Some(value) = extract::measurement(clinical_text, label)
                .as_deref()
                .and_then(extract::centimetres)
            {
                observation = observation.with_component(ObservationComponent {
                    code: CodeableConcept::single(Coding::new(codes::SNOMED_SYSTEM, code)),
                    value_quantity: Some(Quantity {
                        value,
                        unit: "cm".into(),
                    }),
                    value_string: None,
                });
            }
        }

        let mut conditions = Vec::new();
        let condition_code = match extract::stage(clinical_text) {
            Some(1) => Some(codes::PRESSURE_ULCER_STAGE_1),
            Some(2) => Some(codes::PRESSURE_ULCER_STAGE_2),
            Some(3) => Some(codes::PRESSURE_ULCER_STAGE_3),
            Some(4) => Some(codes::PRESSURE_ULCER_STAGE_4),
            _ if clinical_text.to_lowercase().contains("ulcer") => Some(codes::PRESSURE_ULCER),
            _ => None,
        };
        if let Some(code) = condition_code {
            conditions.push(
                Condition::active(
                    CodeableConcept::single(Coding::new(codes::SNOMED_SYSTEM, code)),
                    subject,
                )
                .with_onset(now),
            );
        }

        StructuredRecordSet {
            observations: vec![observation],
            conditions,
            success: true,
            message: CONVERTED_MESSAGE.into(),
        }
    }
}

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    match text.find(". ") {
        Some(end) => text[..=end].to_owned(),
        None => text.to_owned(),
    }
}

// ============================================================================
// Live backend
// ============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    text: &'a str,
    version: &'a str,
    resource: &'a str,
}

/// A text-to-FHIR service that authenticates with basic credentials and creates one resource
/// per request.
#[derive(Clone, Debug)]
pub struct LiveConverter {
    client: reqwest::Client,
    base_url: String,
    credentials: ConverterCredentials,
}

impl LiveConverter {
    pub fn new(
        base_url: String,
        credentials: ConverterCredentials,
        timeout: std::time::Duration,
    ) -> ConfigResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            credentials,
        })
    }

    /// Exchange the configured credentials for a bearer token.
    ///
    /// Tokens are not cached; every conversion authenticates afresh.
    async fn authenticate(&self) -> Result<String, ConversionError> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.email, self.credentials.password
        ));
        let response = self
            .client
            .post(join_url(&self.base_url, "auth/token"))
            .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
            .send()
            .await
            .map_err(|e| ConversionError::Unavailable(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::Unavailable(format!(
                "authentication failed: {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConversionError::Unavailable(describe_transport_error(&e)))?;
        if token.token.trim().is_empty() {
            return Err(ConversionError::Unavailable(
                "authentication returned an empty token".into(),
            ));
        }
        Ok(token.token)
    }

    async fn create(
        &self,
        token: &str,
        clinical_text: &str,
        kind: ResourceKind,
    ) -> Result<Value, ConversionError> {
        let response = self
            .client
            .post(join_url(&self.base_url, "lang2fhir/create"))
            .bearer_auth(token)
            .json(&CreateRequest {
                text: clinical_text,
                version: "1.0",
                resource: kind.as_str(),
            })
            .send()
            .await
            .map_err(|e| ConversionError::Unavailable(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::Unavailable(format!(
                "{kind} conversion returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ConversionError::Unavailable(describe_transport_error(&e)))
    }

    pub async fn convert(
        &self,
        clinical_text: &str,
        patient_id: &PatientId,
        kinds: &[ResourceKind],
    ) -> Result<StructuredRecordSet, ConversionError> {
        let token = self.authenticate().await?;
        let subject = Reference::patient(patient_id);
        let mut set = StructuredRecordSet::empty(CONVERTED_MESSAGE);

        for kind in kinds
            .iter()
            .copied()
            .filter(|k| *k != ResourceKind::Media)
        {
            let value = self.create(&token, clinical_text, kind).await?;
            let value = with_subject(value, &subject)?;
            match Resource::from_value(value)
                .map_err(|e| ConversionError::Unavailable(e.to_string()))?
            {
                Resource::Observation(observation) => set.observations.push(observation),
                Resource::Condition(condition) => set.conditions.push(condition),
                Resource::Media(_) => {
                    return Err(ConversionError::Unavailable(
                        "converter returned a Media resource".into(),
                    ))
                }
            }
        }

        Ok(set)
    }
}

/// Fill in a missing subject; reject one that names a different patient.
fn with_subject(mut value: Value, subject: &Reference) -> Result<Value, ConversionError> {
    let Some(object) = value.as_object_mut() else {
        return Err(ConversionError::Unavailable(
            "converter response is not a JSON object".into(),
        ));
    };

    match object
        .get("subject")
        .and_then(|s| s.get("reference"))
        .and_then(Value::as_str)
    {
        Some(found) if found == subject.reference => {}
        Some(found) => {
            return Err(ConversionError::Unavailable(format!(
                "record subject {found} does not match {}",
                subject.reference
            )))
        }
        None => {
            object.insert(
                "subject".into(),
                serde_json::json!({ "reference": subject.reference }),
            );
        }
    }
    Ok(value)
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Clone, Debug)]
enum Backend {
    Live(LiveConverter),
    Synthetic(SyntheticConverter),
}

/// The configured clinical-text converter.
#[derive(Clone, Debug)]
pub struct ConverterClient {
    backend: Backend,
}

impl ConverterClient {
    /// The live backend needs a base URL and both credential halves.
    pub fn from_config(config: &ConverterConfig) -> ConfigResult<Self> {
        let backend = match (&config.base_url, &config.credentials) {
            (Some(base_url), Some(credentials)) => Backend::Live(LiveConverter::new(
                base_url.clone(),
                credentials.clone(),
                config.timeout,
            )?),
            (None, Some(_)) => {
                tracing::warn!("converter credentials set without a base URL; using synthetic");
                Backend::Synthetic(SyntheticConverter)
            }
            _ => Backend::Synthetic(SyntheticConverter),
        };
        Ok(Self { backend })
    }

    pub fn synthetic() -> Self {
        Self {
            backend: Backend::Synthetic(SyntheticConverter),
        }
    }
}

#[async_trait]
impl ClinicalTextConverter for ConverterClient {
    async fn convert(
        &self,
        clinical_text: &str,
        patient_id: &PatientId,
        kinds: Option<&[ResourceKind]>,
    ) -> Result<StructuredRecordSet, ConversionError> {
        if clinical_text.trim().is_empty() {
            return Ok(StructuredRecordSet::empty(EMPTY_TEXT_MESSAGE));
        }
        let kinds = kinds.unwrap_or(&DEFAULT_KINDS[..]);

        let set = match &self.backend {
            Backend::Synthetic(synthetic) => synthetic.convert(clinical_text, patient_id),
            Backend::Live(live) => live.convert(clinical_text, patient_id, kinds).await?,
        };
        let set = set.retain_kinds(kinds);
        tracing::debug!(
            observations = set.observations.len(),
            conditions = set.conditions.len(),
            "converted clinical text"
        );
        Ok(set)
    }

    fn status(&self) -> CollaboratorStatus {
        match &self.backend {
            Backend::Live(_) => {
                CollaboratorStatus::new(BackendMode::Live, "converter credentials configured")
            }
            Backend::Synthetic(_) => CollaboratorStatus::new(
                BackendMode::Synthetic,
                "no converter credentials configured",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::test_support::serve;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::time::Duration;

    const TEXT: &str = "Stage 2 pressure ulcer identified in the sacral region. The wound \
        measures approximately 2.3 cm in length and 1.8 cm in width.";

    fn patient() -> PatientId {
        PatientId::parse("demo-patient").expect("valid id")
    }

    fn live(base_url: String) -> ConverterClient {
        ConverterClient::from_config(&ConverterConfig {
            base_url: Some(base_url),
            credentials: Some(ConverterCredentials {
                email: "nurse@example.org".into(),
                password: "secret".into(),
            }),
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn empty_text_is_an_empty_success() {
        let client = ConverterClient::synthetic();
        let set = client
            .convert("   ", &patient(), None)
            .await
            .expect("never an error");
        assert!(set.success);
        assert!(set.observations.is_empty());
        assert!(set.conditions.is_empty());
    }

    #[tokio::test]
    async fn empty_text_skips_the_live_backend() {
        let client = live(crate::clients::test_support::unreachable_url().await);
        let set = client.convert("", &patient(), None).await.expect("empty");
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn synthetic_records_are_coded_for_the_patient() {
        let set = ConverterClient::synthetic()
            .convert(TEXT, &patient(), None)
            .await
            .expect("converted");

        set.check_subject(&Reference::patient(&patient()))
            .expect("every subject is the patient");

        let observation = &set.observations[0];
        assert_eq!(observation.code.coding[0].code, "72300-6");
        let lengths: Vec<f64> = observation
            .component
            .iter()
            .filter_map(|c| c.value_quantity.as_ref().map(|q| q.value))
            .collect();
        assert_eq!(lengths, vec![2.3, 1.8]);

        assert_eq!(set.conditions.len(), 1);
        assert_eq!(
            set.conditions[0].code.coding[0].code,
            codes::PRESSURE_ULCER_STAGE_2.0
        );
    }

    #[tokio::test]
    async fn kinds_filter_the_result() {
        let set = ConverterClient::synthetic()
            .convert(TEXT, &patient(), Some(&[ResourceKind::Condition][..]))
            .await
            .expect("converted");
        assert!(set.observations.is_empty());
        assert_eq!(set.conditions.len(), 1);
    }

    #[test]
    fn no_condition_without_an_ulcer() {
        let set = SyntheticConverter.convert("Superficial abrasion on the forearm.", &patient());
        assert_eq!(set.observations.len(), 1);
        assert!(set.conditions.is_empty());
    }

    #[tokio::test]
    async fn live_converter_authenticates_and_fills_subject() {
        let router = Router::new()
            .route(
                "/auth/token",
                post(|headers: HeaderMap| async move {
                    let expected = format!("Basic {}", STANDARD.encode("nurse@example.org:secret"));
                    if headers.get("authorization").and_then(|v| v.to_str().ok())
                        == Some(expected.as_str())
                    {
                        Ok(Json(json!({ "token": "t-1" })))
                    } else {
                        Err(StatusCode::UNAUTHORIZED)
                    }
                }),
            )
            .route(
                "/lang2fhir/create",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["version"], "1.0");
                    let resource = if body["resource"] == "Condition" {
                        json!({
                            "resourceType": "Condition",
                            "clinicalStatus": {"coding": [{"system": codes::CONDITION_CLINICAL_SYSTEM, "code": "active"}]},
                            "code": {"coding": [{"system": codes::SNOMED_SYSTEM, "code": "421076008"}]}
                        })
                    } else {
                        json!({
                            "resourceType": "Observation",
                            "status": "final",
                            "code": {"coding": [{"system": codes::LOINC_SYSTEM, "code": "72300-6"}]},
                            "subject": {"reference": "Patient/demo-patient"}
                        })
                    };
                    Json(resource)
                }),
            );
        let client = live(serve(router).await);
        assert_eq!(client.status().mode, BackendMode::Live);

        let set = client
            .convert(TEXT, &patient(), None)
            .await
            .expect("converted");
        assert_eq!(set.observations.len(), 1);
        assert_eq!(set.conditions.len(), 1);
        assert_eq!(set.conditions[0].subject.reference, "Patient/demo-patient");
    }

    #[tokio::test]
    async fn rejected_credentials_are_unavailable() {
        let router = Router::new().route(
            "/auth/token",
            post(|| async { StatusCode::UNAUTHORIZED }),
        );
        let client = live(serve(router).await);

        let err = client
            .convert(TEXT, &patient(), None)
            .await
            .expect_err("auth failure");
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn foreign_subject_is_rejected() {
        let value = json!({"resourceType": "Observation", "subject": {"reference": "Patient/other"}});
        let err = with_subject(value, &Reference::patient(&patient())).expect_err("mismatch");
        assert!(err.to_string().contains("Patient/other"));
    }
}
