//! The workflow orchestrator.
//!
//! [`WorkflowOrchestrator::execute_workflow`] turns one wound photograph into a sequence of
//! collaborator calls:
//!
//! 1. Photo Processing: validate the bytes (fatal)
//! 2. AI Analysis: assess the photo (fatal)
//! 3. FHIR-style Conversion: code the assessment text (fatal)
//! 4. EHR Storage: file the photo and records (fatal)
//! 5. Workflow Automation: classify risk and notify the care team (advisory)
//!
//! Steps run strictly in order. Collaborator failures are recorded as failed steps rather than
//! returned as errors; only a malformed patient id is rejected outright.

pub mod model;
pub mod state;

pub use model::{
    AutomationSummary, FinalData, WorkflowProgress, WorkflowResult, WorkflowStep,
    WorkflowStepResult,
};
pub use state::WorkflowState;

use crate::clients::analysis::{AnalysisClient, ImageAnalysisClient};
use crate::clients::automation::{
    AutomationClient, AutomationPayload, CareAutomation, WoundFindings,
};
use crate::clients::converter::{ClinicalTextConverter, ConverterClient};
use crate::clients::record_store::{RecordStore, RecordStoreClient};
use crate::clients::ConfigurationStatus;
use crate::config::{CoreConfig, WorkflowSettings};
use crate::error::{ConfigResult, WorkflowError};
use crate::risk::classify_analysis;
use fhir::Reference;
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use woundsnap_photo::Photo;
use woundsnap_types::PatientId;

/// Receives a [`WorkflowProgress`] before each step starts.
pub type ProgressCallback = dyn Fn(&WorkflowProgress) + Send + Sync;

/// Sequences the four collaborators into a single run.
///
/// Cloning is cheap; clones share the collaborators, which hold no per-run state.
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    analysis: Arc<dyn ImageAnalysisClient>,
    converter: Arc<dyn ClinicalTextConverter>,
    store: Arc<dyn RecordStore>,
    automation: Arc<dyn CareAutomation>,
    settings: WorkflowSettings,
}

impl WorkflowOrchestrator {
    pub fn new(
        analysis: Arc<dyn ImageAnalysisClient>,
        converter: Arc<dyn ClinicalTextConverter>,
        store: Arc<dyn RecordStore>,
        automation: Arc<dyn CareAutomation>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            analysis,
            converter,
            store,
            automation,
            settings,
        }
    }

    /// Build every adapter from `config`, choosing live or synthetic backends once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::ConfigError) if an HTTP client cannot be built or the
    /// local record store directory is unusable.
    pub fn from_config(config: &CoreConfig) -> ConfigResult<Self> {
        let orchestrator = Self::new(
            Arc::new(AnalysisClient::from_config(&config.analysis)?),
            Arc::new(ConverterClient::from_config(&config.converter)?),
            Arc::new(RecordStoreClient::from_config(&config.record_store)?),
            Arc::new(AutomationClient::from_config(&config.automation)?),
            config.workflow.clone(),
        );
        let status = orchestrator.configuration_status();
        tracing::info!(
            analysis = %status.analysis.mode,
            converter = %status.converter.mode,
            record_store = %status.record_store.mode,
            automation = %status.automation.mode,
            "workflow collaborators configured"
        );
        Ok(orchestrator)
    }

    /// Step names in execution order.
    pub fn steps() -> Vec<&'static str> {
        WorkflowStep::ALL.iter().map(|step| step.name()).collect()
    }

    pub fn configuration_status(&self) -> ConfigurationStatus {
        ConfigurationStatus {
            analysis: self.analysis.status(),
            converter: self.converter.status(),
            record_store: self.store.status(),
            automation: self.automation.status(),
        }
    }

    /// The care-automation trigger, for follow-ups scheduled outside a run.
    pub fn automation(&self) -> &Arc<dyn CareAutomation> {
        &self.automation
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Run the full workflow for one photo.
    ///
    /// # Arguments
    ///
    /// * `photo` - Raw image bytes.
    /// * `patient_id` - Identifier embedded in every record's `Patient/<id>` subject.
    /// * `on_progress` - Called synchronously before each attempted step.
    ///
    /// # Returns
    ///
    /// A [`WorkflowResult`] describing every attempted step. A fatal failure in steps 1 to 4
    /// gives `success = false` and no final data; a failed automation step keeps
    /// `success = true`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidPatientId`] if `patient_id` is blank or malformed.
    pub async fn execute_workflow(
        &self,
        photo: Vec<u8>,
        patient_id: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<WorkflowResult, WorkflowError> {
        let patient_id = PatientId::parse(patient_id)?;
        let mut run = Run::new(on_progress);
        tracing::info!(run_id = %run.run_id, patient = %patient_id, "workflow started");

        // 1. Photo Processing
        let step = WorkflowStep::PhotoProcessing;
        let started = run.begin(step);
        let photo = match Photo::validate(photo, &self.settings.photo_policy) {
            Ok(photo) => {
                run.succeed(
                    step,
                    started,
                    json!({
                        "media_type": photo.media_type(),
                        "size_bytes": photo.size_bytes(),
                        "sha256": photo.sha256(),
                    }),
                );
                photo
            }
            Err(err) => {
                run.fail(step, started, err.to_string());
                return Ok(run.abort());
            }
        };

        // 2. AI Analysis
        let step = WorkflowStep::AiAnalysis;
        let started = run.begin(step);
        let analysis = match self
            .analysis
            .analyze(&photo, Some(self.settings.patient_context.as_str()))
            .await
        {
            Ok(analysis) => {
                run.succeed(
                    step,
                    started,
                    json!({
                        "wound_type": analysis.wound_type,
                        "severity": analysis.severity,
                        "infection_risk": analysis.infection_risk,
                        "confidence": analysis.confidence,
                    }),
                );
                analysis
            }
            Err(err) => {
                run.fail(step, started, step_error(step, err));
                return Ok(run.abort());
            }
        };

        // 3. FHIR-style Conversion
        let step = WorkflowStep::Conversion;
        let started = run.begin(step);
        let converted = self
            .converter
            .convert(
                &analysis.analysis_text,
                &patient_id,
                Some(self.settings.resource_kinds.as_slice()),
            )
            .await
            .map_err(|err| step_error(step, err))
            .and_then(|records| {
                if !records.success {
                    return Err(step_error(step, &records.message));
                }
                records
                    .check_subject(&Reference::patient(&patient_id))
                    .map_err(|err| step_error(step, err))?;
                Ok(records)
            });
        let records = match converted {
            Ok(records) => {
                run.succeed(
                    step,
                    started,
                    json!({
                        "observations": records.observations.len(),
                        "conditions": records.conditions.len(),
                        "message": records.message,
                    }),
                );
                records
            }
            Err(message) => {
                run.fail(step, started, message);
                return Ok(run.abort());
            }
        };

        // 4. EHR Storage
        let step = WorkflowStep::EhrStorage;
        let started = run.begin(step);
        let storage = match self
            .store
            .store(&photo, &analysis.analysis_text, &records, &patient_id)
            .await
        {
            Ok(receipt) => {
                run.succeed(
                    step,
                    started,
                    serde_json::to_value(&receipt).unwrap_or(Value::Null),
                );
                receipt
            }
            Err(err) => {
                run.fail(step, started, step_error(step, err));
                return Ok(run.abort());
            }
        };

        // 5. Workflow Automation
        let step = WorkflowStep::Automation;
        let started = run.begin(step);
        let risk_level = classify_analysis(&analysis);
        let kind = risk_level.automation_kind();
        let payload = AutomationPayload::Wound(WoundFindings::from_analysis(
            &analysis,
            risk_level,
            storage.media_id.clone(),
        ));
        let outcome = self.automation.trigger(kind, &patient_id, &payload).await;
        if outcome.is_success() {
            run.succeed(
                step,
                started,
                json!({
                    "risk_level": risk_level,
                    "workflow_kind": kind,
                    "workflow_id": outcome.workflow_id,
                    "status": outcome.status,
                }),
            );
        } else {
            let detail = outcome.detail.as_deref().unwrap_or("automation failed");
            run.fail(step, started, step_error(step, detail));
        }

        let workflow_results = AutomationSummary {
            workflow_kind: kind,
            risk_level,
            infection_risk: analysis.infection_risk,
            risk_factors: analysis.risk_factors.clone(),
            outcome,
        };

        Ok(run.finish(FinalData {
            analysis,
            records,
            storage,
            workflow_results,
        }))
    }
}

fn step_error(step: WorkflowStep, err: impl Display) -> String {
    format!("{} failed: {err}", step.name())
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Bookkeeping for one call of `execute_workflow`.
struct Run<'a> {
    run_id: Uuid,
    started: Instant,
    state: WorkflowState,
    steps: Vec<WorkflowStepResult>,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a> Run<'a> {
    fn new(on_progress: Option<&'a ProgressCallback>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            state: WorkflowState::Idle,
            steps: Vec::with_capacity(WorkflowStep::ALL.len()),
            on_progress,
        }
    }

    fn begin(&self, step: WorkflowStep) -> Instant {
        tracing::info!(run_id = %self.run_id, step = step.name(), "step started");
        if let Some(on_progress) = self.on_progress {
            on_progress(&WorkflowProgress::for_step(step));
        }
        Instant::now()
    }

    fn succeed(&mut self, step: WorkflowStep, started: Instant, data: Value) {
        self.record(WorkflowStepResult {
            step,
            success: true,
            data: Some(data),
            error: None,
            duration_ms: elapsed_ms(started),
        });
    }

    fn fail(&mut self, step: WorkflowStep, started: Instant, error: String) {
        if step.is_fatal() {
            tracing::error!(run_id = %self.run_id, step = step.name(), %error, "step failed");
        } else {
            tracing::warn!(run_id = %self.run_id, step = step.name(), %error, "advisory step failed");
        }
        self.record(WorkflowStepResult {
            step,
            success: false,
            data: None,
            error: Some(error),
            duration_ms: elapsed_ms(started),
        });
    }

    fn record(&mut self, result: WorkflowStepResult) {
        let next = self.state.after(result.step, result.success);
        tracing::info!(
            run_id = %self.run_id,
            from = %self.state,
            to = %next,
            duration_ms = result.duration_ms,
            "workflow state changed"
        );
        self.state = next;
        self.steps.push(result);
    }

    fn abort(self) -> WorkflowResult {
        let error = self
            .steps
            .iter()
            .rev()
            .find(|step| !step.success)
            .and_then(|step| step.error.clone());
        let total_duration_ms = elapsed_ms(self.started);
        tracing::error!(run_id = %self.run_id, total_duration_ms, "workflow aborted");
        WorkflowResult {
            run_id: self.run_id,
            success: false,
            steps: self.steps,
            final_data: None,
            total_duration_ms,
            error,
        }
    }

    fn finish(mut self, final_data: FinalData) -> WorkflowResult {
        self.state = self.state.complete();
        let total_duration_ms = elapsed_ms(self.started);
        tracing::info!(
            run_id = %self.run_id,
            state = %self.state,
            total_duration_ms,
            "workflow finished"
        );
        WorkflowResult {
            run_id: self.run_id,
            success: true,
            steps: self.steps,
            final_data: Some(final_data),
            total_duration_ms,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::analysis::{AnalysisResult, ScenarioSource, SyntheticScenario};
    use crate::clients::automation::{AutomationKind, AutomationStatus};
    use crate::clients::record_store::StorageReceipt;
    use crate::clients::test_support::{slow_url, unreachable_url};
    use crate::clients::{BackendMode, CollaboratorStatus};
    use crate::config::{AnalysisConfig, AutomationConfig};
    use crate::error::{AnalysisError, ConversionError, StoreError};
    use crate::risk::RiskClassification;
    use async_trait::async_trait;
    use fhir::{ResourceKind, StructuredRecordSet};
    use std::sync::Mutex;
    use std::time::Duration;
    use woundsnap_photo::PhotoPolicy;

    const PATIENT: &str = "demo-patient";

    fn jpeg() -> Vec<u8> {
        vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00,
        ]
    }

    fn png() -> Vec<u8> {
        vec![
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00,
        ]
    }

    struct FixedAnalysis(AnalysisResult);

    #[async_trait]
    impl ImageAnalysisClient for FixedAnalysis {
        async fn analyze(
            &self,
            _photo: &Photo,
            _patient_context: Option<&str>,
        ) -> Result<AnalysisResult, AnalysisError> {
            Ok(self.0.clone())
        }

        fn status(&self) -> CollaboratorStatus {
            CollaboratorStatus::new(BackendMode::Synthetic, "fixed")
        }
    }

    struct DownAnalysis;

    #[async_trait]
    impl ImageAnalysisClient for DownAnalysis {
        async fn analyze(
            &self,
            _photo: &Photo,
            _patient_context: Option<&str>,
        ) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::Unavailable("model endpoint returned 503".into()))
        }

        fn status(&self) -> CollaboratorStatus {
            CollaboratorStatus::new(BackendMode::Live, "down")
        }
    }

    /// Either fails with the given reason or returns the given records.
    struct StubConverter(Result<StructuredRecordSet, String>);

    #[async_trait]
    impl ClinicalTextConverter for StubConverter {
        async fn convert(
            &self,
            _clinical_text: &str,
            _patient_id: &PatientId,
            _kinds: Option<&[ResourceKind]>,
        ) -> Result<StructuredRecordSet, ConversionError> {
            self.0.clone().map_err(ConversionError::Unavailable)
        }

        fn status(&self) -> CollaboratorStatus {
            CollaboratorStatus::new(BackendMode::Live, "stub")
        }
    }

    struct DownStore;

    #[async_trait]
    impl RecordStore for DownStore {
        async fn store(
            &self,
            _photo: &Photo,
            _clinical_text: &str,
            _records: &StructuredRecordSet,
            _patient_id: &PatientId,
        ) -> Result<StorageReceipt, StoreError> {
            Err(StoreError::Unavailable("connection failed".into()))
        }

        fn status(&self) -> CollaboratorStatus {
            CollaboratorStatus::new(BackendMode::Live, "down")
        }
    }

    struct Builder {
        analysis: Arc<dyn ImageAnalysisClient>,
        converter: Arc<dyn ClinicalTextConverter>,
        store: Arc<dyn RecordStore>,
        automation: Arc<dyn CareAutomation>,
        settings: WorkflowSettings,
    }

    impl Builder {
        fn healthy(scenario: SyntheticScenario) -> Self {
            Self {
                analysis: Arc::new(AnalysisClient::synthetic(ScenarioSource::Fixed(scenario))),
                converter: Arc::new(ConverterClient::synthetic()),
                store: Arc::new(RecordStoreClient::synthetic()),
                automation: Arc::new(AutomationClient::synthetic()),
                settings: WorkflowSettings::default(),
            }
        }

        fn build(self) -> WorkflowOrchestrator {
            WorkflowOrchestrator::new(
                self.analysis,
                self.converter,
                self.store,
                self.automation,
                self.settings,
            )
        }
    }

    async fn run(orchestrator: &WorkflowOrchestrator, photo: Vec<u8>) -> WorkflowResult {
        orchestrator
            .execute_workflow(photo, PATIENT, None)
            .await
            .expect("valid patient id")
    }

    fn assert_audit_complete(result: &WorkflowResult) {
        for (index, step) in result.steps.iter().enumerate() {
            assert_eq!(step.step, WorkflowStep::ALL[index], "steps out of order");
        }
        let failed_fatal = result
            .steps
            .iter()
            .filter(|step| !step.success && step.step.is_fatal())
            .count();
        assert!(failed_fatal <= 1);
        if failed_fatal == 1 {
            assert!(!result.steps.last().map_or(true, |step| step.success));
        }
    }

    #[tokio::test]
    async fn scenario_high_risk_triggers_critical_workflow() {
        let orchestrator = Builder::healthy(SyntheticScenario::HighRisk).build();
        let result = run(&orchestrator, jpeg()).await;

        assert!(result.success);
        assert!(!result.is_degraded());
        assert_eq!(result.steps.len(), 5);
        assert!(result.steps.iter().all(|step| step.success));
        assert_audit_complete(&result);

        let final_data = result.final_data.expect("final data");
        assert_eq!(
            final_data.workflow_results.risk_level,
            RiskClassification::Critical
        );
        assert_eq!(
            final_data.workflow_results.workflow_kind,
            AutomationKind::CriticalRisk
        );
        assert_eq!(
            final_data.workflow_results.outcome.status,
            AutomationStatus::Completed
        );
        final_data
            .records
            .check_subject(&Reference {
                reference: format!("Patient/{PATIENT}"),
            })
            .expect("records belong to the patient");
        assert_eq!(
            final_data.storage.observation_ids.len(),
            final_data.records.observations.len()
        );
    }

    #[tokio::test]
    async fn scenario_stage_two_routes_to_standard_care() {
        let mut analysis = SyntheticScenario::LowRisk.result();
        analysis.infection_risk = woundsnap_types::InfectionRisk::new(20).ok();
        analysis.severity = Some("Stage 2".into());
        let orchestrator = Builder {
            analysis: Arc::new(FixedAnalysis(analysis)),
            ..Builder::healthy(SyntheticScenario::LowRisk)
        }
        .build();

        let result = run(&orchestrator, png()).await;
        assert!(result.success);
        let summary = result.final_data.expect("final data").workflow_results;
        assert_eq!(summary.risk_level, RiskClassification::High);
        assert_eq!(summary.workflow_kind, AutomationKind::StandardCare);
    }

    #[tokio::test]
    async fn scenario_converter_down_aborts_after_three_steps() {
        let orchestrator = Builder {
            converter: Arc::new(StubConverter(Err("authentication failed: 401".into()))),
            ..Builder::healthy(SyntheticScenario::HighRisk)
        }
        .build();

        let result = run(&orchestrator, jpeg()).await;
        assert!(!result.success);
        assert!(result.final_data.is_none());
        assert_eq!(result.steps.len(), 3);
        assert!(result.steps[0].success);
        assert!(result.steps[1].success);
        assert_eq!(result.steps[2].step, WorkflowStep::Conversion);
        assert!(!result.steps[2].success);

        let error = result.error.clone().expect("top-level error");
        assert_eq!(Some(&error), result.steps[2].error.as_ref());
        assert!(error.starts_with("FHIR-style Conversion failed"));
        assert!(error.contains("401"));
        assert_audit_complete(&result);
    }

    #[tokio::test]
    async fn empty_or_oversize_photo_records_one_step() {
        let orchestrator = Builder {
            settings: WorkflowSettings {
                photo_policy: PhotoPolicy { max_bytes: 16 },
                ..WorkflowSettings::default()
            },
            ..Builder::healthy(SyntheticScenario::HighRisk)
        }
        .build();

        let mut oversize = jpeg();
        oversize.resize(17, 0);
        for photo in [Vec::new(), oversize, b"not an image at all".to_vec()] {
            let result = run(&orchestrator, photo).await;
            assert!(!result.success);
            assert_eq!(result.steps.len(), 1);
            assert_eq!(result.steps[0].step.name(), "Photo Processing");
            assert!(result.final_data.is_none());
            assert!(result.error.is_some());
        }
    }

    #[tokio::test]
    async fn valid_photos_record_at_least_four_steps() {
        let orchestrator = Builder {
            store: Arc::new(DownStore),
            ..Builder::healthy(SyntheticScenario::LowRisk)
        }
        .build();

        for photo in [jpeg(), png()] {
            let result = run(&orchestrator, photo).await;
            assert!(result.steps.len() >= 4);
            assert_eq!(result.steps[0].step.name(), "Photo Processing");
            assert_audit_complete(&result);
        }
    }

    #[tokio::test]
    async fn analysis_failure_is_fatal() {
        let orchestrator = Builder {
            analysis: Arc::new(DownAnalysis),
            ..Builder::healthy(SyntheticScenario::HighRisk)
        }
        .build();

        let result = run(&orchestrator, jpeg()).await;
        assert!(!result.success);
        assert_eq!(result.steps.len(), 2);
        assert!(result
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("AI Analysis failed")));
    }

    #[tokio::test]
    async fn unreachable_automation_is_advisory() {
        let automation = AutomationClient::from_config(&AutomationConfig {
            critical_webhook: Some(unreachable_url().await),
            standard_webhook: None,
            follow_up_webhook: None,
            timeout: Duration::from_secs(2),
        })
        .expect("client");
        let orchestrator = Builder {
            automation: Arc::new(automation),
            ..Builder::healthy(SyntheticScenario::HighRisk)
        }
        .build();

        let result = run(&orchestrator, jpeg()).await;
        assert!(result.success);
        assert!(result.is_degraded());
        assert_eq!(result.steps.len(), 5);
        let automation_step = result.step(WorkflowStep::Automation).expect("step 5");
        assert!(!automation_step.success);
        assert!(result.error.is_none());

        let outcome = result.final_data.expect("final data").workflow_results.outcome;
        assert_eq!(outcome.status, AutomationStatus::Failed);
    }

    #[tokio::test]
    async fn analysis_timeout_is_fatal() {
        let analysis = AnalysisClient::from_config(&AnalysisConfig {
            endpoint: Some(format!("{}/m", slow_url(Duration::from_secs(3)).await)),
            access_token: Some("token".into()),
            fallback_to_synthetic: false,
            scenario: ScenarioSource::Fixed(SyntheticScenario::HighRisk),
            timeout: Duration::from_millis(300),
        })
        .expect("client");
        let orchestrator = Builder {
            analysis: Arc::new(analysis),
            ..Builder::healthy(SyntheticScenario::HighRisk)
        }
        .build();

        let result = run(&orchestrator, jpeg()).await;
        assert!(!result.success);
        assert_eq!(result.steps.len(), 2);
        assert!(result.final_data.is_none());
        let error = result.error.as_deref().expect("top-level error");
        assert!(error.starts_with("AI Analysis failed"));
        assert!(error.contains("timed out"));
        assert_audit_complete(&result);
    }

    #[tokio::test]
    async fn automation_timeout_is_advisory() {
        let automation = AutomationClient::from_config(&AutomationConfig {
            critical_webhook: Some(format!(
                "{}/critical",
                slow_url(Duration::from_secs(3)).await
            )),
            standard_webhook: None,
            follow_up_webhook: None,
            timeout: Duration::from_millis(300),
        })
        .expect("client");
        let orchestrator = Builder {
            automation: Arc::new(automation),
            ..Builder::healthy(SyntheticScenario::HighRisk)
        }
        .build();

        let result = run(&orchestrator, jpeg()).await;
        assert!(result.success);
        assert!(result.is_degraded());
        assert_eq!(result.steps.len(), 5);
        let automation_step = result.step(WorkflowStep::Automation).expect("step 5");
        assert!(!automation_step.success);
        let error = automation_step.error.as_deref().expect("step error");
        assert!(error.starts_with("Workflow Automation failed"));
        assert!(error.contains("timed out"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn foreign_subject_fails_conversion() {
        let mut records = crate::clients::converter::SyntheticConverter.convert(
            "Stage 2 pressure ulcer.",
            &PatientId::parse("someone-else").expect("id"),
        );
        records.message = "converted".into();
        let orchestrator = Builder {
            converter: Arc::new(StubConverter(Ok(records))),
            ..Builder::healthy(SyntheticScenario::LowRisk)
        }
        .build();

        let result = run(&orchestrator, jpeg()).await;
        assert!(!result.success);
        assert_eq!(result.steps.len(), 3);
        assert!(result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Patient/someone-else")));
    }

    #[tokio::test]
    async fn progress_is_reported_once_per_attempted_step() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: &ProgressCallback = &move |progress: &WorkflowProgress| {
            sink.lock().expect("lock").push(progress.clone());
        };

        let orchestrator = Builder::healthy(SyntheticScenario::HighRisk).build();
        orchestrator
            .execute_workflow(jpeg(), PATIENT, Some(callback))
            .await
            .expect("run");
        let numbers: Vec<usize> = seen
            .lock()
            .expect("lock")
            .iter()
            .map(|p| p.current_step)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        seen.lock().expect("lock").clear();
        orchestrator
            .execute_workflow(Vec::new(), PATIENT, Some(callback))
            .await
            .expect("run");
        let progress = seen.lock().expect("lock").clone();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].step_name, "Photo Processing");
        assert_eq!(progress[0].total_steps, 5);
    }

    #[tokio::test]
    async fn invalid_patient_id_is_an_error() {
        let orchestrator = Builder::healthy(SyntheticScenario::HighRisk).build();
        for patient_id in ["", "   ", "a/b"] {
            let err = orchestrator
                .execute_workflow(jpeg(), patient_id, None)
                .await
                .expect_err("invalid id");
            assert!(matches!(err, WorkflowError::InvalidPatientId(_)));
        }
    }

    #[tokio::test]
    async fn runs_get_distinct_ids_and_serialise() {
        let orchestrator = Builder::healthy(SyntheticScenario::LowRisk).build();
        let first = run(&orchestrator, jpeg()).await;
        let second = run(&orchestrator, jpeg()).await;
        assert_ne!(first.run_id, second.run_id);

        let json = serde_json::to_value(&first).expect("serialise");
        assert_eq!(json["steps"][0]["step"], "Photo Processing");
        assert_eq!(json["success"], true);
        let back: WorkflowResult = serde_json::from_value(json).expect("deserialise");
        assert_eq!(back, first);
    }

    #[test]
    fn lists_steps_and_status() {
        assert_eq!(
            WorkflowOrchestrator::steps(),
            vec![
                "Photo Processing",
                "AI Analysis",
                "FHIR-style Conversion",
                "EHR Storage",
                "Workflow Automation"
            ]
        );
        let orchestrator =
            WorkflowOrchestrator::from_config(&CoreConfig::default()).expect("orchestrator");
        let status = orchestrator.configuration_status();
        assert_eq!(status.analysis.mode, BackendMode::Synthetic);
        assert_eq!(status.record_store.mode, BackendMode::Synthetic);
        assert!(!status.all_live());
    }
}
