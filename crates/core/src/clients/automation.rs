//! Care-automation collaborator: fires a named care workflow through a webhook.
//!
//! Triggering never returns an error. A missing webhook, a transport failure or an error status
//! produces an outcome with [`AutomationStatus::Failed`], zero actions and a detail message.
//! With no webhooks configured at all, the synthetic backend reports the nominal actions for
//! the workflow kind as completed.

use crate::clients::analysis::{AnalysisResult, WoundMeasurements};
use crate::clients::{describe_transport_error, http_client, BackendMode, CollaboratorStatus};
use crate::config::AutomationConfig;
use crate::error::ConfigResult;
use crate::risk::RiskClassification;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use woundsnap_types::{InfectionRisk, PatientId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationKind {
    CriticalRisk,
    StandardCare,
    FollowUpReminder,
}

impl AutomationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CriticalRisk => "critical-risk",
            Self::StandardCare => "standard-care",
            Self::FollowUpReminder => "follow-up-reminder",
        }
    }
}

impl fmt::Display for AutomationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationStatus {
    Triggered,
    Completed,
    Failed,
}

/// Care-team actions a workflow performed (or is expected to perform).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationActions {
    pub sms_notifications: u32,
    pub email_notifications: u32,
    pub appointments_scheduled: u32,
    pub tasks_created: u32,
}

impl AutomationActions {
    /// The actions each workflow kind is set up to perform.
    pub fn expected(kind: AutomationKind) -> Self {
        let (sms, email, appointments, tasks) = match kind {
            AutomationKind::CriticalRisk => (2, 1, 1, 1),
            AutomationKind::StandardCare => (1, 1, 1, 0),
            AutomationKind::FollowUpReminder => (1, 0, 0, 0),
        };
        Self {
            sms_notifications: sms,
            email_notifications: email,
            appointments_scheduled: appointments,
            tasks_created: tasks,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationOutcome {
    pub workflow_id: String,
    pub workflow_kind: AutomationKind,
    pub status: AutomationStatus,
    pub actions: AutomationActions,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AutomationOutcome {
    pub fn is_success(&self) -> bool {
        self.status != AutomationStatus::Failed
    }

    fn failed(kind: AutomationKind, detail: String) -> Self {
        let timestamp = Utc::now();
        Self {
            workflow_id: format!("failed_{kind}_{}", timestamp.timestamp_millis()),
            workflow_kind: kind,
            status: AutomationStatus::Failed,
            actions: AutomationActions::default(),
            timestamp,
            detail: Some(detail),
        }
    }
}

/// Wound findings sent with a critical-risk or standard-care trigger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WoundFindings {
    pub risk_level: RiskClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_risk: Option<InfectionRisk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healing_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<WoundMeasurements>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
}

impl WoundFindings {
    pub fn from_analysis(
        analysis: &AnalysisResult,
        risk_level: RiskClassification,
        image_reference: Option<String>,
    ) -> Self {
        Self {
            risk_level,
            infection_risk: analysis.infection_risk,
            healing_stage: analysis.healing_stage.clone(),
            measurements: analysis.measurements.clone(),
            risk_factors: analysis.risk_factors.clone(),
            recommendations: analysis.recommendations.clone(),
            image_reference,
        }
    }
}

/// What a trigger carries besides the patient.
#[derive(Clone, Debug, PartialEq)]
pub enum AutomationPayload {
    Wound(WoundFindings),
    PatientContext(Value),
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    patient_id: &'a str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wound_data: Option<&'a WoundFindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patient_context: Option<&'a Value>,
}

impl<'a> WebhookBody<'a> {
    fn new(patient_id: &'a PatientId, payload: &'a AutomationPayload) -> Self {
        let (wound_data, patient_context) = match payload {
            AutomationPayload::Wound(findings) => (Some(findings), None),
            AutomationPayload::PatientContext(context) => (None, Some(context)),
        };
        Self {
            patient_id: patient_id.as_str(),
            timestamp: Utc::now(),
            wound_data,
            patient_context,
        }
    }
}

#[async_trait]
pub trait CareAutomation: Send + Sync {
    /// Fire the `kind` workflow for `patient_id`. Never fails; see [`AutomationOutcome::status`].
    async fn trigger(
        &self,
        kind: AutomationKind,
        patient_id: &PatientId,
        payload: &AutomationPayload,
    ) -> AutomationOutcome;

    /// Fire the follow-up-reminder workflow outside an orchestrated run.
    async fn trigger_follow_up(&self, patient_id: &PatientId, context: Value) -> AutomationOutcome {
        self.trigger(
            AutomationKind::FollowUpReminder,
            patient_id,
            &AutomationPayload::PatientContext(context),
        )
        .await
    }

    fn status(&self) -> CollaboratorStatus;
}

// ============================================================================
// Backends
// ============================================================================

#[derive(Clone, Debug)]
pub struct WebhookAutomation {
    client: reqwest::Client,
    critical: Option<String>,
    standard: Option<String>,
    follow_up: Option<String>,
}

impl WebhookAutomation {
    pub fn new(config: &AutomationConfig) -> ConfigResult<Self> {
        Ok(Self {
            client: http_client(config.timeout)?,
            critical: config.critical_webhook.clone(),
            standard: config.standard_webhook.clone(),
            follow_up: config.follow_up_webhook.clone(),
        })
    }

    fn url(&self, kind: AutomationKind) -> Option<&str> {
        match kind {
            AutomationKind::CriticalRisk => self.critical.as_deref(),
            AutomationKind::StandardCare => self.standard.as_deref(),
            AutomationKind::FollowUpReminder => self.follow_up.as_deref(),
        }
    }

    fn configured(&self) -> usize {
        [&self.critical, &self.standard, &self.follow_up]
            .iter()
            .filter(|url| url.is_some())
            .count()
    }

    async fn trigger(
        &self,
        kind: AutomationKind,
        patient_id: &PatientId,
        payload: &AutomationPayload,
    ) -> AutomationOutcome {
        let Some(url) = self.url(kind) else {
            return AutomationOutcome::failed(kind, format!("no webhook configured for {kind}"));
        };

        let sent = self
            .client
            .post(url)
            .json(&WebhookBody::new(patient_id, payload))
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => {
                let timestamp = Utc::now();
                AutomationOutcome {
                    workflow_id: format!("webhook_{kind}_{}", timestamp.timestamp_millis()),
                    workflow_kind: kind,
                    status: AutomationStatus::Triggered,
                    actions: AutomationActions::expected(kind),
                    timestamp,
                    detail: None,
                }
            }
            Ok(response) => AutomationOutcome::failed(
                kind,
                format!("webhook returned {}", response.status()),
            ),
            Err(err) => AutomationOutcome::failed(kind, describe_transport_error(&err)),
        }
    }
}

fn synthetic_outcome(kind: AutomationKind) -> AutomationOutcome {
    let timestamp = Utc::now();
    AutomationOutcome {
        workflow_id: format!("synthetic_{kind}_{}", timestamp.timestamp_millis()),
        workflow_kind: kind,
        status: AutomationStatus::Completed,
        actions: AutomationActions::expected(kind),
        timestamp,
        detail: None,
    }
}

#[derive(Clone, Debug)]
enum Backend {
    Webhook(WebhookAutomation),
    Synthetic,
}

/// The configured care-automation trigger.
#[derive(Clone, Debug)]
pub struct AutomationClient {
    backend: Backend,
}

impl AutomationClient {
    /// Webhooks when at least one URL is configured, otherwise synthetic.
    pub fn from_config(config: &AutomationConfig) -> ConfigResult<Self> {
        let backend = if config.configured_webhooks() > 0 {
            Backend::Webhook(WebhookAutomation::new(config)?)
        } else {
            Backend::Synthetic
        };
        Ok(Self { backend })
    }

    pub fn synthetic() -> Self {
        Self {
            backend: Backend::Synthetic,
        }
    }
}

#[async_trait]
impl CareAutomation for AutomationClient {
    async fn trigger(
        &self,
        kind: AutomationKind,
        patient_id: &PatientId,
        payload: &AutomationPayload,
    ) -> AutomationOutcome {
        let outcome = match &self.backend {
            Backend::Synthetic => synthetic_outcome(kind),
            Backend::Webhook(webhooks) => webhooks.trigger(kind, patient_id, payload).await,
        };
        if outcome.is_success() {
            tracing::info!(%kind, workflow_id = %outcome.workflow_id, "care automation triggered");
        } else {
            tracing::warn!(
                %kind,
                detail = outcome.detail.as_deref().unwrap_or_default(),
                "care automation failed"
            );
        }
        outcome
    }

    fn status(&self) -> CollaboratorStatus {
        match &self.backend {
            Backend::Webhook(webhooks) => CollaboratorStatus::new(
                BackendMode::Live,
                format!("{}/3 workflow webhooks configured", webhooks.configured()),
            ),
            Backend::Synthetic => {
                CollaboratorStatus::new(BackendMode::Synthetic, "no workflow webhooks configured")
            }
        }
    }
}

// ============================================================================
// Inbound events
// ============================================================================

/// A callback from the automation platform.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event_type")]
pub enum AutomationEvent {
    #[serde(rename = "workflow.completed")]
    WorkflowCompleted {
        workflow_id: String,
        #[serde(default)]
        actions: Option<Value>,
    },
    #[serde(rename = "workflow.failed")]
    WorkflowFailed {
        workflow_id: String,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename = "notification.delivered")]
    NotificationDelivered {
        notification_type: String,
        recipient: String,
    },
    #[serde(other)]
    Other,
}

/// Whether an inbound event was acted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventDisposition {
    Recorded,
    Ignored,
}

/// Log an inbound automation event.
pub fn record_event(event: &AutomationEvent) -> EventDisposition {
    match event {
        AutomationEvent::WorkflowCompleted {
            workflow_id,
            actions,
        } => {
            tracing::info!(%workflow_id, actions = ?actions, "automation workflow completed");
            EventDisposition::Recorded
        }
        AutomationEvent::WorkflowFailed { workflow_id, error } => {
            tracing::error!(
                %workflow_id,
                error = error.as_deref().unwrap_or("unknown"),
                "automation workflow failed"
            );
            EventDisposition::Recorded
        }
        AutomationEvent::NotificationDelivered {
            notification_type,
            recipient,
        } => {
            tracing::info!(%notification_type, %recipient, "automation notification delivered");
            EventDisposition::Recorded
        }
        AutomationEvent::Other => {
            tracing::debug!("ignoring unhandled automation event");
            EventDisposition::Ignored
        }
    }
}
