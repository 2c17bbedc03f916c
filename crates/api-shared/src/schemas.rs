//! REST request and response bodies.
//!
//! Core domain types are embedded as plain JSON objects in the OpenAPI document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use woundsnap_core::clients::automation::{AutomationOutcome, EventDisposition};
use woundsnap_core::{ConfigurationStatus, WorkflowProgress, WorkflowResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RunWorkflowReq {
    pub patient_id: String,
    /// A `data:image/...;base64,` URL or bare base64.
    pub photo: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RunWorkflowRes {
    #[schema(value_type = Object)]
    pub result: WorkflowResult,
    /// One entry per attempted step, in order.
    #[schema(value_type = Vec<Object>)]
    pub progress: Vec<WorkflowProgress>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkflowStepsRes {
    pub steps: Vec<String>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct WorkflowStatusRes {
    #[schema(value_type = Object)]
    pub status: ConfigurationStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FollowUpReq {
    pub patient_id: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub context: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FollowUpRes {
    #[schema(value_type = Object)]
    pub outcome: AutomationOutcome,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct AutomationEventRes {
    #[schema(value_type = String)]
    pub disposition: EventDisposition,
}
