//! # API REST
//!
//! REST API implementation for WoundSnap.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, API keys)
//!
//! Uses `api-shared` for request and response schemas.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::auth::API_KEY_HEADER;
use api_shared::{
    validate_api_key, AutomationEventRes, FollowUpReq, FollowUpRes, HealthRes, HealthService,
    RunWorkflowReq, RunWorkflowRes, WorkflowStatusRes, WorkflowStepsRes,
};
use woundsnap_core::clients::automation::{record_event, AutomationEvent};
use woundsnap_core::{PatientId, ProgressCallback, WorkflowOrchestrator, WorkflowProgress};
use woundsnap_photo::decode_upload;

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: WorkflowOrchestrator,
    /// When set, `POST` routes require a matching `x-api-key` header.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(orchestrator: WorkflowOrchestrator, api_key: Option<String>) -> Self {
        Self {
            orchestrator,
            api_key: api_key.map(Arc::from),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        workflow_steps,
        workflow_status,
        run_workflow,
        follow_up,
        automation_event,
    ),
    components(schemas(
        HealthRes,
        WorkflowStepsRes,
        WorkflowStatusRes,
        RunWorkflowReq,
        RunWorkflowRes,
        FollowUpReq,
        FollowUpRes,
        AutomationEventRes,
    ))
)]
pub struct ApiDoc;

/// Room for the JSON envelope, data-URL prefix and patient id around the encoded photo.
const BODY_ENVELOPE_BYTES: u64 = 64 * 1024;

/// Largest request body that can carry a photo of `max_photo_bytes` as base64.
fn request_body_limit(max_photo_bytes: u64) -> usize {
    let encoded = max_photo_bytes.div_ceil(3).saturating_mul(4);
    usize::try_from(encoded.saturating_add(BODY_ENVELOPE_BYTES)).unwrap_or(usize::MAX)
}

/// Build the REST router with Swagger UI and permissive CORS.
///
/// The request body limit follows the orchestrator's photo size ceiling, so any photo the
/// workflow would accept also fits through `POST /workflow/runs`.
pub fn router(state: AppState) -> Router {
    let body_limit = request_body_limit(state.orchestrator.settings().photo_policy.max_bytes);
    Router::new()
        .route("/health", get(health))
        .route("/workflow/steps", get(workflow_steps))
        .route("/workflow/status", get(workflow_status))
        .route("/workflow/runs", post(run_workflow))
        .route("/automation/follow-up", post(follow_up))
        .route("/automation/events", post(automation_event))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn authorise(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, &'static str)> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    validate_api_key(provided, state.api_key.as_deref()).map_err(|e| {
        tracing::warn!("Rejected request: {}", e);
        (StatusCode::UNAUTHORIZED, "Invalid or missing API key")
    })
}

fn parse_patient_id(input: &str) -> Result<PatientId, (StatusCode, &'static str)> {
    PatientId::parse(input).map_err(|e| {
        tracing::warn!("Invalid patient id: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid patient id")
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/workflow/steps",
    responses(
        (status = 200, description = "Workflow step names in execution order", body = WorkflowStepsRes)
    )
)]
#[axum::debug_handler]
async fn workflow_steps(State(_state): State<AppState>) -> Json<WorkflowStepsRes> {
    Json(WorkflowStepsRes {
        steps: WorkflowOrchestrator::steps()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    })
}

#[utoipa::path(
    get,
    path = "/workflow/status",
    responses(
        (status = 200, description = "Backend mode of each collaborator", body = WorkflowStatusRes)
    )
)]
#[axum::debug_handler]
async fn workflow_status(State(state): State<AppState>) -> Json<WorkflowStatusRes> {
    Json(WorkflowStatusRes {
        status: state.orchestrator.configuration_status(),
    })
}

#[utoipa::path(
    post,
    path = "/workflow/runs",
    request_body = RunWorkflowReq,
    responses(
        (status = 200, description = "Workflow ran; inspect `result.success`", body = RunWorkflowRes),
        (status = 400, description = "Undecodable photo or invalid patient id"),
        (status = 401, description = "Invalid or missing API key")
    )
)]
/// Run the wound documentation workflow on an uploaded photo
///
/// A workflow that stops at a failed step is still reported with `200 OK`; the step list and
/// `result.error` say where it stopped.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the photo is not a data URL or base64, or
/// - the patient id is blank or malformed.
#[axum::debug_handler]
async fn run_workflow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunWorkflowReq>,
) -> Result<Json<RunWorkflowRes>, (StatusCode, &'static str)> {
    authorise(&state, &headers)?;

    let photo = decode_upload(&req.photo).map_err(|e| {
        tracing::warn!("Undecodable photo upload: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid photo")
    })?;
    let patient_id = parse_patient_id(&req.patient_id)?;

    let progress = Arc::new(Mutex::new(Vec::new()));
    let outcome = {
        let sink = Arc::clone(&progress);
        let on_progress: &ProgressCallback = &move |update: &WorkflowProgress| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(update.clone());
            }
        };
        state
            .orchestrator
            .execute_workflow(photo, patient_id.as_str(), Some(on_progress))
            .await
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Workflow rejected: {:?}", e);
            return Err((StatusCode::BAD_REQUEST, "Invalid patient id"));
        }
    };
    let progress = std::mem::take(
        &mut *progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()),
    );

    Ok(Json(RunWorkflowRes { result, progress }))
}

#[utoipa::path(
    post,
    path = "/automation/follow-up",
    request_body = FollowUpReq,
    responses(
        (status = 200, description = "Follow-up reminder outcome", body = FollowUpRes),
        (status = 400, description = "Invalid patient id"),
        (status = 401, description = "Invalid or missing API key")
    )
)]
#[axum::debug_handler]
async fn follow_up(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FollowUpReq>,
) -> Result<Json<FollowUpRes>, (StatusCode, &'static str)> {
    authorise(&state, &headers)?;
    let patient_id = parse_patient_id(&req.patient_id)?;

    let context = req
        .context
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    let outcome = state
        .orchestrator
        .automation()
        .trigger_follow_up(&patient_id, context)
        .await;
    Ok(Json(FollowUpRes { outcome }))
}

#[utoipa::path(
    post,
    path = "/automation/events",
    responses(
        (status = 200, description = "Event recorded or ignored", body = AutomationEventRes),
        (status = 401, description = "Invalid or missing API key")
    )
)]
/// Record a callback from the automation platform
///
/// Body: `{"event_type": "workflow.completed" | "workflow.failed" | "notification.delivered", ...}`.
/// Unknown event types are acknowledged and ignored.
#[axum::debug_handler]
async fn automation_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<AutomationEvent>,
) -> Result<Json<AutomationEventRes>, (StatusCode, &'static str)> {
    authorise(&state, &headers)?;
    Ok(Json(AutomationEventRes {
        disposition: record_event(&event),
    }))
}
