use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use api_shared::auth::API_KEY_ENV;
use woundsnap_core::{CoreConfig, WorkflowOrchestrator};

/// Environment variable for the REST bind address.
const REST_ADDR_ENV: &str = "WOUNDSNAP_REST_ADDR";
const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Main entry point for the WoundSnap server
///
/// Resolves configuration once, builds the workflow orchestrator and serves the REST API.
///
/// # Environment Variables
/// - `WOUNDSNAP_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `API_KEY`: when set, required as `x-api-key` on `POST` routes
/// - collaborator settings read by `CoreConfig::from_env`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("woundsnap_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var(REST_ADDR_ENV).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let api_key = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty());
    if api_key.is_none() {
        tracing::warn!("{} not set; POST routes are open", API_KEY_ENV);
    }

    let orchestrator = WorkflowOrchestrator::from_config(&CoreConfig::from_env()?)?;
    let app = router(AppState::new(orchestrator, api_key));

    tracing::info!("++ Starting WoundSnap REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
