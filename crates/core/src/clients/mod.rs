//! Adapters for the four external collaborators.
//!
//! Each collaborator is an object-safe `async_trait` so the orchestrator can hold it as
//! `Arc<dyn Trait>` and tests can inject doubles. The concrete adapters choose a live or
//! synthetic backend once, at construction, from [`CoreConfig`](crate::CoreConfig).

pub mod analysis;
pub mod automation;
pub mod converter;
pub mod record_store;

use crate::constants::USER_AGENT;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Which backend an adapter was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Live,
    Synthetic,
    Local,
}

impl BackendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Synthetic => "synthetic",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection for one collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollaboratorStatus {
    pub live: bool,
    pub mode: BackendMode,
    pub detail: String,
}

impl CollaboratorStatus {
    pub fn new(mode: BackendMode, detail: impl Into<String>) -> Self {
        Self {
            live: mode == BackendMode::Live,
            mode,
            detail: detail.into(),
        }
    }
}

/// Backend selection for every collaborator, as reported by the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigurationStatus {
    pub analysis: CollaboratorStatus,
    pub converter: CollaboratorStatus,
    pub record_store: CollaboratorStatus,
    pub automation: CollaboratorStatus,
}

impl ConfigurationStatus {
    pub fn all_live(&self) -> bool {
        [
            &self.analysis,
            &self.converter,
            &self.record_store,
            &self.automation,
        ]
        .iter()
        .all(|status| status.live)
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// A short description of a transport failure, without echoing URLs or credentials.
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".into()
    } else if err.is_connect() {
        "connection failed".into()
    } else if err.is_decode() {
        "response body could not be decoded".into()
    } else {
        "request failed".into()
    }
}

/// Join a base URL and a path with exactly one `/` between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls() {
        assert_eq!(
            join_url("http://x/api/", "/fhir/Media"),
            "http://x/api/fhir/Media"
        );
        assert_eq!(join_url("http://x", "auth/token"), "http://x/auth/token");
    }

    #[test]
    fn status_serialises_mode_names() {
        let status = CollaboratorStatus::new(BackendMode::Local, "records under /tmp");
        let json = serde_json::to_value(&status).expect("serialise");
        assert_eq!(json["mode"], "local");
        assert_eq!(json["live"], false);
    }
}
