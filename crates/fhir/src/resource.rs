//! Resource kind tags and strict parsing of collaborator responses.

use crate::{Condition, FhirError, FhirResult, Media, Observation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The `resourceType` tag of the FHIR resources WoundSnap handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Observation,
    Condition,
    Media,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "Observation",
            Self::Condition => "Condition",
            Self::Media => "Media",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = FhirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Observation" => Ok(Self::Observation),
            "Condition" => Ok(Self::Condition),
            "Media" => Ok(Self::Media),
            other => Err(FhirError::InvalidInput(format!(
                "unsupported resourceType: {other}"
            ))),
        }
    }
}

/// Any resource WoundSnap can receive from a collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    Observation(Observation),
    Condition(Condition),
    Media(Media),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Observation(_) => ResourceKind::Observation,
            Self::Condition(_) => ResourceKind::Condition,
            Self::Media(_) => ResourceKind::Media,
        }
    }

    #[cfg(test)]
    fn parse(json: &str) -> FhirResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a resource from an already-decoded JSON value.
    ///
    /// This uses `serde_path_to_error` so that a schema mismatch names the failing field
    /// (for example `code.coding[0].system`).
    pub fn from_value(value: Value) -> FhirResult<Self> {
        let kind: ResourceKind = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| FhirError::Translation("missing resourceType".into()))?
            .parse()?;

        let resource = match kind {
            ResourceKind::Observation => Self::Observation(strict(value, kind)?),
            ResourceKind::Condition => Self::Condition(strict(value, kind)?),
            ResourceKind::Media => Self::Media(strict(value, kind)?),
        };
        Ok(resource)
    }
}

fn strict<T: DeserializeOwned>(value: Value, kind: ResourceKind) -> FhirResult<T> {
    match serde_path_to_error::deserialize::<_, T>(value) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(FhirError::Translation(format!(
                "{kind} schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Extract the server-assigned `id` from a create response body.
///
/// # Errors
///
/// Returns [`FhirError`] if the body is not JSON or has no non-empty string `id`.
pub fn parse_created_id(json: &str) -> FhirResult<String> {
    let value: Value = serde_json::from_str(json)?;
    match value.get("id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => Ok(id.to_owned()),
        _ => Err(FhirError::Translation(
            "create response has no resource id".into(),
        )),
    }
}
