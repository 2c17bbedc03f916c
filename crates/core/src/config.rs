//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into adapter construction.
//! Nothing in the core reads process-wide environment variables while a workflow run executes;
//! binaries call [`CoreConfig::from_env`] after loading `.env`, tests call
//! [`CoreConfig::from_lookup`] with a map.

use crate::clients::analysis::{ScenarioSource, SyntheticScenario};
use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PATIENT_CONTEXT};
use crate::error::{ConfigError, ConfigResult};
use fhir::ResourceKind;
use std::path::PathBuf;
use std::time::Duration;
use woundsnap_photo::{PhotoPolicy, DEFAULT_MAX_PHOTO_BYTES};

pub const ANALYSIS_ENDPOINT: &str = "ANALYSIS_ENDPOINT";
pub const ANALYSIS_ACCESS_TOKEN: &str = "ANALYSIS_ACCESS_TOKEN";
pub const ANALYSIS_FALLBACK_TO_SYNTHETIC: &str = "ANALYSIS_FALLBACK_TO_SYNTHETIC";
pub const SYNTHETIC_SCENARIO: &str = "SYNTHETIC_SCENARIO";
pub const SYNTHETIC_SEED: &str = "SYNTHETIC_SEED";
pub const CONVERTER_BASE_URL: &str = "CONVERTER_BASE_URL";
pub const CONVERTER_EMAIL: &str = "CONVERTER_EMAIL";
pub const CONVERTER_PASSWORD: &str = "CONVERTER_PASSWORD";
pub const RECORD_STORE_URL: &str = "RECORD_STORE_URL";
pub const RECORD_STORE_TOKEN: &str = "RECORD_STORE_TOKEN";
pub const RECORD_STORE_DIR: &str = "RECORD_STORE_DIR";
pub const AUTOMATION_CRITICAL_WEBHOOK_URL: &str = "AUTOMATION_CRITICAL_WEBHOOK_URL";
pub const AUTOMATION_STANDARD_WEBHOOK_URL: &str = "AUTOMATION_STANDARD_WEBHOOK_URL";
pub const AUTOMATION_FOLLOWUP_WEBHOOK_URL: &str = "AUTOMATION_FOLLOWUP_WEBHOOK_URL";
pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const MAX_PHOTO_BYTES: &str = "MAX_PHOTO_BYTES";
pub const PATIENT_CONTEXT: &str = "PATIENT_CONTEXT";

/// Core configuration resolved at startup.
///
/// `Default` yields an all-synthetic configuration.
#[derive(Clone, Debug, Default)]
pub struct CoreConfig {
    pub analysis: AnalysisConfig,
    pub converter: ConverterConfig,
    pub record_store: RecordStoreConfig,
    pub automation: AutomationConfig,
    pub workflow: WorkflowSettings,
}

/// Image-analysis backend settings.
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub fallback_to_synthetic: bool,
    pub scenario: ScenarioSource,
    pub timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token: None,
            fallback_to_synthetic: true,
            scenario: ScenarioSource::Entropy,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Login credentials for the clinical-text converter.
#[derive(Clone, PartialEq, Eq)]
pub struct ConverterCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for ConverterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Clinical-text converter backend settings.
#[derive(Clone, Debug)]
pub struct ConverterConfig {
    pub base_url: Option<String>,
    pub credentials: Option<ConverterCredentials>,
    pub timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credentials: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Record store backend settings.
///
/// A live store needs both `base_url` and `access_token`; otherwise `data_dir` selects the
/// local on-disk store, and with neither the synthetic store is used.
#[derive(Clone, Debug)]
pub struct RecordStoreConfig {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            data_dir: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Care-automation webhook settings. With no webhook set, automation is synthetic.
#[derive(Clone, Debug)]
pub struct AutomationConfig {
    pub critical_webhook: Option<String>,
    pub standard_webhook: Option<String>,
    pub follow_up_webhook: Option<String>,
    pub timeout: Duration,
}

impl AutomationConfig {
    pub fn configured_webhooks(&self) -> usize {
        [
            &self.critical_webhook,
            &self.standard_webhook,
            &self.follow_up_webhook,
        ]
        .iter()
        .filter(|url| url.is_some())
        .count()
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            critical_webhook: None,
            standard_webhook: None,
            follow_up_webhook: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Settings the orchestrator applies to every run.
#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub photo_policy: PhotoPolicy,
    pub patient_context: String,
    pub resource_kinds: Vec<ResourceKind>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            photo_policy: PhotoPolicy::default(),
            patient_context: DEFAULT_PATIENT_CONTEXT.to_owned(),
            resource_kinds: vec![ResourceKind::Observation, ResourceKind::Condition],
        }
    }
}

impl CoreConfig {
    /// Resolve configuration from the process environment.
    ///
    /// Call this once at startup, after `dotenvy::dotenv()`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric, boolean or scenario value does
    /// not parse.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let timeout = Duration::from_secs(
            parse_positive_u64(HTTP_TIMEOUT_SECS, get(HTTP_TIMEOUT_SECS))?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let scenario = scenario_source_from_values(get(SYNTHETIC_SCENARIO), get(SYNTHETIC_SEED))?;

        let analysis = AnalysisConfig {
            endpoint: get(ANALYSIS_ENDPOINT),
            access_token: get(ANALYSIS_ACCESS_TOKEN),
            fallback_to_synthetic: parse_bool(
                ANALYSIS_FALLBACK_TO_SYNTHETIC,
                get(ANALYSIS_FALLBACK_TO_SYNTHETIC),
            )?
            .unwrap_or(true),
            scenario,
            timeout,
        };

        let credentials = match (get(CONVERTER_EMAIL), get(CONVERTER_PASSWORD)) {
            (Some(email), Some(password)) => Some(ConverterCredentials { email, password }),
            _ => None,
        };
        let converter = ConverterConfig {
            base_url: get(CONVERTER_BASE_URL),
            credentials,
            timeout,
        };

        let record_store = RecordStoreConfig {
            base_url: get(RECORD_STORE_URL),
            access_token: get(RECORD_STORE_TOKEN),
            data_dir: get(RECORD_STORE_DIR).map(PathBuf::from),
            timeout,
        };

        let automation = AutomationConfig {
            critical_webhook: get(AUTOMATION_CRITICAL_WEBHOOK_URL),
            standard_webhook: get(AUTOMATION_STANDARD_WEBHOOK_URL),
            follow_up_webhook: get(AUTOMATION_FOLLOWUP_WEBHOOK_URL),
            timeout,
        };

        let max_bytes = parse_positive_u64(MAX_PHOTO_BYTES, get(MAX_PHOTO_BYTES))?
            .unwrap_or(DEFAULT_MAX_PHOTO_BYTES);

        let workflow = WorkflowSettings {
            photo_policy: PhotoPolicy { max_bytes },
            patient_context: get(PATIENT_CONTEXT)
                .unwrap_or_else(|| DEFAULT_PATIENT_CONTEXT.to_owned()),
            ..WorkflowSettings::default()
        };

        Ok(Self {
            analysis,
            converter,
            record_store,
            automation,
            workflow,
        })
    }
}

/// Parse the synthetic scenario source from optional scenario and seed values.
///
/// A fixed scenario ignores the seed; `random` (the default) uses the seed when present.
pub fn scenario_source_from_values(
    scenario: Option<String>,
    seed: Option<String>,
) -> ConfigResult<ScenarioSource> {
    let seed = parse_u64(SYNTHETIC_SEED, seed)?;
    match scenario.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("random") => Ok(seed.map_or(ScenarioSource::Entropy, ScenarioSource::Seeded)),
        Some("high-risk") => Ok(ScenarioSource::Fixed(SyntheticScenario::HighRisk)),
        Some("low-risk") => Ok(ScenarioSource::Fixed(SyntheticScenario::LowRisk)),
        Some(other) => Err(ConfigError::InvalidValue {
            key: SYNTHETIC_SCENARIO,
            reason: format!("expected random, high-risk or low-risk, got {other:?}"),
        }),
    }
}

fn parse_u64(key: &'static str, value: Option<String>) -> ConfigResult<Option<u64>> {
    value
        .map(|v| {
            v.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_positive_u64(key: &'static str, value: Option<String>) -> ConfigResult<Option<u64>> {
    match parse_u64(key, value)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key,
            reason: "must be greater than zero".into(),
        }),
        other => Ok(other),
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> ConfigResult<Option<bool>> {
    value
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key,
                reason: format!("expected a boolean, got {other:?}"),
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_gives_synthetic_defaults() {
        let config = CoreConfig::from_lookup(|_| None).expect("defaults");
        assert!(config.analysis.access_token.is_none());
        assert!(config.analysis.fallback_to_synthetic);
        assert_eq!(config.analysis.scenario, ScenarioSource::Entropy);
        assert!(config.converter.credentials.is_none());
        assert!(config.record_store.data_dir.is_none());
        assert_eq!(config.automation.configured_webhooks(), 0);
        assert_eq!(config.workflow.photo_policy.max_bytes, DEFAULT_MAX_PHOTO_BYTES);
        assert_eq!(config.workflow.patient_context, DEFAULT_PATIENT_CONTEXT);
        assert_eq!(
            config.analysis.timeout,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
    }

    #[test]
    fn blank_values_are_treated_as_absent() {
        let config =
            CoreConfig::from_lookup(lookup(&[(ANALYSIS_ACCESS_TOKEN, "   ")])).expect("config");
        assert!(config.analysis.access_token.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            (HTTP_TIMEOUT_SECS, "5"),
            (MAX_PHOTO_BYTES, "1024"),
            (ANALYSIS_FALLBACK_TO_SYNTHETIC, "false"),
            (SYNTHETIC_SCENARIO, "high-risk"),
            (CONVERTER_EMAIL, "nurse@example.org"),
            (CONVERTER_PASSWORD, "secret"),
            (AUTOMATION_STANDARD_WEBHOOK_URL, "http://hooks.local/standard"),
        ]))
        .expect("config");

        assert_eq!(config.converter.timeout, Duration::from_secs(5));
        assert_eq!(config.workflow.photo_policy.max_bytes, 1024);
        assert!(!config.analysis.fallback_to_synthetic);
        assert_eq!(
            config.analysis.scenario,
            ScenarioSource::Fixed(SyntheticScenario::HighRisk)
        );
        assert_eq!(
            config.converter.credentials.as_ref().map(|c| c.email.as_str()),
            Some("nurse@example.org")
        );
        assert_eq!(config.automation.configured_webhooks(), 1);
    }

    #[test]
    fn converter_credentials_need_both_halves() {
        let config =
            CoreConfig::from_lookup(lookup(&[(CONVERTER_EMAIL, "nurse@example.org")]))
                .expect("config");
        assert!(config.converter.credentials.is_none());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = ConverterCredentials {
            email: "a@b.c".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn seeded_random_scenario() {
        let source = scenario_source_from_values(None, Some("42".into())).expect("source");
        assert_eq!(source, ScenarioSource::Seeded(42));
        let source =
            scenario_source_from_values(Some("RANDOM".into()), None).expect("source");
        assert_eq!(source, ScenarioSource::Entropy);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_SECS, "soon")])),
            Err(ConfigError::InvalidValue { key: HTTP_TIMEOUT_SECS, .. })
        ));
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(SYNTHETIC_SCENARIO, "medium")])),
            Err(ConfigError::InvalidValue { key: SYNTHETIC_SCENARIO, .. })
        ));
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(ANALYSIS_FALLBACK_TO_SYNTHETIC, "maybe")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(MAX_PHOTO_BYTES, "0")])),
            Err(ConfigError::InvalidValue { key: MAX_PHOTO_BYTES, .. })
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_SECS, "0")])),
            Err(ConfigError::InvalidValue { key: HTTP_TIMEOUT_SECS, .. })
        ));
        let config = CoreConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_SECS, "1")])).expect("config");
        assert_eq!(config.automation.timeout, Duration::from_secs(1));
    }
}
