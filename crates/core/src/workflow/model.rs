//! Data recorded for, and returned from, a workflow run.

use crate::clients::analysis::AnalysisResult;
use crate::clients::automation::{AutomationKind, AutomationOutcome};
use crate::clients::record_store::StorageReceipt;
use crate::constants::TOTAL_STEPS;
use crate::risk::RiskClassification;
use fhir::StructuredRecordSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use woundsnap_types::InfectionRisk;

/// The fixed steps of a run, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    PhotoProcessing,
    AiAnalysis,
    Conversion,
    EhrStorage,
    Automation,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; TOTAL_STEPS] = [
        Self::PhotoProcessing,
        Self::AiAnalysis,
        Self::Conversion,
        Self::EhrStorage,
        Self::Automation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PhotoProcessing => "Photo Processing",
            Self::AiAnalysis => "AI Analysis",
            Self::Conversion => "FHIR-style Conversion",
            Self::EhrStorage => "EHR Storage",
            Self::Automation => "Workflow Automation",
        }
    }

    /// 1-based position in the run.
    pub fn number(self) -> usize {
        match self {
            Self::PhotoProcessing => 1,
            Self::AiAnalysis => 2,
            Self::Conversion => 3,
            Self::EhrStorage => 4,
            Self::Automation => 5,
        }
    }

    pub fn progress_message(self) -> &'static str {
        match self {
            Self::PhotoProcessing => "Validating and preparing image...",
            Self::AiAnalysis => "Analyzing wound with medical AI...",
            Self::Conversion => "Converting to FHIR format...",
            Self::EhrStorage => "Storing in medical records...",
            Self::Automation => "Triggering care team workflow...",
        }
    }

    /// Whether a failure of this step ends the run.
    pub fn is_fatal(self) -> bool {
        self != Self::Automation
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkflowStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| format!("unknown workflow step: {s}"))
    }
}

impl Serialize for WorkflowStep {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for WorkflowStep {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One attempted step. Appended in execution order and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepResult {
    pub step: WorkflowStep,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Emitted before each step starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub current_step: usize,
    pub total_steps: usize,
    pub step_name: String,
    pub message: String,
}

impl WorkflowProgress {
    pub fn for_step(step: WorkflowStep) -> Self {
        Self {
            current_step: step.number(),
            total_steps: TOTAL_STEPS,
            step_name: step.name().to_owned(),
            message: step.progress_message().to_owned(),
        }
    }
}

/// The risk routing decision and what the automation platform reported back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationSummary {
    pub workflow_kind: AutomationKind,
    pub risk_level: RiskClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_risk: Option<InfectionRisk>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub outcome: AutomationOutcome,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalData {
    pub analysis: AnalysisResult,
    pub records: StructuredRecordSet,
    pub storage: StorageReceipt,
    pub workflow_results: AutomationSummary,
}

/// Everything a run produced. Built fresh for every call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub success: bool,
    pub steps: Vec<WorkflowStepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_data: Option<FinalData>,
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    /// A successful run in which an advisory step failed.
    pub fn is_degraded(&self) -> bool {
        self.success && self.steps.iter().any(|step| !step.success)
    }

    pub fn step(&self, step: WorkflowStep) -> Option<&WorkflowStepResult> {
        self.steps.iter().find(|result| result.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_and_numbers() {
        let names: Vec<&str> = WorkflowStep::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "Photo Processing",
                "AI Analysis",
                "FHIR-style Conversion",
                "EHR Storage",
                "Workflow Automation"
            ]
        );
        for (index, step) in WorkflowStep::ALL.iter().enumerate() {
            assert_eq!(step.number(), index + 1);
        }
        assert!(!WorkflowStep::Automation.is_fatal());
        assert!(WorkflowStep::EhrStorage.is_fatal());
    }

    #[test]
    fn steps_serialise_by_name() {
        let result = WorkflowStepResult {
            step: WorkflowStep::Conversion,
            success: false,
            data: None,
            error: Some("boom".into()),
            duration_ms: 3,
        };
        let json = serde_json::to_value(&result).expect("serialise");
        assert_eq!(json["step"], "FHIR-style Conversion");
        assert!(json.get("data").is_none());

        let back: WorkflowStepResult = serde_json::from_value(json).expect("deserialise");
        assert_eq!(back, result);
        assert!("Teleportation".parse::<WorkflowStep>().is_err());
    }

    #[test]
    fn progress_for_step() {
        let progress = WorkflowProgress::for_step(WorkflowStep::EhrStorage);
        assert_eq!(progress.current_step, 4);
        assert_eq!(progress.total_steps, 5);
        assert_eq!(progress.step_name, "EHR Storage");
    }
}
