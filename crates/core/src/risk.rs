//! Risk classification of a wound assessment.
//!
//! Classification is a pure function of the infection risk percentage and the severity label;
//! it decides which care-automation workflow a run triggers.

use crate::clients::analysis::AnalysisResult;
use crate::clients::automation::AutomationKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskClassification {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Critical findings go to the critical-risk workflow; everything else to standard care.
    pub fn automation_kind(self) -> AutomationKind {
        match self {
            Self::Critical => AutomationKind::CriticalRisk,
            Self::High | Self::Medium | Self::Low => AutomationKind::StandardCare,
        }
    }
}

impl fmt::Display for RiskClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a wound; the first matching rule wins.
///
/// 1. critical if risk > 70, or the severity mentions stage 3 or stage 4
/// 2. high if risk > 50, or the severity mentions stage 2
/// 3. medium if risk > 25
/// 4. low otherwise
///
/// Severity matching is case-insensitive.
pub fn classify(infection_risk_percent: u8, severity: &str) -> RiskClassification {
    let severity = severity.to_lowercase();
    let mentions = |stage: &str| severity.contains(stage);

    if infection_risk_percent > 70 || mentions("stage 3") || mentions("stage 4") {
        RiskClassification::Critical
    } else if infection_risk_percent > 50 || mentions("stage 2") {
        RiskClassification::High
    } else if infection_risk_percent > 25 {
        RiskClassification::Medium
    } else {
        RiskClassification::Low
    }
}

/// Classify an assessment, treating a missing risk as 0% and a missing severity as blank.
pub fn classify_analysis(analysis: &AnalysisResult) -> RiskClassification {
    classify(
        analysis.infection_risk.map_or(0, |risk| risk.percent()),
        analysis.severity.as_deref().unwrap_or_default(),
    )
}
