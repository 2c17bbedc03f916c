//! Lifecycle of a single run.

use crate::workflow::model::WorkflowStep;
use serde::Serialize;
use std::fmt;

/// `Idle → PhotoValidated → Analyzed → Converted → Stored → Automated → Completed`, with
/// `Failed` reachable from any non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    PhotoValidated,
    Analyzed,
    Converted,
    Stored,
    Automated,
    Completed,
    Failed,
}

impl WorkflowState {
    /// The step that runs next from this state, if any.
    pub fn next_step(self) -> Option<WorkflowStep> {
        match self {
            Self::Idle => Some(WorkflowStep::PhotoProcessing),
            Self::PhotoValidated => Some(WorkflowStep::AiAnalysis),
            Self::Analyzed => Some(WorkflowStep::Conversion),
            Self::Converted => Some(WorkflowStep::EhrStorage),
            Self::Stored => Some(WorkflowStep::Automation),
            Self::Automated | Self::Completed | Self::Failed => None,
        }
    }

    /// The state reached once `step` has been attempted.
    ///
    /// The automation step always advances: its failure is advisory.
    pub fn after(self, step: WorkflowStep, success: bool) -> Self {
        if self.is_terminal() || self.next_step() != Some(step) {
            return Self::Failed;
        }
        match (step, success) {
            (WorkflowStep::Automation, _) => Self::Automated,
            (_, false) => Self::Failed,
            (WorkflowStep::PhotoProcessing, true) => Self::PhotoValidated,
            (WorkflowStep::AiAnalysis, true) => Self::Analyzed,
            (WorkflowStep::Conversion, true) => Self::Converted,
            (WorkflowStep::EhrStorage, true) => Self::Stored,
        }
    }

    pub fn complete(self) -> Self {
        match self {
            Self::Automated => Self::Completed,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::PhotoValidated => "photo_validated",
            Self::Analyzed => "analyzed",
            Self::Converted => "converted",
            Self::Stored => "stored",
            Self::Automated => "automated",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completed() {
        let mut state = WorkflowState::Idle;
        for step in WorkflowStep::ALL {
            assert_eq!(state.next_step(), Some(step));
            state = state.after(step, true);
        }
        assert_eq!(state, WorkflowState::Automated);
        assert_eq!(state.complete(), WorkflowState::Completed);
    }

    #[test]
    fn fatal_failures_end_in_failed() {
        let state = WorkflowState::Idle
            .after(WorkflowStep::PhotoProcessing, true)
            .after(WorkflowStep::AiAnalysis, false);
        assert_eq!(state, WorkflowState::Failed);
        assert!(state.is_terminal());
        assert_eq!(state.next_step(), None);
    }

    #[test]
    fn automation_failure_is_advisory() {
        assert_eq!(
            WorkflowState::Stored.after(WorkflowStep::Automation, false),
            WorkflowState::Automated
        );
    }

    #[test]
    fn out_of_order_steps_fail() {
        assert_eq!(
            WorkflowState::Idle.after(WorkflowStep::EhrStorage, true),
            WorkflowState::Failed
        );
        assert_eq!(
            WorkflowState::Completed.after(WorkflowStep::PhotoProcessing, true),
            WorkflowState::Failed
        );
    }
}
