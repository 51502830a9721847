//! Run lifecycle: one attempt to execute one analysis on one envelope.
//!
//! Transitions are monotonic - `Pending → Running → Done | Failed` - and
//! copy-on-write: every transition produces a new `Run` value, illegal
//! transitions are rejected. Terminal states are permanent.

use crate::{EngineError, EngineResult};
use mvnet_input::contracts::SolverAnalysisType;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One execution attempt, addressable by id and input hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub study_case_id: String,
    pub analysis_type: SolverAnalysisType,
    /// SHA-256 of the frozen solver-input envelope.
    pub solver_input_hash: String,
    pub status: RunStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error code from §ERROR tables, set when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl Run {
    pub fn new(
        id: impl Into<String>,
        study_case_id: impl Into<String>,
        analysis_type: SolverAnalysisType,
        solver_input_hash: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            study_case_id: study_case_id.into(),
            analysis_type,
            solver_input_hash: solver_input_hash.into(),
            status: RunStatus::Pending,
            created_at: created_at.into(),
            started_at: None,
            finished_at: None,
            error: None,
            error_code: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Done | RunStatus::Failed)
    }

    fn transition(&self, to: RunStatus) -> EngineResult<()> {
        let legal = matches!(
            (self.status, to),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Done)
                | (RunStatus::Running, RunStatus::Failed)
        );
        if legal {
            Ok(())
        } else {
            Err(EngineError::IllegalTransition {
                from: self.status,
                to,
            })
        }
    }

    /// `Pending → Running`.
    pub fn mark_running(mut self, at: impl Into<String>) -> EngineResult<Self> {
        self.transition(RunStatus::Running)?;
        self.status = RunStatus::Running;
        self.started_at = Some(at.into());
        Ok(self)
    }

    /// `Running → Done`.
    pub fn mark_done(mut self, at: impl Into<String>) -> EngineResult<Self> {
        self.transition(RunStatus::Done)?;
        self.status = RunStatus::Done;
        self.finished_at = Some(at.into());
        Ok(self)
    }

    /// `Running → Failed`, recording the cause.
    pub fn mark_failed(
        mut self,
        at: impl Into<String>,
        error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> EngineResult<Self> {
        self.transition(RunStatus::Failed)?;
        self.status = RunStatus::Failed;
        self.finished_at = Some(at.into());
        self.error_code = Some(error_code.into());
        self.error = Some(message.into());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Run {
        Run::new(
            "run-1",
            "case-1",
            SolverAnalysisType::Sc3f,
            "hash",
            "2026-01-01T00:00:00+00:00",
        )
    }

    #[test]
    fn happy_path_transitions() {
        let run = pending()
            .mark_running("t1")
            .unwrap()
            .mark_done("t2")
            .unwrap();
        assert_eq!(run.status, RunStatus::Done);
        assert!(run.is_terminal());
        assert_eq!(run.started_at.as_deref(), Some("t1"));
        assert_eq!(run.finished_at.as_deref(), Some("t2"));
    }

    #[test]
    fn failure_records_code_and_message() {
        let run = pending()
            .mark_running("t1")
            .unwrap()
            .mark_failed("t2", "NUMERICAL_FAILURE", "macierz osobliwa")
            .unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_code.as_deref(), Some("NUMERICAL_FAILURE"));
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(pending().mark_done("t").is_err());
        let done = pending()
            .mark_running("t1")
            .unwrap()
            .mark_done("t2")
            .unwrap();
        assert!(done.clone().mark_running("t3").is_err());
        assert!(done.mark_failed("t3", "X", "y").is_err());
    }
}
