//! Execution engine: the canonical StudyCase → Run → ResultSet pipeline.
//!
//! Invariants:
//!
//! - A solver is never called directly - always through a run.
//! - A run is never created when readiness reports blockers or the
//!   analysis is ineligible; nothing is stored on a gate failure.
//! - The solver input is frozen by deep copy and hashed canonically.
//! - One `execute_run` call always leaves the run in a terminal state;
//!   executing a terminal run returns the stored result unchanged.

use crate::ports::{Clock, IdSource, InMemoryRepository, RunRepository, SystemClock, UuidSource};
use crate::result_set::{
    build_result_set, map_power_flow, map_short_circuit, ResultSet, ResultSetBuild,
};
use crate::run::{Run, RunStatus};
use crate::{EngineError, EngineResult};
use mvnet_core::canonical;
use mvnet_core::readiness::ReadinessProfile;
use mvnet_input::contracts::{
    EligibilityResult, LoadFlowPayload, ShortCircuitPayload, SolverAnalysisType,
    SolverInputEnvelope, StudyCaseConfig,
};
use mvnet_solver::{FaultType, PowerFlowSolver, ShortCircuitSolver, SolverError, TraceLevel};
use serde_json::Value;
use std::collections::BTreeMap;

/// Execution context of a study case.
#[derive(Debug, Clone)]
pub struct StudyCase {
    pub id: String,
    pub project_id: Option<String>,
    pub name: String,
    pub config: StudyCaseConfig,
}

impl StudyCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: None,
            name: name.into(),
            config: StudyCaseConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StudyCaseConfig) -> Self {
        self.config = config;
        self
    }
}

/// Per-execution inputs that are not part of the frozen envelope.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Fault location, required for short-circuit runs.
    pub fault_node_id: Option<String>,
    /// Readiness state at run time, folded into the result set.
    pub readiness_snapshot: Value,
    /// Validation state at run time, folded into the result set.
    pub validation_snapshot: Value,
}

/// Outcome of one `execute_run` call; `result_set` is `None` when the run
/// failed (the run then carries the error code and message).
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub run: Run,
    pub result_set: Option<ResultSet>,
}

/// The execution engine. Owns the run store and the study-case registry;
/// time and identifiers come in through ports.
pub struct ExecutionEngine<R: RunRepository = InMemoryRepository> {
    repository: R,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
    study_cases: BTreeMap<String, StudyCase>,
}

impl ExecutionEngine<InMemoryRepository> {
    /// Engine with in-memory storage, wall clock, and UUID run ids.
    pub fn new() -> Self {
        Self::with_ports(
            InMemoryRepository::new(),
            Box::new(SystemClock),
            Box::new(UuidSource),
        )
    }
}

impl Default for ExecutionEngine<InMemoryRepository> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RunRepository> ExecutionEngine<R> {
    /// Engine over explicit ports.
    pub fn with_ports(repository: R, clock: Box<dyn Clock>, ids: Box<dyn IdSource>) -> Self {
        Self {
            repository,
            clock,
            ids,
            study_cases: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Study cases
    // =========================================================================

    pub fn register_study_case(&mut self, case: StudyCase) {
        self.study_cases.insert(case.id.clone(), case);
    }

    pub fn get_study_case(&self, case_id: &str) -> EngineResult<&StudyCase> {
        self.study_cases
            .get(case_id)
            .ok_or_else(|| EngineError::StudyCaseNotFound(case_id.to_string()))
    }

    // =========================================================================
    // Run creation
    // =========================================================================

    /// Create a run after the readiness and eligibility gates pass.
    ///
    /// The envelope is frozen into its canonical form and hashed; the
    /// run starts `Pending`. On a gate failure nothing is stored.
    pub fn create_run(
        &mut self,
        study_case_id: &str,
        envelope: &SolverInputEnvelope,
        readiness: Option<&ReadinessProfile>,
        eligibility: Option<&EligibilityResult>,
    ) -> EngineResult<Run> {
        self.get_study_case(study_case_id)?;

        if let Some(profile) = readiness {
            if !profile.ready() {
                let reasons: Vec<String> = profile
                    .blockers()
                    .map(|issue| issue.message_pl.clone())
                    .collect();
                return Err(EngineError::RunNotReady { reasons });
            }
        }

        if let Some(result) = eligibility {
            if !result.eligible {
                let blockers: Vec<String> = result
                    .blockers
                    .iter()
                    .map(|issue| issue.message_pl.clone())
                    .collect();
                return Err(EngineError::RunBlocked { blockers });
            }
        }

        // Freeze by deep copy; canonicalization (with its float rounding)
        // happens only on the hashing side, never on the execution input.
        let frozen = serde_json::to_value(envelope)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        let solver_input_hash = envelope.solver_input_hash()?;

        let run = Run::new(
            self.ids.next_id(),
            study_case_id,
            envelope.analysis_type,
            solver_input_hash,
            self.clock.now_iso(),
        );
        self.repository.put_run(run.clone());
        self.repository.put_frozen_input(&run.id, frozen);
        Ok(run)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute a pending run to a terminal state.
    ///
    /// Idempotent: a run that is already terminal is returned as-is with
    /// its stored result set.
    pub fn execute_run(
        &mut self,
        run_id: &str,
        request: &ExecutionRequest,
    ) -> EngineResult<ExecutionOutcome> {
        let run = self
            .repository
            .get_run(run_id)
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;

        if run.status != RunStatus::Pending {
            let result_set = self.repository.get_result_set(run_id);
            return Ok(ExecutionOutcome { run, result_set });
        }

        let run = run.mark_running(self.clock.now_iso())?;
        self.repository.put_run(run.clone());

        let frozen = self
            .repository
            .get_frozen_input(run_id)
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;

        match self.dispatch(&run, &frozen, request) {
            Ok((element_results, global_results)) => {
                let result_set = build_result_set(ResultSetBuild {
                    run_id: run.id.clone(),
                    analysis_type: run.analysis_type.as_str().to_string(),
                    solver_input_hash: run.solver_input_hash.clone(),
                    created_at: run.created_at.clone(),
                    element_results,
                    global_results,
                    readiness_snapshot: request.readiness_snapshot.clone(),
                    validation_snapshot: request.validation_snapshot.clone(),
                })?;
                let run = run.mark_done(self.clock.now_iso())?;
                self.repository.put_run(run.clone());
                self.repository.put_result_set(&run.id, result_set.clone());
                Ok(ExecutionOutcome {
                    run,
                    result_set: Some(result_set),
                })
            }
            Err(error) => {
                let (code, message) = error_code_and_message(&error);
                let run = run.mark_failed(self.clock.now_iso(), code, message)?;
                self.repository.put_run(run.clone());
                Ok(ExecutionOutcome {
                    run,
                    result_set: None,
                })
            }
        }
    }

    fn dispatch(
        &self,
        run: &Run,
        frozen: &Value,
        request: &ExecutionRequest,
    ) -> Result<
        (
            Vec<crate::result_set::ElementResult>,
            BTreeMap<String, Value>,
        ),
        DispatchError,
    > {
        let payload_value = frozen
            .get("payload")
            .cloned()
            .ok_or_else(|| DispatchError::Payload("frozen envelope has no payload".to_string()))?;

        match run.analysis_type {
            SolverAnalysisType::LoadFlow => {
                let payload: LoadFlowPayload = serde_json::from_value(payload_value)
                    .map_err(|e| DispatchError::Payload(e.to_string()))?;
                let solution = PowerFlowSolver::new()
                    .with_trace_level(TraceLevel::Full)
                    .solve(&payload)?;
                map_power_flow(&solution).map_err(DispatchError::Build)
            }
            analysis_type => {
                let payload: ShortCircuitPayload = serde_json::from_value(payload_value)
                    .map_err(|e| DispatchError::Payload(e.to_string()))?;
                let fault_node_id = request
                    .fault_node_id
                    .as_deref()
                    .ok_or_else(|| {
                        DispatchError::Solver(SolverError::EligibilityBlocker(
                            "ELIG_FAULT_NODE_EMPTY".to_string(),
                        ))
                    })?;
                let fault_type = FaultType::from_analysis(analysis_type).ok_or_else(|| {
                    DispatchError::Payload(format!(
                        "analysis type {analysis_type} is not a fault variant"
                    ))
                })?;
                let solution =
                    ShortCircuitSolver::new().solve(&payload, fault_node_id, fault_type, None)?;
                map_short_circuit(&solution).map_err(DispatchError::Build)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_run(&self, run_id: &str) -> EngineResult<Run> {
        self.repository
            .get_run(run_id)
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    pub fn get_result_set(&self, run_id: &str) -> EngineResult<ResultSet> {
        self.repository
            .get_result_set(run_id)
            .ok_or_else(|| EngineError::ResultSetNotFound(run_id.to_string()))
    }

    /// Runs of a case, newest first by creation order.
    pub fn list_runs_for_case(&self, study_case_id: &str) -> Vec<Run> {
        let mut runs = self.repository.runs_for_case(study_case_id);
        runs.reverse();
        runs
    }

    pub fn get_latest_run(&self, study_case_id: &str) -> Option<Run> {
        self.list_runs_for_case(study_case_id).into_iter().next()
    }

    pub fn get_latest_successful_run(
        &self,
        study_case_id: &str,
    ) -> Option<(Run, ResultSet)> {
        self.list_runs_for_case(study_case_id)
            .into_iter()
            .filter(|run| run.status == RunStatus::Done)
            .find_map(|run| {
                self.repository
                    .get_result_set(&run.id)
                    .map(|result_set| (run, result_set))
            })
    }

    /// Determinism check used by the test suites: identical canonical
    /// envelopes hash identically.
    pub fn verify_hash_determinism(
        &self,
        a: &SolverInputEnvelope,
        b: &SolverInputEnvelope,
    ) -> EngineResult<bool> {
        Ok(a.solver_input_hash()? == b.solver_input_hash()?)
    }
}

/// Internal dispatch failure, folded into the run's error fields.
enum DispatchError {
    Solver(SolverError),
    Payload(String),
    Build(EngineError),
}

impl From<SolverError> for DispatchError {
    fn from(error: SolverError) -> Self {
        DispatchError::Solver(error)
    }
}

/// Stable error code + Polish message for a failed dispatch.
fn error_code_and_message(error: &DispatchError) -> (String, String) {
    use mvnet_core::messages::message_pl_or_code;
    match error {
        DispatchError::Solver(solver_error) => {
            let code = match solver_error {
                SolverError::ConvergenceFailure { .. } => "CONVERGENCE_FAILURE",
                SolverError::NumericalFailure(_) => "NUMERICAL_FAILURE",
                SolverError::ValueDomain(_) => "VALUE_DOMAIN",
                SolverError::ParameterInconsistent(_) => "PARAMETER_INCONSISTENT",
                SolverError::EligibilityBlocker(code) => code.as_str(),
            };
            (
                code.to_string(),
                format!("{}: {}", message_pl_or_code(code), solver_error),
            )
        }
        DispatchError::Payload(message) => (
            "VALUE_DOMAIN".to_string(),
            format!("{}: {}", message_pl_or_code("VALUE_DOMAIN"), message),
        ),
        DispatchError::Build(error) => ("VALUE_DOMAIN".to_string(), error.to_string()),
    }
}

/// Canonical error payload for a failed run:
/// `{"errors":[{code, message_pl, element_ref?}]}`.
pub fn error_payload(run: &Run) -> EngineResult<Value> {
    let code = run.error_code.clone().unwrap_or_default();
    let message = run.error.clone().unwrap_or_default();
    let payload = serde_json::json!({
        "errors": [{
            "code": code,
            "message_pl": message,
        }],
    });
    Ok(canonical::canonicalize(&payload)?)
}
