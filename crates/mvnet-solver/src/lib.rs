//! # mvnet-solver: Power-Flow & Short-Circuit Engines
//!
//! The numeric core of the workbench. Both solvers consume frozen
//! solver-input payloads, never the live network model, and both emit
//! ordered white-box traces so every published figure can be replayed by
//! hand.
//!
//! ## Solvers
//!
//! - [`PowerFlowSolver`] - full Newton–Raphson AC power flow with the
//!   analytic Jacobian and LU linear solves
//! - [`ShortCircuitSolver`] - IEC 60909 three-/two-/single-phase and
//!   two-phase-to-ground faults over the Z-bus, with peak, breaking,
//!   thermal currents and source contributions
//! - [`ybus`] - shared dense Y-bus assembly (positive and zero sequence)
//!
//! ## Determinism
//!
//! Node indices derive from sorted bus ids, linear solves use a fixed
//! algorithm with deterministic partial pivoting, and no step consults a
//! clock or random source. Same payload bytes, same result bytes.

pub mod mn_table;
pub mod power_flow;
pub mod short_circuit;
pub mod trace;
pub mod ybus;

pub use power_flow::{BranchFlow, BusResult, PowerFlowSolution, PowerFlowSolver};
pub use short_circuit::{
    aggregate_branch_contributions, BranchContribution, ContributionKind, FaultType,
    ShortCircuitSolution, ShortCircuitSolver, SourceContribution,
};
pub use trace::{IterationTrace, TraceLevel, TraceStep, TraceValue};
pub use ybus::{build_y_bus, SequenceKind, YBus};

use mvnet_input::contracts::SolverAnalysisType;
use thiserror::Error;

/// Errors raised by the numeric solvers.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Newton–Raphson exhausted its iteration budget.
    #[error("power flow did not converge after {iterations} iterations (max mismatch: {last_mismatch:.3e})")]
    ConvergenceFailure {
        iterations: usize,
        last_mismatch: f64,
    },

    /// Singular system or other linear-algebra breakdown.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// A computed quantity left the valid numeric domain.
    #[error("value domain violation: {0}")]
    ValueDomain(String),

    /// Element parameters contradict each other.
    #[error("inconsistent parameters: {0}")]
    ParameterInconsistent(String),

    /// The analysis variant is not admissible on this input; carries the
    /// eligibility code.
    #[error("analysis blocked: {0}")]
    EligibilityBlocker(String),
}

/// Convenience alias for solver results.
pub type SolverResult<T> = Result<T, SolverError>;

impl FaultType {
    /// Map an analysis type onto its fault variant; `None` for load flow.
    pub fn from_analysis(analysis_type: SolverAnalysisType) -> Option<Self> {
        match analysis_type {
            SolverAnalysisType::Sc3f => Some(FaultType::ThreePhase),
            SolverAnalysisType::Sc2f => Some(FaultType::TwoPhase),
            SolverAnalysisType::Sc1f => Some(FaultType::SinglePhase),
            SolverAnalysisType::Sc2fg => Some(FaultType::TwoPhaseToGround),
            SolverAnalysisType::LoadFlow => None,
        }
    }
}
