//! # mvnet-engine: Run Lifecycle & Result Sets
//!
//! The application layer of the workbench: gates an analysis on readiness
//! and eligibility, freezes its input, executes it through the solvers,
//! and publishes a deterministic, signed [`ResultSet`].
//!
//! ```text
//! StudyCase → Readiness gate → Eligibility gate → Run (PENDING)
//!           → execute (RUNNING) → solver → ResultSet → DONE
//!                                        ↘ error code → FAILED
//! ```
//!
//! No physics lives here: the engine orchestrates
//! [`mvnet_solver`] and owns the stores. Time and run identifiers enter
//! through the [`ports`], so a pipeline run with a pinned clock and
//! sequential ids is bit-for-bit reproducible.

pub mod engine;
pub mod ports;
pub mod result_set;
pub mod run;

pub use engine::{error_payload, ExecutionEngine, ExecutionOutcome, ExecutionRequest, StudyCase};
pub use ports::{
    Clock, FixedClock, IdSource, InMemoryRepository, RunRepository, SequentialIdSource,
    SystemClock, UuidSource,
};
pub use result_set::{
    build_result_set, map_power_flow, map_short_circuit, ElementResult, MetricSource,
    OverlayBadge, OverlayElement, OverlayElementKind, OverlayLegend, OverlayLegendEntry,
    OverlayMetric, OverlayPayload, OverlaySeverity, OverlayWarning, ResultSet, ResultSetBuild,
    RESULT_CONTRACT_VERSION,
};
pub use run::{Run, RunStatus};

use crate::run::RunStatus as Status;
use thiserror::Error;

/// Errors raised by the execution engine. Messages follow the Polish
/// error surface of the product; codes stay stable.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Readiness gate failed; carries the blocker messages.
    #[error("Sieć nie jest gotowa do obliczeń: {}", reasons.join("; "))]
    RunNotReady { reasons: Vec<String> },

    /// Eligibility gate failed; carries the blocker messages.
    #[error("Obliczenie zablokowane: {}", blockers.join("; "))]
    RunBlocked { blockers: Vec<String> },

    #[error("Przebieg obliczeniowy nie istnieje: {0}")]
    RunNotFound(String),

    #[error("Wyniki nie istnieją dla przebiegu: {0}")]
    ResultSetNotFound(String),

    #[error("Przypadek obliczeniowy nie istnieje: {0}")]
    StudyCaseNotFound(String),

    /// Monotonic state machine violation.
    #[error("Niedozwolona zmiana stanu przebiegu: {from:?} → {to:?}")]
    IllegalTransition { from: Status, to: Status },

    /// Result payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Canonicalization failed.
    #[error(transparent)]
    Codec(#[from] mvnet_core::CodecError),
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
