//! # mvnet-input: Solver-Input Builder & Provenance
//!
//! Resolves catalog bindings, instance overrides, and instance parameters
//! into a frozen [`SolverInputEnvelope`] with a per-field provenance trace.
//!
//! Resolution precedence, highest first:
//!
//! 1. instance override object
//! 2. catalog type parameters
//! 3. instance-level explicit value
//!
//! A field with no source is recorded as `Derived("no_source")` and appends
//! a blocker to the envelope's eligibility - the builder never invents
//! physical values.
//!
//! The envelope fingerprint ([`SolverInputEnvelope::solver_input_hash`]) is
//! the identity of a calculation: two equal networks, catalogs, and
//! configurations produce byte-identical envelopes.

pub mod builder;
pub mod contracts;
pub mod eligibility;
pub mod provenance;

pub use builder::{build_solver_input, BuildRequest};
pub use contracts::{
    BranchPayload, BusPayload, EligibilityIssue, EligibilityResult, InverterSourcePayload,
    IssueSeverity, LoadFlowPayload, ShortCircuitPayload, SolverAnalysisType, SolverInputEnvelope,
    SolverPayload, StudyCaseConfig, SwitchPayload, TransformerPayload,
    SOLVER_INPUT_CONTRACT_VERSION,
};
pub use eligibility::{check_eligibility, zero_sequence_available};
pub use provenance::{
    build_provenance_summary, compute_text_hash, compute_value_hash, ProvenanceEntry,
    ProvenanceSummary, SourceKind, SourceRef,
};

use thiserror::Error;

/// Errors raised while building a solver-input envelope.
#[derive(Debug, Error)]
pub enum InputError {
    /// A value failed canonicalization (NaN/∞ in an element parameter).
    #[error(transparent)]
    Codec(#[from] mvnet_core::CodecError),
}

/// Convenience alias for builder results.
pub type InputResult<T> = Result<T, InputError>;
