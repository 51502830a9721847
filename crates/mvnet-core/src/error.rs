//! Unified error type for the model layer.
//!
//! Domain invariant violations are errors; readiness, eligibility, and
//! diagnostic findings are data and never travel through this type.

use crate::canonical::CodecError;
use thiserror::Error;

/// Errors raised by the network model, snapshots, and deltas.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An element with the same id already exists in the graph.
    #[error("duplicate identifier: {element_id}")]
    DuplicateIdentifier { element_id: String },

    /// A branch, switch, or source references a node that does not exist.
    #[error("dangling reference: {element_id} points at missing node {missing_ref}")]
    DanglingReference {
        element_id: String,
        missing_ref: String,
    },

    /// A queried element does not exist.
    #[error("not found: {element_id}")]
    NotFound { element_id: String },

    /// Element parameters contradict each other (e.g. r_pu > z_pu).
    #[error("inconsistent parameters: {0}")]
    ParameterInconsistent(String),

    /// A numeric field left the valid domain (NaN, ±∞, or out of range).
    #[error("value domain violation: {0}")]
    ValueDomain(String),

    /// Canonicalization failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Convenience alias for model-layer results.
pub type CoreResult<T> = Result<T, CoreError>;
