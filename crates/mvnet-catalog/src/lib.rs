//! # mvnet-catalog: Equipment Type Library
//!
//! Read-only library of line/cable/transformer/switch/inverter types with a
//! fingerprinted manifest. A repository is a plain value: built once,
//! shared freely, never mutated - import produces a *new* repository.
//!
//! Categories and lookup semantics:
//!
//! - `line_types` / `cable_types` - per-km electrical data for conductors
//!   (shared record shape, separate namespaces)
//! - `transformer_types` - nameplate data for two-winding units
//! - `switch_types` - ratings of switching devices
//! - `inverter_types` - converter ratings for PV/BESS/wind sources
//!
//! `manifest_fingerprint` is the canonical fingerprint of the full sorted
//! dump, so two repositories with the same content hash identically no
//! matter how they were assembled.

pub mod repository;
pub mod types;

pub use repository::{
    CatalogCategory, CatalogRepository, ImportMode, ImportReport,
};
pub use types::{CatalogDump, ConductorType, InverterType, SwitchTypeRecord, TransformerType};

use thiserror::Error;

/// Errors raised by catalog construction and import.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two records in one category share an id.
    #[error("duplicate type id in catalog: {0}")]
    DuplicateTypeId(String),

    /// Replace-mode import would drop types still referenced by instances.
    #[error("import would remove types still in use: {}", conflicts.join(", "))]
    ReplaceConflicts { conflicts: Vec<String> },

    /// Manifest fingerprinting failed.
    #[error(transparent)]
    Codec(#[from] mvnet_core::CodecError),
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;
