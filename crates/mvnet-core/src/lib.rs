//! # mvnet-core: MV Network Model & Determinism Kernel
//!
//! Foundation crate of the MV design workbench: the in-memory network
//! model, content-addressed snapshots, and the canonical codec that makes
//! "same input ⇒ same output bytes" a mechanical guarantee.
//!
//! ## Design Philosophy
//!
//! The workbench is a *white-box* tool: every published figure must be
//! traceable to a formula, an input, and a snapshot hash. That forces two
//! properties on this crate:
//!
//! - **Determinism by construction.** Element maps are ordered
//!   (`BTreeMap`), every list that crosses a hash boundary is sorted, and
//!   every fingerprint funnels through a single canonical codec
//!   ([`canonical`]). There is no second place where bytes are produced.
//! - **Expected failures are data.** Readiness findings, diagnostics, and
//!   eligibility all travel as typed issue records with stable codes and
//!   Polish messages from a closed table ([`messages`]). Errors
//!   ([`CoreError`]) are reserved for invariant violations.
//!
//! ## Modules
//!
//! - [`canonical`] - canonical JSON bytes + SHA-256 fingerprints
//! - [`units`] - transparent unit newtypes (kV, pu, MW, Mvar, rad, …)
//! - [`network`] - graph of nodes, branches, switches, inverter sources
//! - [`snapshot`] - immutable content-addressed snapshots
//! - [`delta`] - structural diff between snapshots
//! - [`readiness`] - analysis preconditions over a snapshot
//! - [`diagnostics`] - model self-consistency rules (E-D/W-D/I-D codes)
//! - [`messages`] - the closed Polish message table
//!
//! ## Quick Start
//!
//! ```rust
//! use mvnet_core::*;
//!
//! let mut graph = NetworkGraph::new("model-1");
//! graph.add_node(
//!     Node::new("gpz", "GPZ Prady", NodeType::Slack)
//!         .with_voltage_level(15.0)
//!         .with_sk3(250.0),
//! )?;
//! graph.add_node(
//!     Node::new("st-1", "Stacja 1", NodeType::Pq)
//!         .with_voltage_level(15.0)
//!         .with_load(0.4, 0.1),
//! )?;
//! graph.add_branch(Branch::Cable(
//!     LineBranch::new("cab-1", "Kabel 1", "gpz", "st-1")
//!         .with_impedance(0.253, 0.073, 0.0)
//!         .with_length(0.5),
//! ))?;
//!
//! let snapshot = freeze(&graph, "snap-1", "2026-01-01T00:00:00+00:00", "model-1")?;
//! let profile = check_snapshot_readiness(&snapshot, None);
//! assert!(profile.load_flow_ready);
//! # Ok::<(), mvnet_core::CoreError>(())
//! ```

pub mod canonical;
pub mod delta;
pub mod diagnostics;
pub mod error;
pub mod messages;
pub mod network;
pub mod readiness;
pub mod snapshot;
pub mod units;

pub use canonical::{
    canonical_bytes, canonicalize, complex_value, fingerprint, float_value, CodecError,
    CodecResult,
};
pub use delta::{
    build_delta_overlay, compute_delta, delta_fingerprint, DeltaOverlay, DeltaOverlayElement,
    DeltaOverlayView, DeltaToken, FieldChange,
};
pub use diagnostics::{run_diagnostics, DiagnosticIssue, DiagnosticSeverity, Diagnostics};
pub use error::{CoreError, CoreResult};
pub use messages::{message_pl, message_pl_or_code, LEGEND_DELTA_PL, LEGEND_SEVERITY_PL};
pub use network::{
    Branch, ConverterKind, ImpedanceOverride, InverterSource, LineBranch, NetworkGraph,
    NetworkStats, Node, NodeType, Switch, SwitchState, SwitchType, TransformerBranch,
};
pub use readiness::{
    check_snapshot_readiness, CatalogIndex, FixAction, FixActionType, ReadinessArea,
    ReadinessIssue, ReadinessPriority, ReadinessProfile,
};
pub use snapshot::{freeze, NetworkSnapshot};
pub use units::{
    Amperes, Degrees, Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians,
};
