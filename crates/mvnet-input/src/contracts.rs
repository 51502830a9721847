//! Solver-input contracts: frozen payload shapes and the envelope.
//!
//! Everything in this module is a stable wire contract. Element arrays are
//! sorted by `ref_id` at build time; the canonical codec re-sorts on
//! hashing, so the bytes that produce `solver_input_hash` never depend on
//! construction order.

use crate::provenance::{ProvenanceEntry, ProvenanceSummary};
use mvnet_core::canonical::{self, CodecResult};
use mvnet_core::readiness::FixAction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version stamp carried by every envelope.
pub const SOLVER_INPUT_CONTRACT_VERSION: &str = "1.0";

/// Analyses the workbench can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolverAnalysisType {
    #[serde(rename = "SC_3F")]
    Sc3f,
    #[serde(rename = "SC_2F")]
    Sc2f,
    #[serde(rename = "SC_1F")]
    Sc1f,
    #[serde(rename = "SC_2FG")]
    Sc2fg,
    #[serde(rename = "LOAD_FLOW")]
    LoadFlow,
}

impl SolverAnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverAnalysisType::Sc3f => "SC_3F",
            SolverAnalysisType::Sc2f => "SC_2F",
            SolverAnalysisType::Sc1f => "SC_1F",
            SolverAnalysisType::Sc2fg => "SC_2FG",
            SolverAnalysisType::LoadFlow => "LOAD_FLOW",
        }
    }

    /// True for every short-circuit variant.
    pub fn is_short_circuit(&self) -> bool {
        !matches!(self, SolverAnalysisType::LoadFlow)
    }
}

impl std::fmt::Display for SolverAnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calculation settings of a study case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyCaseConfig {
    /// System MVA base for per-unit conversion
    pub base_mva: f64,
    /// IEC 60909 voltage factor c (maximum variant)
    pub c_factor_max: f64,
    /// Fault duration t_k for thermal-equivalent current
    pub thermal_time_seconds: f64,
    /// Newton–Raphson iteration cap
    pub max_iterations: usize,
    /// Newton–Raphson mismatch tolerance in per-unit
    pub tolerance: f64,
    /// Whether inverter sources contribute to fault currents
    pub include_inverter_contribution: bool,
}

impl Default for StudyCaseConfig {
    fn default() -> Self {
        Self {
            base_mva: 100.0,
            c_factor_max: 1.1,
            thermal_time_seconds: 1.0,
            max_iterations: 50,
            tolerance: 1e-8,
            include_inverter_contribution: true,
        }
    }
}

/// Bus row of a solver payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPayload {
    pub ref_id: String,
    pub name: String,
    pub node_type: String,
    pub voltage_level_kv: f64,
    pub voltage_magnitude_pu: f64,
    pub voltage_angle_rad: f64,
    pub active_power_mw: f64,
    pub reactive_power_mvar: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sk3_mva: Option<f64>,
    pub in_service: bool,
}

/// Line/cable row with resolved per-km parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchPayload {
    pub ref_id: String,
    pub name: String,
    pub branch_type: String,
    pub from_bus_ref: String,
    pub to_bus_ref: String,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub b_us_per_km: f64,
    pub length_km: f64,
    pub rated_current_a: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r0_ohm_per_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x0_ohm_per_km: Option<f64>,
    pub in_service: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_ref: Option<String>,
}

/// Transformer row with resolved nameplate parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerPayload {
    pub ref_id: String,
    pub name: String,
    pub from_bus_ref: String,
    pub to_bus_ref: String,
    pub rated_power_mva: f64,
    pub voltage_hv_kv: f64,
    pub voltage_lv_kv: f64,
    pub uk_percent: f64,
    pub pk_kw: f64,
    pub i0_percent: f64,
    pub p0_kw: f64,
    pub vector_group: String,
    pub tap_position: i32,
    pub tap_step_percent: f64,
    pub in_service: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_ref: Option<String>,
}

/// Inverter source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterSourcePayload {
    pub ref_id: String,
    pub name: String,
    pub bus_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter_kind: Option<String>,
    pub in_rated_a: f64,
    pub k_sc: f64,
    pub contributes_negative_sequence: bool,
    pub contributes_zero_sequence: bool,
    pub in_service: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_ref: Option<String>,
}

/// Switch row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchPayload {
    pub ref_id: String,
    pub name: String,
    pub switch_type: String,
    pub from_bus_ref: String,
    pub to_bus_ref: String,
    pub state: String,
    pub in_service: bool,
}

/// Frozen input of a short-circuit analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortCircuitPayload {
    pub buses: Vec<BusPayload>,
    pub branches: Vec<BranchPayload>,
    pub transformers: Vec<TransformerPayload>,
    pub inverter_sources: Vec<InverterSourcePayload>,
    pub switches: Vec<SwitchPayload>,
    pub base_mva: f64,
    pub c_factor: f64,
    pub thermal_time_seconds: f64,
    pub include_inverter_contribution: bool,
}

/// Frozen input of a power-flow analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFlowPayload {
    pub buses: Vec<BusPayload>,
    pub branches: Vec<BranchPayload>,
    pub transformers: Vec<TransformerPayload>,
    pub inverter_sources: Vec<InverterSourcePayload>,
    pub switches: Vec<SwitchPayload>,
    pub base_mva: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Payload variants; the envelope's `analysis_type` discriminates, so the
/// serialized form stays a plain object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolverPayload {
    ShortCircuit(ShortCircuitPayload),
    LoadFlow(LoadFlowPayload),
}

/// Severity of an eligibility issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Blocker,
    Warning,
}

/// One eligibility finding; data, not an exception.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityIssue {
    pub code: String,
    pub severity: IssueSeverity,
    pub message_pl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_action: Option<FixAction>,
}

/// Whether a specific analysis variant is admissible on an envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityResult {
    pub analysis_type: SolverAnalysisType,
    pub eligible: bool,
    pub blockers: Vec<EligibilityIssue>,
    pub warnings: Vec<EligibilityIssue>,
}

impl EligibilityResult {
    pub fn new(
        analysis_type: SolverAnalysisType,
        blockers: Vec<EligibilityIssue>,
        warnings: Vec<EligibilityIssue>,
    ) -> Self {
        Self {
            analysis_type,
            eligible: blockers.is_empty(),
            blockers,
            warnings,
        }
    }

    pub fn blocker_codes(&self) -> Vec<&str> {
        self.blockers.iter().map(|b| b.code.as_str()).collect()
    }
}

/// The frozen, provenance-carrying input of one solver call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverInputEnvelope {
    pub solver_input_version: String,
    pub case_id: String,
    pub enm_revision: String,
    pub analysis_type: SolverAnalysisType,
    pub eligibility: EligibilityResult,
    pub provenance_summary: ProvenanceSummary,
    pub payload: Option<SolverPayload>,
    pub trace: Vec<ProvenanceEntry>,
}

impl SolverInputEnvelope {
    /// Canonical value tree of the envelope.
    pub fn to_canonical_value(&self) -> CodecResult<Value> {
        let raw = serde_json::to_value(self)
            .map_err(|e| canonical::CodecError::Serialize(e.to_string()))?;
        canonical::canonicalize(&raw)
    }

    /// `solver_input_hash`: SHA-256 over the canonical envelope bytes.
    pub fn solver_input_hash(&self) -> CodecResult<String> {
        canonical::fingerprint(&self.to_canonical_value()?)
    }
}
