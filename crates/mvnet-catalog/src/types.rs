//! Catalog record types.
//!
//! Records are immutable parameter sets identified by a stable string id.
//! Conductors carry optional zero-sequence data consumed by the
//! single-phase short-circuit path.

use serde::{Deserialize, Serialize};

/// Overhead line or cable type (per-km data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductorType {
    pub id: String,
    pub name: String,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub b_us_per_km: f64,
    pub rated_current_a: f64,
    /// Zero-sequence resistance, when the manufacturer publishes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r0_ohm_per_km: Option<f64>,
    /// Zero-sequence reactance, when the manufacturer publishes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x0_ohm_per_km: Option<f64>,
}

impl ConductorType {
    /// True when the record can feed a zero-sequence network.
    pub fn has_zero_sequence(&self) -> bool {
        self.r0_ohm_per_km.is_some() && self.x0_ohm_per_km.is_some()
    }
}

/// Two-winding transformer type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerType {
    pub id: String,
    pub name: String,
    pub rated_power_mva: f64,
    pub voltage_hv_kv: f64,
    pub voltage_lv_kv: f64,
    pub uk_percent: f64,
    pub pk_kw: f64,
    pub i0_percent: f64,
    pub p0_kw: f64,
    pub vector_group: String,
}

/// Switching device type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchTypeRecord {
    pub id: String,
    pub name: String,
    pub rated_current_a: f64,
    pub breaking_capacity_ka: f64,
}

/// Inverter converter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterType {
    pub id: String,
    pub name: String,
    pub in_rated_a: f64,
    pub k_sc: f64,
}

/// Serializable dump of a full catalog, used by import/export.
///
/// Lists are sorted by `(name, id)` on export; the canonical codec re-sorts
/// by id on hashing, so both orders fingerprint identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDump {
    #[serde(default)]
    pub line_types: Vec<ConductorType>,
    #[serde(default)]
    pub cable_types: Vec<ConductorType>,
    #[serde(default)]
    pub transformer_types: Vec<TransformerType>,
    #[serde(default)]
    pub switch_types: Vec<SwitchTypeRecord>,
    #[serde(default)]
    pub inverter_types: Vec<InverterType>,
}
