//! Per-field provenance: where every resolved value came from.
//!
//! The builder records one entry per resolved field. Entries carry the
//! source kind (Override > Catalog > Derived precedence), the concrete
//! source reference, and a fingerprint of the value itself, so an auditor
//! can verify a payload field against its catalog record without re-running
//! the builder.

use mvnet_core::canonical::{self, CodecResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Origin class of a resolved field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Value materialized from a catalog type record.
    Catalog,
    /// Value taken from an instance-level override object.
    Override,
    /// Value derived by a named rule (instance parameters, topology, …).
    Derived,
}

/// Concrete reference to the source of a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation_rule: Option<String>,
}

impl SourceRef {
    pub fn catalog(catalog_ref: &str, catalog_path: String) -> Self {
        Self {
            catalog_ref: Some(catalog_ref.to_string()),
            catalog_path: Some(catalog_path),
            ..Self::default()
        }
    }

    pub fn override_with(reason: &str) -> Self {
        Self {
            override_reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn derived(rule: &str) -> Self {
        Self {
            derivation_rule: Some(rule.to_string()),
            ..Self::default()
        }
    }
}

/// One resolved field, keyed by `(element_ref, field_path)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub element_ref: String,
    pub field_path: String,
    pub source_kind: SourceKind,
    pub source_ref: SourceRef,
    /// Canonical fingerprint of the resolved value.
    pub value_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Aggregated provenance counters for one envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceSummary {
    pub catalog_refs_used: Vec<String>,
    pub overrides_used_count: usize,
    pub overrides_used_refs: Vec<String>,
    pub derived_fields_count: usize,
}

/// Fingerprint a single resolved numeric value.
pub fn compute_value_hash(value: f64) -> CodecResult<String> {
    canonical::fingerprint(&canonical::float_value(value)?)
}

/// Fingerprint a single resolved string value.
pub fn compute_text_hash(value: &str) -> CodecResult<String> {
    canonical::fingerprint(&Value::String(value.to_string()))
}

/// Build the summary over a trace. Catalog refs and override refs are
/// deduplicated and sorted.
pub fn build_provenance_summary(entries: &[ProvenanceEntry]) -> ProvenanceSummary {
    let mut catalog_refs: BTreeSet<String> = BTreeSet::new();
    let mut override_refs: BTreeSet<String> = BTreeSet::new();
    let mut overrides = 0usize;
    let mut derived = 0usize;

    for entry in entries {
        match entry.source_kind {
            SourceKind::Catalog => {
                if let Some(catalog_ref) = &entry.source_ref.catalog_ref {
                    catalog_refs.insert(catalog_ref.clone());
                }
            }
            SourceKind::Override => {
                overrides += 1;
                override_refs.insert(entry.element_ref.clone());
            }
            SourceKind::Derived => derived += 1,
        }
    }

    ProvenanceSummary {
        catalog_refs_used: catalog_refs.into_iter().collect(),
        overrides_used_count: overrides,
        overrides_used_refs: override_refs.into_iter().collect(),
        derived_fields_count: derived,
    }
}
