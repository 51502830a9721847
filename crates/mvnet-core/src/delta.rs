//! Structural diff between two snapshots.
//!
//! The delta is computed over canonical element dumps, so it sees exactly
//! what the fingerprint sees: a field that does not change the hash does
//! not appear in the delta, and vice versa. Added/removed sets and
//! modified-field lists are sorted, which gives the symmetry property
//! used by the comparison views: delta(A→B).added == delta(B→A).removed,
//! and modified entries swap their old/new values.

use crate::canonical;
use crate::error::CoreResult;
use crate::messages::LEGEND_DELTA_PL;
use crate::network::NetworkGraph;
use crate::snapshot::NetworkSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One changed field on one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub element_id: String,
    pub field_name: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// Structural difference A → B.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaOverlay {
    /// Element ids present in B but not in A, sorted.
    pub added_elements: Vec<String>,
    /// Element ids present in A but not in B, sorted.
    pub removed_elements: Vec<String>,
    /// Field-level changes on elements present in both, sorted by
    /// `(element_id, field_name)`.
    pub modified_elements: Vec<FieldChange>,
}

impl DeltaOverlay {
    pub fn is_empty(&self) -> bool {
        self.added_elements.is_empty()
            && self.removed_elements.is_empty()
            && self.modified_elements.is_empty()
    }
}

/// Canonical per-element object maps for every collection of a graph.
fn element_dump(graph: &NetworkGraph) -> CoreResult<BTreeMap<String, Value>> {
    let canon = graph.to_canonical_value()?;
    let mut elements = BTreeMap::new();
    for collection in ["nodes", "branches", "switches", "inverter_sources"] {
        if let Some(Value::Array(items)) = canon.get(collection) {
            for item in items {
                if let Some(Value::String(id)) = item.get("id") {
                    elements.insert(id.clone(), item.clone());
                }
            }
        }
    }
    Ok(elements)
}

/// Compute the structural delta from snapshot `a` to snapshot `b`.
pub fn compute_delta(a: &NetworkSnapshot, b: &NetworkSnapshot) -> CoreResult<DeltaOverlay> {
    let before = element_dump(&a.graph)?;
    let after = element_dump(&b.graph)?;

    let mut delta = DeltaOverlay::default();

    for id in after.keys() {
        if !before.contains_key(id) {
            delta.added_elements.push(id.clone());
        }
    }
    for id in before.keys() {
        if !after.contains_key(id) {
            delta.removed_elements.push(id.clone());
        }
    }

    for (id, old) in &before {
        let Some(new) = after.get(id) else { continue };
        if old == new {
            continue;
        }
        let empty = serde_json::Map::new();
        let old_fields = old.as_object().unwrap_or(&empty);
        let new_fields = new.as_object().unwrap_or(&empty);
        let mut field_names: Vec<&String> = old_fields.keys().chain(new_fields.keys()).collect();
        field_names.sort();
        field_names.dedup();
        for field in field_names {
            let old_value = old_fields.get(field).cloned().unwrap_or(Value::Null);
            let new_value = new_fields.get(field).cloned().unwrap_or(Value::Null);
            if old_value != new_value {
                delta.modified_elements.push(FieldChange {
                    element_id: id.clone(),
                    field_name: field.clone(),
                    old_value,
                    new_value,
                });
            }
        }
    }

    // BTreeMap iteration already yields ids in order; modified entries only
    // need the secondary field sort.
    delta
        .modified_elements
        .sort_by(|a, b| (&a.element_id, &a.field_name).cmp(&(&b.element_id, &b.field_name)));
    Ok(delta)
}

/// Fingerprint of a delta, for dedup of comparison overlays.
pub fn delta_fingerprint(delta: &DeltaOverlay) -> CoreResult<String> {
    let value =
        serde_json::to_value(delta).map_err(|e| canonical::CodecError::Serialize(e.to_string()))?;
    Ok(canonical::fingerprint(&value)?)
}

/// Comparison token of one element between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeltaToken {
    Unchanged,
    Changed,
    Missing,
}

impl DeltaToken {
    /// Polish label from the fixed comparison legend.
    pub fn label_pl(&self) -> &'static str {
        match self {
            DeltaToken::Unchanged => LEGEND_DELTA_PL[0],
            DeltaToken::Changed => LEGEND_DELTA_PL[1],
            DeltaToken::Missing => LEGEND_DELTA_PL[2],
        }
    }
}

/// One element row of the comparison overlay.
#[derive(Debug, Clone, Serialize)]
pub struct DeltaOverlayElement {
    pub element_id: String,
    pub token: DeltaToken,
    pub label_pl: String,
}

/// Token-only comparison overlay projected from a delta.
///
/// Carries the fixed Polish legend; tokens only, never a color.
#[derive(Debug, Clone, Serialize)]
pub struct DeltaOverlayView {
    pub elements: Vec<DeltaOverlayElement>,
    pub legend: Vec<String>,
}

/// Project a delta onto the element universe of both snapshots.
///
/// Modified elements read «Zmiana». Elements present on only one side
/// have no counterpart to compare against and read «Brak danych».
/// Everything else reads «Bez zmian». Rows are sorted by element id.
pub fn build_delta_overlay(
    a: &NetworkSnapshot,
    b: &NetworkSnapshot,
    delta: &DeltaOverlay,
) -> CoreResult<DeltaOverlayView> {
    let before = element_dump(&a.graph)?;
    let after = element_dump(&b.graph)?;

    let one_sided: BTreeSet<&String> = delta
        .added_elements
        .iter()
        .chain(delta.removed_elements.iter())
        .collect();
    let changed: BTreeSet<&String> = delta
        .modified_elements
        .iter()
        .map(|change| &change.element_id)
        .collect();

    let ids: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let elements = ids
        .into_iter()
        .map(|id| {
            let token = if one_sided.contains(id) {
                DeltaToken::Missing
            } else if changed.contains(id) {
                DeltaToken::Changed
            } else {
                DeltaToken::Unchanged
            };
            DeltaOverlayElement {
                element_id: id.clone(),
                token,
                label_pl: token.label_pl().to_string(),
            }
        })
        .collect();

    Ok(DeltaOverlayView {
        elements,
        legend: LEGEND_DELTA_PL.iter().map(|s| s.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Node, NodeType};
    use crate::snapshot::freeze;

    fn snapshot_with(nodes: &[(&str, &str)]) -> NetworkSnapshot {
        let mut graph = NetworkGraph::new("model-1");
        for (id, name) in nodes {
            graph
                .add_node(
                    Node::new(*id, *name, NodeType::Slack)
                        .with_voltage_level(15.0)
                        .with_setpoint(1.0, 0.0),
                )
                .unwrap();
        }
        freeze(&graph, "snap", "2026-01-01T00:00:00+00:00", "model-1").unwrap()
    }

    #[test]
    fn rename_shows_single_field_change() {
        let a = snapshot_with(&[("n1", "Original")]);
        let b = snapshot_with(&[("n1", "Changed")]);
        let delta = compute_delta(&a, &b).unwrap();
        assert!(delta.added_elements.is_empty());
        assert!(delta.removed_elements.is_empty());
        assert_eq!(delta.modified_elements.len(), 1);
        let change = &delta.modified_elements[0];
        assert_eq!(change.element_id, "n1");
        assert_eq!(change.field_name, "name");
        assert_eq!(change.old_value, "Original");
        assert_eq!(change.new_value, "Changed");
    }

    #[test]
    fn added_and_removed_are_symmetric() {
        let a = snapshot_with(&[("n1", "A")]);
        let b = snapshot_with(&[("n1", "A"), ("n2", "B")]);
        let forward = compute_delta(&a, &b).unwrap();
        let backward = compute_delta(&b, &a).unwrap();
        assert_eq!(forward.added_elements, vec!["n2".to_string()]);
        assert_eq!(forward.added_elements, backward.removed_elements);
        assert_eq!(forward.removed_elements, backward.added_elements);
    }

    #[test]
    fn modified_swaps_old_and_new() {
        let a = snapshot_with(&[("n1", "Original")]);
        let b = snapshot_with(&[("n1", "Changed")]);
        let forward = compute_delta(&a, &b).unwrap();
        let backward = compute_delta(&b, &a).unwrap();
        assert_eq!(
            forward.modified_elements[0].old_value,
            backward.modified_elements[0].new_value
        );
        assert_eq!(
            forward.modified_elements[0].new_value,
            backward.modified_elements[0].old_value
        );
    }

    #[test]
    fn identical_snapshots_give_empty_delta() {
        let a = snapshot_with(&[("n1", "A")]);
        let b = snapshot_with(&[("n1", "A")]);
        assert!(compute_delta(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn overlay_tokens_cover_all_three_states() {
        // n1 renamed, n2 untouched, n3 only in B.
        let a = snapshot_with(&[("n1", "Original"), ("n2", "Stala")]);
        let b = snapshot_with(&[("n1", "Changed"), ("n2", "Stala"), ("n3", "Nowa")]);
        let delta = compute_delta(&a, &b).unwrap();
        let view = build_delta_overlay(&a, &b, &delta).unwrap();

        let token_of = |id: &str| {
            view.elements
                .iter()
                .find(|e| e.element_id == id)
                .unwrap()
                .token
        };
        assert_eq!(token_of("n1"), DeltaToken::Changed);
        assert_eq!(token_of("n2"), DeltaToken::Unchanged);
        assert_eq!(token_of("n3"), DeltaToken::Missing);
    }

    #[test]
    fn overlay_labels_follow_fixed_legend() {
        let a = snapshot_with(&[("n1", "Original")]);
        let b = snapshot_with(&[("n1", "Changed")]);
        let delta = compute_delta(&a, &b).unwrap();
        let view = build_delta_overlay(&a, &b, &delta).unwrap();

        assert_eq!(view.legend, ["Bez zmian", "Zmiana", "Brak danych"]);
        assert_eq!(view.elements[0].label_pl, "Zmiana");
        assert_eq!(DeltaToken::Unchanged.label_pl(), "Bez zmian");
        assert_eq!(DeltaToken::Missing.label_pl(), "Brak danych");
    }

    #[test]
    fn overlay_rows_are_sorted_and_token_only() {
        let a = snapshot_with(&[("n2", "B"), ("n1", "A")]);
        let b = snapshot_with(&[("n1", "A"), ("n2", "B")]);
        let delta = compute_delta(&a, &b).unwrap();
        let view = build_delta_overlay(&a, &b, &delta).unwrap();
        let ids: Vec<&str> = view.elements.iter().map(|e| e.element_id.as_str()).collect();
        assert_eq!(ids, ["n1", "n2"]);
        let text = serde_json::to_string(&view).unwrap();
        assert!(!text.contains('#'), "hex-like token in comparison overlay");
    }
}
