//! Content-addressed, immutable network snapshots.
//!
//! A snapshot is taken by [`freeze`] and never mutated afterwards; its
//! fingerprint is fixed at creation (the graph dump plus the snapshot
//! metadata, hashed by the canonical codec). Any change to the network
//! produces a new snapshot with a new fingerprint.

use crate::canonical;
use crate::error::CoreResult;
use crate::network::NetworkGraph;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Immutable copy of a [`NetworkGraph`] with identity and fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub snapshot_id: String,
    /// ISO-8601 creation timestamp, supplied by the caller (the core never
    /// reads the ambient clock).
    pub created_at: String,
    pub network_model_id: String,
    pub graph: NetworkGraph,
    /// Lowercase SHA-256 hex over the canonical dump.
    pub fingerprint: String,
}

/// Freeze a graph into a snapshot.
///
/// The graph is cloned; the original may continue to be mutated by the
/// wizard layer without affecting the snapshot.
pub fn freeze(
    graph: &NetworkGraph,
    snapshot_id: impl Into<String>,
    created_at: impl Into<String>,
    network_model_id: impl Into<String>,
) -> CoreResult<NetworkSnapshot> {
    let snapshot_id = snapshot_id.into();
    let created_at = created_at.into();
    let network_model_id = network_model_id.into();
    let canonical_graph = graph.to_canonical_value()?;
    let fingerprint = canonical::fingerprint(&json!({
        "graph": canonical_graph,
        "snapshot_id": snapshot_id,
        "created_at": created_at,
        "network_model_id": network_model_id,
    }))?;
    Ok(NetworkSnapshot {
        snapshot_id,
        created_at,
        network_model_id,
        graph: graph.clone(),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Branch, LineBranch, Node, NodeType};

    fn sample_graph(order_swapped: bool) -> NetworkGraph {
        let mut graph = NetworkGraph::new("model-1");
        let slack = Node::new("n1", "GPZ", NodeType::Slack)
            .with_voltage_level(110.0)
            .with_setpoint(1.0, 0.0);
        let load = Node::new("n2", "Odbiór", NodeType::Pq)
            .with_voltage_level(110.0)
            .with_load(1.0, 0.5);
        if order_swapped {
            graph.add_node(load).unwrap();
            graph.add_node(slack).unwrap();
        } else {
            graph.add_node(slack).unwrap();
            graph.add_node(load).unwrap();
        }
        graph
            .add_branch(Branch::Line(
                LineBranch::new("line-1", "L1", "n1", "n2")
                    .with_impedance(0.32, 0.39, 3.5)
                    .with_length(10.0)
                    .with_rated_current(300.0),
            ))
            .unwrap();
        graph
    }

    #[test]
    fn fingerprint_is_stable_across_insertion_order() {
        let a = freeze(&sample_graph(false), "snap-1", "2026-01-01T00:00:00+00:00", "model-1")
            .unwrap();
        let b = freeze(&sample_graph(true), "snap-1", "2026-01-01T00:00:00+00:00", "model-1")
            .unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn metadata_changes_fingerprint() {
        let graph = sample_graph(false);
        let a = freeze(&graph, "snap-1", "2026-01-01T00:00:00+00:00", "model-1").unwrap();
        let b = freeze(&graph, "snap-2", "2026-01-01T00:00:00+00:00", "model-1").unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn snapshot_is_detached_from_graph() {
        let mut graph = sample_graph(false);
        let snap = freeze(&graph, "snap-1", "2026-01-01T00:00:00+00:00", "model-1").unwrap();
        graph.remove_branch("line-1").unwrap();
        assert!(snap.graph.branches.contains_key("line-1"));
    }
}
