//! Diagnostic rules over the raw network graph.
//!
//! Pure data inspection, no physics: each rule scans the graph and emits
//! issues with stable codes (`E-D01`..`E-D08` blockers, `W-D01`..`W-D03`
//! warnings, `I-D01` info). Messages come from the closed Polish table.
//!
//! Diagnostics differ from readiness: readiness asks "can an analysis be
//! attempted on this snapshot", diagnostics ask "is the model self-
//! consistent". The engine surfaces both, with distinct severities.

use crate::messages::message_pl_or_code;
use crate::network::{Branch, NetworkGraph, NodeType};
use serde::Serialize;
use std::collections::BTreeMap;

/// Severity of a diagnostic issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticSeverity {
    Blocker,
    Warn,
    Info,
}

/// A single diagnostic finding.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message_pl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
}

impl DiagnosticIssue {
    fn new(code: &str, severity: DiagnosticSeverity) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message_pl: message_pl_or_code(code).to_string(),
            element_id: None,
            element_type: None,
        }
    }

    fn with_element(mut self, element_id: &str, element_type: &str) -> Self {
        self.element_id = Some(element_id.to_string());
        self.element_type = Some(element_type.to_string());
        self
    }

    fn with_message(mut self, message_pl: String) -> Self {
        self.message_pl = message_pl;
        self
    }
}

/// Collection of diagnostic findings for one graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn has_blockers(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == DiagnosticSeverity::Blocker)
    }

    pub fn blocker_codes(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| i.severity == DiagnosticSeverity::Blocker)
            .map(|i| i.code.as_str())
            .collect()
    }

    pub fn blocker_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == DiagnosticSeverity::Blocker)
            .count()
    }
}

// =============================================================================
// Blocker rules
// =============================================================================

/// E-D01: the graph has nodes but no source of supply (no slack bus and no
/// in-service inverter source).
pub fn rule_e_d01_no_source(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    if graph.nodes.is_empty() || !graph.source_nodes().is_empty() {
        return Vec::new();
    }
    vec![DiagnosticIssue::new("E-D01", DiagnosticSeverity::Blocker)]
}

/// E-D02: a non-transformer branch connects nodes on different voltage
/// levels.
pub fn rule_e_d02_voltage_mismatch(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    let mut issues = Vec::new();
    for branch in graph.branches.values() {
        let Some(conductor) = branch.as_conductor() else {
            continue;
        };
        let (Ok(from), Ok(to)) = (
            graph.get_node(&conductor.from_node_id),
            graph.get_node(&conductor.to_node_id),
        ) else {
            continue;
        };
        let u_from = from.voltage_level_kv.value();
        let u_to = to.voltage_level_kv.value();
        if (u_from - u_to).abs() > 1e-6 {
            issues.push(
                DiagnosticIssue::new("E-D02", DiagnosticSeverity::Blocker)
                    .with_element(conductor.id.as_str(), branch.type_tag())
                    .with_message(format!(
                        "Niezgodność poziomów napięć na gałęzi {}: {} kV / {} kV",
                        conductor.id, u_from, u_to
                    )),
            );
        }
    }
    issues
}

/// E-D03: the in-service topology splits into more than one island.
pub fn rule_e_d03_disconnected_islands(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    if graph.nodes.len() < 2 {
        return Vec::new();
    }
    let components = graph.connected_components(true);
    if components.len() <= 1 {
        return Vec::new();
    }
    vec![DiagnosticIssue::new("E-D03", DiagnosticSeverity::Blocker).with_message(format!(
        "Sieć zawiera rozłączone wyspy ({} wysp)",
        components.len()
    ))]
}

/// E-D04: a transformer is missing the HV or LV side voltage.
pub fn rule_e_d04_transformer_missing_sides(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    graph
        .transformers()
        .filter(|t| t.voltage_hv_kv <= 0.0 || t.voltage_lv_kv <= 0.0)
        .map(|t| {
            DiagnosticIssue::new("E-D04", DiagnosticSeverity::Blocker)
                .with_element(&t.id, "TRANSFORMER")
        })
        .collect()
}

/// E-D05: a line/cable carries neither an impedance nor a catalog
/// reference. Segments with `type_ref` are skipped - the catalog supplies
/// their impedance at resolution time.
pub fn rule_e_d05_line_no_impedance(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    let mut issues = Vec::new();
    for branch in graph.branches.values() {
        let Some(conductor) = branch.as_conductor() else {
            continue;
        };
        if conductor.type_ref.is_some() || conductor.impedance_override.is_some() {
            continue;
        }
        if conductor.r_ohm_per_km <= 0.0 && conductor.x_ohm_per_km <= 0.0 {
            issues.push(
                DiagnosticIssue::new("E-D05", DiagnosticSeverity::Blocker)
                    .with_element(&conductor.id, branch.type_tag()),
            );
        }
    }
    issues
}

/// E-D06: single-phase fault analysis lacks zero-sequence data. Segments
/// bound to a catalog type are assumed to carry Z0 there; WARN severity
/// because balanced analyses remain valid.
pub fn rule_e_d06_sc1f_no_zero_sequence(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    graph
        .conductors()
        .filter(|c| c.type_ref.is_none())
        .map(|c| {
            DiagnosticIssue::new("E-D06", DiagnosticSeverity::Warn).with_element(&c.id, "LINE")
        })
        .collect()
}

/// E-D07: an open switch is the only path to part of the network.
pub fn rule_e_d07_open_switches_isolate(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    if graph.switches.is_empty() {
        return Vec::new();
    }
    let respecting = graph.connected_components(true).len();
    let ignoring = graph.connected_components(false).len();
    if respecting > ignoring {
        return vec![DiagnosticIssue::new("E-D07", DiagnosticSeverity::Blocker)];
    }
    Vec::new()
}

/// E-D08: more than one slack node ends up inside one island.
pub fn rule_e_d08_multiple_slack_in_island(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    let mut issues = Vec::new();
    for island in graph.connected_components(true) {
        let slack_ids: Vec<&String> = island
            .iter()
            .filter(|id| {
                graph
                    .nodes
                    .get(*id)
                    .map(|n| n.node_type == NodeType::Slack)
                    .unwrap_or(false)
            })
            .collect();
        if slack_ids.len() > 1 {
            issues.push(
                DiagnosticIssue::new("E-D08", DiagnosticSeverity::Blocker).with_message(format!(
                    "Więcej niż jeden węzeł bilansujący w jednej wyspie ({})",
                    slack_ids.len()
                )),
            );
        }
    }
    issues
}

// =============================================================================
// Warning and info rules
// =============================================================================

/// W-D01: no element anywhere carries zero-sequence data.
pub fn rule_w_d01_no_zero_sequence_data(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    let has_conductors = graph.conductors().next().is_some();
    let any_z0 = graph.conductors().any(|c| c.type_ref.is_some());
    if has_conductors && !any_z0 {
        return vec![DiagnosticIssue::new("W-D01", DiagnosticSeverity::Warn)];
    }
    Vec::new()
}

/// W-D02: implausible parameters - segment longer than 100 km or a
/// non-positive rated current on a parametrized segment.
pub fn rule_w_d02_extreme_parameters(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    let mut issues = Vec::new();
    for conductor in graph.conductors() {
        if conductor.length_km > 100.0 {
            issues.push(
                DiagnosticIssue::new("W-D02", DiagnosticSeverity::Warn)
                    .with_element(&conductor.id, "LINE")
                    .with_message(format!(
                        "Skrajna długość odcinka {}: {} km",
                        conductor.id, conductor.length_km
                    )),
            );
        } else if conductor.rated_current_a <= 0.0 && conductor.r_ohm_per_km > 0.0 {
            issues.push(
                DiagnosticIssue::new("W-D02", DiagnosticSeverity::Warn)
                    .with_element(&conductor.id, "LINE"),
            );
        }
    }
    issues
}

/// W-D03: more than five sources connected to one node.
pub fn rule_w_d03_multiple_sources(graph: &NetworkGraph) -> Vec<DiagnosticIssue> {
    let mut per_node: BTreeMap<&str, usize> = BTreeMap::new();
    for source in graph.inverter_sources.values() {
        *per_node.entry(source.node_id.as_str()).or_insert(0) += 1;
    }
    per_node
        .into_iter()
        .filter(|(_, count)| *count > 5)
        .map(|(node_id, _)| {
            DiagnosticIssue::new("W-D03", DiagnosticSeverity::Warn).with_element(node_id, "Bus")
        })
        .collect()
}

/// I-D01: informational - no blockers, full analysis available.
pub fn rule_i_d01_full_analysis_available(blockers: &[DiagnosticIssue]) -> Vec<DiagnosticIssue> {
    if blockers
        .iter()
        .any(|i| i.severity == DiagnosticSeverity::Blocker)
    {
        return Vec::new();
    }
    vec![DiagnosticIssue::new("I-D01", DiagnosticSeverity::Info)]
}

/// Run the full rule set and collect the issues sorted by
/// `(severity, code, element_id)`.
pub fn run_diagnostics(graph: &NetworkGraph) -> Diagnostics {
    let mut issues = Vec::new();
    issues.extend(rule_e_d01_no_source(graph));
    issues.extend(rule_e_d02_voltage_mismatch(graph));
    issues.extend(rule_e_d03_disconnected_islands(graph));
    issues.extend(rule_e_d04_transformer_missing_sides(graph));
    issues.extend(rule_e_d05_line_no_impedance(graph));
    issues.extend(rule_e_d06_sc1f_no_zero_sequence(graph));
    issues.extend(rule_e_d07_open_switches_isolate(graph));
    issues.extend(rule_e_d08_multiple_slack_in_island(graph));
    issues.extend(rule_w_d01_no_zero_sequence_data(graph));
    issues.extend(rule_w_d02_extreme_parameters(graph));
    issues.extend(rule_w_d03_multiple_sources(graph));
    let info = rule_i_d01_full_analysis_available(&issues);
    issues.extend(info);
    issues.sort_by(|a, b| {
        (a.severity, &a.code, &a.element_id).cmp(&(b.severity, &b.code, &b.element_id))
    });
    Diagnostics { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        Branch, InverterSource, LineBranch, Node, Switch, SwitchState, SwitchType,
        TransformerBranch,
    };

    fn valid_graph() -> NetworkGraph {
        let mut g = NetworkGraph::new("test-model");
        g.add_node(
            Node::new("bus-1", "Szyna A", NodeType::Slack)
                .with_voltage_level(20.0)
                .with_setpoint(1.0, 0.0),
        )
        .unwrap();
        g.add_node(
            Node::new("bus-2", "Szyna B", NodeType::Pq)
                .with_voltage_level(20.0)
                .with_load(3.0, 1.0),
        )
        .unwrap();
        g.add_branch(Branch::Line(
            LineBranch::new("line-1", "Linia", "bus-1", "bus-2")
                .with_impedance(0.1, 0.3, 0.0)
                .with_length(5.0)
                .with_rated_current(300.0),
        ))
        .unwrap();
        g
    }

    #[test]
    fn e_d01_detects_missing_source() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("bus-1", "A", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        assert_eq!(rule_e_d01_no_source(&g)[0].code, "E-D01");
        assert!(rule_e_d01_no_source(&valid_graph()).is_empty());
    }

    #[test]
    fn e_d01_inverter_counts_as_source() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("bus-1", "A", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_inverter_source(InverterSource::new("inv-1", "OZE-1", "bus-1", 100.0, 1.1))
            .unwrap();
        assert!(rule_e_d01_no_source(&g).is_empty());
    }

    #[test]
    fn e_d02_detects_voltage_mismatch() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(110.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Line(
            LineBranch::new("line-1", "L", "a", "b").with_impedance(0.1, 0.3, 0.0),
        ))
        .unwrap();
        let issues = rule_e_d02_voltage_mismatch(&g);
        assert_eq!(issues[0].code, "E-D02");
        assert!(issues[0].message_pl.contains("110") && issues[0].message_pl.contains("20"));
    }

    #[test]
    fn e_d02_ignores_transformers() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("hv", "GN", NodeType::Slack).with_voltage_level(110.0))
            .unwrap();
        g.add_node(Node::new("lv", "DN", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Transformer(
            TransformerBranch::new("tr-1", "TR1", "hv", "lv")
                .with_rating(40.0, 110.0, 20.0, 10.0, 100.0),
        ))
        .unwrap();
        assert!(rule_e_d02_voltage_mismatch(&g).is_empty());
    }

    #[test]
    fn e_d03_detects_islands() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        let issues = rule_e_d03_disconnected_islands(&g);
        assert_eq!(issues[0].code, "E-D03");
        assert_eq!(issues[0].severity, DiagnosticSeverity::Blocker);
        assert!(rule_e_d03_disconnected_islands(&valid_graph()).is_empty());
    }

    #[test]
    fn e_d04_detects_missing_transformer_side() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("hv", "GN", NodeType::Slack).with_voltage_level(110.0))
            .unwrap();
        g.add_node(Node::new("lv", "DN", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Transformer(
            TransformerBranch::new("tr-1", "TR1", "hv", "lv")
                .with_rating(40.0, 0.0, 20.0, 10.0, 100.0),
        ))
        .unwrap();
        assert_eq!(rule_e_d04_transformer_missing_sides(&g)[0].code, "E-D04");
    }

    #[test]
    fn e_d05_skips_catalog_bound_lines() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Line(
            LineBranch::new("line-1", "L", "a", "b")
                .with_length(1.0)
                .with_type_ref("YAKY-240"),
        ))
        .unwrap();
        assert!(rule_e_d05_line_no_impedance(&g).is_empty());
        assert!(rule_e_d06_sc1f_no_zero_sequence(&g).is_empty());
    }

    #[test]
    fn e_d05_detects_zero_impedance() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Line(
            LineBranch::new("line-1", "L", "a", "b").with_length(1.0),
        ))
        .unwrap();
        assert_eq!(rule_e_d05_line_no_impedance(&g)[0].code, "E-D05");
    }

    #[test]
    fn e_d06_is_warn_severity() {
        let issues = rule_e_d06_sc1f_no_zero_sequence(&valid_graph());
        assert_eq!(issues[0].code, "E-D06");
        assert_eq!(issues[0].severity, DiagnosticSeverity::Warn);
    }

    #[test]
    fn e_d07_detects_isolating_open_switch() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_switch(Switch::new(
            "sw-1",
            "Q1",
            "a",
            "b",
            SwitchType::Breaker,
            SwitchState::Open,
        ))
        .unwrap();
        assert_eq!(rule_e_d07_open_switches_isolate(&g)[0].code, "E-D07");
    }

    #[test]
    fn e_d08_detects_double_slack() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Line(
            LineBranch::new("line-1", "L", "a", "b").with_impedance(0.1, 0.3, 0.0),
        ))
        .unwrap();
        assert_eq!(rule_e_d08_multiple_slack_in_island(&g)[0].code, "E-D08");
    }

    #[test]
    fn w_d02_flags_long_segment() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_branch(Branch::Line(
            LineBranch::new("line-1", "Linia Długa", "a", "b")
                .with_impedance(0.1, 0.3, 0.0)
                .with_length(200.0)
                .with_rated_current(300.0),
        ))
        .unwrap();
        assert!(rule_w_d02_extreme_parameters(&g)
            .iter()
            .any(|i| i.code == "W-D02"));
    }

    #[test]
    fn w_d03_flags_crowded_node() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Slack).with_voltage_level(20.0))
            .unwrap();
        for i in 0..6 {
            g.add_inverter_source(InverterSource::new(
                format!("inv-{i}"),
                format!("OZE-{i}"),
                "a",
                100.0,
                1.1,
            ))
            .unwrap();
        }
        assert_eq!(rule_w_d03_multiple_sources(&g)[0].code, "W-D03");
    }

    #[test]
    fn i_d01_only_without_blockers() {
        assert_eq!(rule_i_d01_full_analysis_available(&[])[0].code, "I-D01");
        let blocker = DiagnosticIssue::new("E-D01", DiagnosticSeverity::Blocker);
        assert!(rule_i_d01_full_analysis_available(&[blocker]).is_empty());
    }

    #[test]
    fn full_run_sorts_blockers_first() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        g.add_node(Node::new("b", "B", NodeType::Pq).with_voltage_level(20.0))
            .unwrap();
        let diag = run_diagnostics(&g);
        assert!(diag.has_blockers());
        assert!(diag.blocker_codes().contains(&"E-D01"));
        assert!(diag.blocker_codes().contains(&"E-D03"));
        assert_eq!(diag.issues[0].severity, DiagnosticSeverity::Blocker);
    }
}
