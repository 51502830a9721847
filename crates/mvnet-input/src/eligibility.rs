//! Eligibility: can this analysis variant be attempted on this network?
//!
//! Eligibility is checked before building the payload and attached to the
//! envelope even when negative, so diagnostics stay complete. Codes are
//! contractual; messages come from the closed Polish table.

use crate::contracts::{EligibilityIssue, EligibilityResult, IssueSeverity, SolverAnalysisType};
use mvnet_catalog::CatalogRepository;
use mvnet_core::messages::message_pl_or_code;
use mvnet_core::network::{NetworkGraph, NodeType};
use mvnet_core::readiness::{FixAction, FixActionType};

fn blocker(code: &str) -> EligibilityIssue {
    EligibilityIssue {
        code: code.to_string(),
        severity: IssueSeverity::Blocker,
        message_pl: message_pl_or_code(code).to_string(),
        element_ref: None,
        element_type: None,
        fix_action: None,
    }
}

fn open_modal(modal_type: &str) -> FixAction {
    FixAction {
        action_type: FixActionType::OpenModal,
        element_ref: None,
        modal_type: Some(modal_type.to_string()),
        payload_hint: None,
    }
}

/// True when every in-service conductor can supply zero-sequence data
/// (through its catalog binding).
pub fn zero_sequence_available(graph: &NetworkGraph, catalog: Option<&CatalogRepository>) -> bool {
    let mut conductors = graph.conductors().filter(|c| c.in_service).peekable();
    if conductors.peek().is_none() {
        return false;
    }
    conductors.all(|conductor| {
        let Some(type_ref) = &conductor.type_ref else {
            return false;
        };
        let Some(repo) = catalog else { return false };
        repo.get_cable_type(type_ref)
            .or_else(|| repo.get_line_type(type_ref))
            .map(|t| t.has_zero_sequence())
            .unwrap_or(false)
    })
}

/// Check whether `analysis_type` is admissible.
///
/// `fault_node_id` is required for every short-circuit variant. The 2F
/// variant runs with Z₂ = Z₁ when no negative-sequence data exists, so it
/// carries no data blocker of its own.
pub fn check_eligibility(
    graph: &NetworkGraph,
    catalog: Option<&CatalogRepository>,
    analysis_type: SolverAnalysisType,
    fault_node_id: Option<&str>,
) -> EligibilityResult {
    let mut blockers: Vec<EligibilityIssue> = Vec::new();
    let warnings: Vec<EligibilityIssue> = Vec::new();

    if analysis_type.is_short_circuit() {
        match fault_node_id {
            Some(node_id) if !node_id.trim().is_empty() => {
                if !graph.nodes.contains_key(node_id.trim()) {
                    let mut issue = blocker("ELIG_FAULT_NODE_EMPTY");
                    issue.element_ref = Some(node_id.to_string());
                    issue.fix_action = Some(FixAction {
                        action_type: FixActionType::NavigateToElement,
                        element_ref: Some(node_id.to_string()),
                        modal_type: None,
                        payload_hint: None,
                    });
                    blockers.push(issue);
                }
            }
            _ => {
                let mut issue = blocker("ELIG_FAULT_NODE_EMPTY");
                issue.fix_action = Some(FixAction {
                    action_type: FixActionType::NavigateToElement,
                    element_ref: None,
                    modal_type: None,
                    payload_hint: None,
                });
                blockers.push(issue);
            }
        }
    }

    if matches!(
        analysis_type,
        SolverAnalysisType::Sc1f | SolverAnalysisType::Sc2fg
    ) && !zero_sequence_available(graph, catalog)
    {
        let mut issue = blocker("ELIG_SC1F_NO_Z0");
        issue.fix_action = Some(open_modal("Uzupełnij Z0"));
        blockers.push(issue);
    }

    if analysis_type == SolverAnalysisType::LoadFlow && graph.slack_nodes().is_empty() {
        let mut issue = blocker("ELIG_NO_SLACK");
        issue.fix_action = Some(FixAction {
            action_type: FixActionType::AddMissingDevice,
            element_ref: None,
            modal_type: None,
            payload_hint: None,
        });
        blockers.push(issue);
    }

    EligibilityResult::new(analysis_type, blockers, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvnet_catalog::{CatalogDump, ConductorType};
    use mvnet_core::network::{Branch, LineBranch, Node};

    fn graph_with_cable(type_ref: Option<&str>) -> NetworkGraph {
        let mut g = NetworkGraph::new("m");
        g.add_node(
            Node::new("gpz", "GPZ", NodeType::Slack)
                .with_voltage_level(15.0)
                .with_setpoint(1.0, 0.0),
        )
        .unwrap();
        g.add_node(
            Node::new("st-1", "Stacja", NodeType::Pq)
                .with_voltage_level(15.0)
                .with_load(1.0, 0.2),
        )
        .unwrap();
        let mut cable = LineBranch::new("cab-1", "K1", "gpz", "st-1")
            .with_impedance(0.253, 0.073, 0.0)
            .with_length(0.5);
        if let Some(type_ref) = type_ref {
            cable = cable.with_type_ref(type_ref);
        }
        g.add_branch(Branch::Cable(cable)).unwrap();
        g
    }

    fn catalog_with_z0() -> CatalogRepository {
        CatalogRepository::from_dump(CatalogDump {
            cable_types: vec![ConductorType {
                id: "XRUHAKXS-120".to_string(),
                name: "XRUHAKXS 120".to_string(),
                r_ohm_per_km: 0.253,
                x_ohm_per_km: 0.073,
                b_us_per_km: 0.0,
                rated_current_a: 310.0,
                r0_ohm_per_km: Some(1.01),
                x0_ohm_per_km: Some(0.29),
            }],
            ..CatalogDump::default()
        })
        .unwrap()
    }

    #[test]
    fn sc3f_with_fault_node_is_eligible() {
        let graph = graph_with_cable(None);
        let result = check_eligibility(&graph, None, SolverAnalysisType::Sc3f, Some("st-1"));
        assert!(result.eligible, "{:?}", result.blocker_codes());
    }

    #[test]
    fn missing_fault_node_blocks() {
        let graph = graph_with_cable(None);
        let result = check_eligibility(&graph, None, SolverAnalysisType::Sc3f, None);
        assert_eq!(result.blocker_codes(), vec!["ELIG_FAULT_NODE_EMPTY"]);
        let result = check_eligibility(&graph, None, SolverAnalysisType::Sc3f, Some("  "));
        assert!(!result.eligible);
    }

    #[test]
    fn sc1f_without_z0_blocks_with_single_code() {
        let graph = graph_with_cable(None);
        let result = check_eligibility(&graph, None, SolverAnalysisType::Sc1f, Some("st-1"));
        assert!(!result.eligible);
        assert_eq!(result.blocker_codes(), vec!["ELIG_SC1F_NO_Z0"]);
        let modal = result.blockers[0].fix_action.as_ref().unwrap();
        assert_eq!(modal.action_type, FixActionType::OpenModal);
    }

    #[test]
    fn sc1f_with_catalog_z0_is_eligible() {
        let graph = graph_with_cable(Some("XRUHAKXS-120"));
        let catalog = catalog_with_z0();
        let result =
            check_eligibility(&graph, Some(&catalog), SolverAnalysisType::Sc1f, Some("st-1"));
        assert!(result.eligible, "{:?}", result.blocker_codes());
    }

    #[test]
    fn sc2f_runs_on_positive_sequence_only() {
        let graph = graph_with_cable(None);
        let result = check_eligibility(&graph, None, SolverAnalysisType::Sc2f, Some("st-1"));
        assert!(result.eligible);
    }

    #[test]
    fn load_flow_without_slack_blocks() {
        let mut g = NetworkGraph::new("m");
        g.add_node(Node::new("a", "A", NodeType::Pq).with_voltage_level(15.0))
            .unwrap();
        let result = check_eligibility(&g, None, SolverAnalysisType::LoadFlow, None);
        assert_eq!(result.blocker_codes(), vec!["ELIG_NO_SLACK"]);
    }
}
