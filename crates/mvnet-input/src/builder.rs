//! Deterministic solver-input builder.
//!
//! Transforms graph + catalog + study-case config into a canonical
//! [`SolverInputEnvelope`] with a full provenance trace.
//!
//! Invariants:
//! - Identical graph + catalog + config produce identical envelope bytes.
//! - Element arrays sorted by `ref_id`; trace sorted by
//!   `(element_ref, field_path)`.
//! - No heuristics and no default physical values: a field with no source
//!   is recorded as `Derived("no_source")` and blocks eligibility, the
//!   payload stays partial.

use crate::contracts::{
    BranchPayload, BusPayload, EligibilityIssue, EligibilityResult, InverterSourcePayload,
    IssueSeverity, LoadFlowPayload, ShortCircuitPayload, SolverAnalysisType, SolverInputEnvelope,
    SolverPayload, StudyCaseConfig, SwitchPayload, TransformerPayload,
    SOLVER_INPUT_CONTRACT_VERSION,
};
use crate::eligibility::check_eligibility;
use crate::provenance::{
    build_provenance_summary, compute_value_hash, ProvenanceEntry, SourceKind, SourceRef,
};
use crate::InputResult;
use mvnet_catalog::CatalogRepository;
use mvnet_core::messages::message_pl_or_code;
use mvnet_core::network::{Branch, NetworkGraph, NodeType};

/// Inputs of one build.
#[derive(Clone, Copy)]
pub struct BuildRequest<'a> {
    pub graph: &'a NetworkGraph,
    pub catalog: Option<&'a CatalogRepository>,
    pub case_id: &'a str,
    pub enm_revision: &'a str,
    pub analysis_type: SolverAnalysisType,
    pub config: &'a StudyCaseConfig,
    /// Fault location, required for short-circuit variants.
    pub fault_node_id: Option<&'a str>,
}

fn node_type_tag(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Slack => "SLACK",
        NodeType::Pv => "PV",
        NodeType::Pq => "PQ",
    }
}

fn build_bus_payloads(graph: &NetworkGraph) -> Vec<BusPayload> {
    graph
        .nodes
        .values()
        .map(|node| BusPayload {
            ref_id: node.id.clone(),
            name: node.name.clone(),
            node_type: node_type_tag(node.node_type).to_string(),
            voltage_level_kv: node.voltage_level_kv.value(),
            voltage_magnitude_pu: node.v_mag_pu.value(),
            voltage_angle_rad: node.v_angle_rad.value(),
            active_power_mw: node.p_mw.value(),
            reactive_power_mvar: node.q_mvar.value(),
            sk3_mva: node.sk3_mva.map(|s| s.value()),
            in_service: node.in_service,
        })
        .collect()
}

fn build_branch_payloads(
    graph: &NetworkGraph,
    catalog: Option<&CatalogRepository>,
    trace: &mut Vec<ProvenanceEntry>,
    extra_blockers: &mut Vec<EligibilityIssue>,
) -> InputResult<Vec<BranchPayload>> {
    let mut payloads = Vec::new();

    for branch in graph.branches.values() {
        let Some(conductor) = branch.as_conductor() else {
            continue;
        };
        let is_cable = matches!(branch, Branch::Cable(_));

        let mut r = conductor.r_ohm_per_km;
        let mut x = conductor.x_ohm_per_km;
        let mut b_us = conductor.b_us_per_km;
        let mut rated_a = conductor.rated_current_a;
        let mut r0 = None;
        let mut x0 = None;
        let mut catalog_ref = None;

        let (source_kind, source_ref) = if let Some(over) = &conductor.impedance_override {
            // Override carries totals; per-km values are derived from the
            // segment length.
            if conductor.length_km > 0.0 {
                r = over.r_total_ohm / conductor.length_km;
                x = over.x_total_ohm / conductor.length_km;
                b_us = over.b_total_us / conductor.length_km;
            }
            (
                SourceKind::Override,
                SourceRef::override_with("impedance_override provided on instance"),
            )
        } else if let (Some(type_ref), Some(repo)) = (&conductor.type_ref, catalog) {
            let type_data = if is_cable {
                repo.get_cable_type(type_ref)
            } else {
                repo.get_line_type(type_ref)
            };
            match type_data {
                Some(record) => {
                    r = record.r_ohm_per_km;
                    x = record.x_ohm_per_km;
                    b_us = record.b_us_per_km;
                    rated_a = record.rated_current_a;
                    r0 = record.r0_ohm_per_km;
                    x0 = record.x0_ohm_per_km;
                    catalog_ref = Some(type_ref.clone());
                    let namespace = if is_cable { "cable" } else { "line" };
                    (
                        SourceKind::Catalog,
                        SourceRef::catalog(type_ref, format!("{namespace}_types[{type_ref}]")),
                    )
                }
                None => (
                    SourceKind::Derived,
                    SourceRef::derived("type_ref_not_found_fallback_to_instance"),
                ),
            }
        } else if conductor.type_ref.is_some() {
            (
                SourceKind::Derived,
                SourceRef::derived("type_ref_present_but_catalog_unavailable"),
            )
        } else if r > 0.0 || x > 0.0 {
            (SourceKind::Derived, SourceRef::derived("instance_parameters"))
        } else {
            // Nothing can supply an impedance for this segment.
            let mut issue = EligibilityIssue {
                code: "ELIG_NO_SOURCE".to_string(),
                severity: IssueSeverity::Blocker,
                message_pl: message_pl_or_code("ELIG_NO_SOURCE").to_string(),
                element_ref: Some(conductor.id.clone()),
                element_type: Some(branch.type_tag().to_string()),
                fix_action: None,
            };
            issue.fix_action = Some(mvnet_core::readiness::FixAction::select_catalog(
                &conductor.id,
            ));
            extra_blockers.push(issue);
            (SourceKind::Derived, SourceRef::derived("no_source"))
        };

        for (field_name, value, unit) in [
            ("r_ohm_per_km", r, "ohm/km"),
            ("x_ohm_per_km", x, "ohm/km"),
            ("b_us_per_km", b_us, "uS/km"),
            ("rated_current_a", rated_a, "A"),
        ] {
            trace.push(ProvenanceEntry {
                element_ref: conductor.id.clone(),
                field_path: format!("branches[ref_id={}].{field_name}", conductor.id),
                source_kind,
                source_ref: source_ref.clone(),
                value_hash: compute_value_hash(value)?,
                unit: Some(unit.to_string()),
                note: None,
            });
        }

        // Length is always instance topology data.
        trace.push(ProvenanceEntry {
            element_ref: conductor.id.clone(),
            field_path: format!("branches[ref_id={}].length_km", conductor.id),
            source_kind: SourceKind::Derived,
            source_ref: SourceRef::derived("instance_topology_length"),
            value_hash: compute_value_hash(conductor.length_km)?,
            unit: Some("km".to_string()),
            note: None,
        });

        payloads.push(BranchPayload {
            ref_id: conductor.id.clone(),
            name: conductor.name.clone(),
            branch_type: branch.type_tag().to_string(),
            from_bus_ref: conductor.from_node_id.clone(),
            to_bus_ref: conductor.to_node_id.clone(),
            r_ohm_per_km: r,
            x_ohm_per_km: x,
            b_us_per_km: b_us,
            length_km: conductor.length_km,
            rated_current_a: rated_a,
            r0_ohm_per_km: r0,
            x0_ohm_per_km: x0,
            in_service: conductor.in_service,
            catalog_ref,
        });
    }

    Ok(payloads)
}

fn build_transformer_payloads(
    graph: &NetworkGraph,
    catalog: Option<&CatalogRepository>,
    trace: &mut Vec<ProvenanceEntry>,
) -> InputResult<Vec<TransformerPayload>> {
    let mut payloads = Vec::new();

    for trafo in graph.transformers() {
        let mut rated_power = trafo.rated_power_mva;
        let mut v_hv = trafo.voltage_hv_kv;
        let mut v_lv = trafo.voltage_lv_kv;
        let mut uk = trafo.uk_percent;
        let mut pk = trafo.pk_kw;
        let mut i0 = trafo.i0_percent;
        let mut p0 = trafo.p0_kw;
        let mut vector_group = trafo.vector_group.clone();
        let mut catalog_ref = None;

        let (source_kind, source_ref) = match (&trafo.type_ref, catalog) {
            (Some(type_ref), Some(repo)) => match repo.get_transformer_type(type_ref) {
                Some(record) => {
                    rated_power = record.rated_power_mva;
                    v_hv = record.voltage_hv_kv;
                    v_lv = record.voltage_lv_kv;
                    uk = record.uk_percent;
                    pk = record.pk_kw;
                    i0 = record.i0_percent;
                    p0 = record.p0_kw;
                    vector_group = record.vector_group.clone();
                    catalog_ref = Some(type_ref.clone());
                    (
                        SourceKind::Catalog,
                        SourceRef::catalog(type_ref, format!("transformer_types[{type_ref}]")),
                    )
                }
                None => (
                    SourceKind::Derived,
                    SourceRef::derived("type_ref_not_found_fallback_to_instance"),
                ),
            },
            _ => (SourceKind::Derived, SourceRef::derived("instance_parameters")),
        };

        for (field_name, value, unit) in [
            ("rated_power_mva", rated_power, "MVA"),
            ("voltage_hv_kv", v_hv, "kV"),
            ("voltage_lv_kv", v_lv, "kV"),
            ("uk_percent", uk, "%"),
            ("pk_kw", pk, "kW"),
            ("i0_percent", i0, "%"),
            ("p0_kw", p0, "kW"),
        ] {
            trace.push(ProvenanceEntry {
                element_ref: trafo.id.clone(),
                field_path: format!("transformers[ref_id={}].{field_name}", trafo.id),
                source_kind,
                source_ref: source_ref.clone(),
                value_hash: compute_value_hash(value)?,
                unit: Some(unit.to_string()),
                note: None,
            });
        }

        payloads.push(TransformerPayload {
            ref_id: trafo.id.clone(),
            name: trafo.name.clone(),
            from_bus_ref: trafo.from_node_id.clone(),
            to_bus_ref: trafo.to_node_id.clone(),
            rated_power_mva: rated_power,
            voltage_hv_kv: v_hv,
            voltage_lv_kv: v_lv,
            uk_percent: uk,
            pk_kw: pk,
            i0_percent: i0,
            p0_kw: p0,
            vector_group,
            tap_position: trafo.tap_position,
            tap_step_percent: trafo.tap_step_percent,
            in_service: trafo.in_service,
            catalog_ref,
        });
    }

    Ok(payloads)
}

fn build_inverter_payloads(
    graph: &NetworkGraph,
    catalog: Option<&CatalogRepository>,
    trace: &mut Vec<ProvenanceEntry>,
) -> InputResult<Vec<InverterSourcePayload>> {
    let mut payloads = Vec::new();

    for source in graph.inverter_sources.values() {
        let mut in_rated = source.in_rated_a;
        let mut k_sc = source.k_sc;
        let catalog_ref = source.type_ref.clone();

        let (source_kind, source_ref) = match (&source.type_ref, catalog) {
            (Some(type_ref), Some(repo)) => match repo.get_inverter_type(type_ref) {
                Some(record) => {
                    in_rated = record.in_rated_a;
                    k_sc = record.k_sc;
                    (
                        SourceKind::Catalog,
                        SourceRef::catalog(type_ref, format!("inverter_types[{type_ref}]")),
                    )
                }
                None => (
                    SourceKind::Derived,
                    SourceRef::derived("type_ref_not_found_fallback_to_instance"),
                ),
            },
            (Some(type_ref), None) => (
                SourceKind::Catalog,
                SourceRef::catalog(type_ref, format!("inverter_types[{type_ref}]")),
            ),
            _ => (SourceKind::Derived, SourceRef::derived("instance_parameters")),
        };

        for (field_name, value, unit) in [("in_rated_a", in_rated, Some("A")), ("k_sc", k_sc, None)]
        {
            trace.push(ProvenanceEntry {
                element_ref: source.id.clone(),
                field_path: format!("inverter_sources[ref_id={}].{field_name}", source.id),
                source_kind,
                source_ref: source_ref.clone(),
                value_hash: compute_value_hash(value)?,
                unit: unit.map(|u| u.to_string()),
                note: None,
            });
        }

        payloads.push(InverterSourcePayload {
            ref_id: source.id.clone(),
            name: source.name.clone(),
            bus_ref: source.node_id.clone(),
            converter_kind: source.converter_kind.map(|kind| {
                match kind {
                    mvnet_core::network::ConverterKind::Pv => "PV",
                    mvnet_core::network::ConverterKind::Bess => "BESS",
                    mvnet_core::network::ConverterKind::Wind => "WIND",
                }
                .to_string()
            }),
            in_rated_a: in_rated,
            k_sc,
            contributes_negative_sequence: source.contributes_negative_sequence,
            contributes_zero_sequence: source.contributes_zero_sequence,
            in_service: source.in_service,
            catalog_ref,
        });
    }

    Ok(payloads)
}

fn build_switch_payloads(graph: &NetworkGraph) -> Vec<SwitchPayload> {
    graph
        .switches
        .values()
        .map(|switch| SwitchPayload {
            ref_id: switch.id.clone(),
            name: switch.name.clone(),
            switch_type: match switch.switch_type {
                mvnet_core::network::SwitchType::Breaker => "BREAKER",
                mvnet_core::network::SwitchType::Disconnector => "DISCONNECTOR",
                mvnet_core::network::SwitchType::LoadSwitch => "LOAD_SWITCH",
                mvnet_core::network::SwitchType::Recloser => "RECLOSER",
                mvnet_core::network::SwitchType::Fuse => "FUSE",
            }
            .to_string(),
            from_bus_ref: switch.from_node_id.clone(),
            to_bus_ref: switch.to_node_id.clone(),
            state: match switch.state {
                mvnet_core::network::SwitchState::Open => "OPEN".to_string(),
                mvnet_core::network::SwitchState::Closed => "CLOSED".to_string(),
            },
            in_service: switch.in_service,
        })
        .collect()
}

/// Build the canonical solver-input envelope.
///
/// The single entry point for solver-input generation. The payload and
/// trace are built even when the analysis is ineligible, so diagnostics
/// remain complete.
pub fn build_solver_input(request: &BuildRequest) -> InputResult<SolverInputEnvelope> {
    let BuildRequest {
        graph,
        catalog,
        case_id,
        enm_revision,
        analysis_type,
        config,
        fault_node_id,
    } = *request;

    let eligibility = check_eligibility(graph, catalog, analysis_type, fault_node_id);

    let mut trace: Vec<ProvenanceEntry> = Vec::new();
    let mut extra_blockers: Vec<EligibilityIssue> = Vec::new();

    let buses = build_bus_payloads(graph);
    let branches = build_branch_payloads(graph, catalog, &mut trace, &mut extra_blockers)?;
    let transformers = build_transformer_payloads(graph, catalog, &mut trace)?;
    let inverter_sources = build_inverter_payloads(graph, catalog, &mut trace)?;
    let switches = build_switch_payloads(graph);

    let payload = match analysis_type {
        SolverAnalysisType::LoadFlow => Some(SolverPayload::LoadFlow(LoadFlowPayload {
            buses,
            branches,
            transformers,
            inverter_sources,
            switches,
            base_mva: config.base_mva,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        })),
        _ => Some(SolverPayload::ShortCircuit(ShortCircuitPayload {
            buses,
            branches,
            transformers,
            inverter_sources,
            switches,
            base_mva: config.base_mva,
            c_factor: config.c_factor_max,
            thermal_time_seconds: config.thermal_time_seconds,
            include_inverter_contribution: config.include_inverter_contribution,
        })),
    };

    trace.sort_by(|a, b| {
        (&a.element_ref, &a.field_path).cmp(&(&b.element_ref, &b.field_path))
    });
    let provenance_summary = build_provenance_summary(&trace);

    let mut blockers = eligibility.blockers;
    blockers.extend(extra_blockers);
    let eligibility = EligibilityResult::new(analysis_type, blockers, eligibility.warnings);

    Ok(SolverInputEnvelope {
        solver_input_version: SOLVER_INPUT_CONTRACT_VERSION.to_string(),
        case_id: case_id.to_string(),
        enm_revision: enm_revision.to_string(),
        analysis_type,
        eligibility,
        provenance_summary,
        payload,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvnet_catalog::{CatalogDump, ConductorType};
    use mvnet_core::network::{ImpedanceOverride, LineBranch, Node};

    fn cable_type() -> ConductorType {
        ConductorType {
            id: "XRUHAKXS-120".to_string(),
            name: "XRUHAKXS 120".to_string(),
            r_ohm_per_km: 0.253,
            x_ohm_per_km: 0.073,
            b_us_per_km: 0.0,
            rated_current_a: 310.0,
            r0_ohm_per_km: Some(1.01),
            x0_ohm_per_km: Some(0.29),
        }
    }

    fn catalog() -> CatalogRepository {
        CatalogRepository::from_dump(CatalogDump {
            cable_types: vec![cable_type()],
            ..CatalogDump::default()
        })
        .unwrap()
    }

    fn base_graph() -> NetworkGraph {
        let mut g = NetworkGraph::new("model-1");
        g.add_node(
            Node::new("gpz", "GPZ", NodeType::Slack)
                .with_voltage_level(15.0)
                .with_setpoint(1.0, 0.0)
                .with_sk3(250.0),
        )
        .unwrap();
        g.add_node(
            Node::new("st-1", "Stacja 1", NodeType::Pq)
                .with_voltage_level(15.0)
                .with_load(1.0, 0.2),
        )
        .unwrap();
        g
    }

    fn request<'a>(
        graph: &'a NetworkGraph,
        catalog: Option<&'a CatalogRepository>,
        config: &'a StudyCaseConfig,
        analysis_type: SolverAnalysisType,
    ) -> BuildRequest<'a> {
        BuildRequest {
            graph,
            catalog,
            case_id: "case-1",
            enm_revision: "rev-1",
            analysis_type,
            config,
            fault_node_id: Some("st-1"),
        }
    }

    fn trace_kinds_for<'a>(
        envelope: &'a SolverInputEnvelope,
        element: &str,
        field: &str,
    ) -> Vec<&'a ProvenanceEntry> {
        envelope
            .trace
            .iter()
            .filter(|e| e.element_ref == element && e.field_path.ends_with(field))
            .collect()
    }

    #[test]
    fn override_wins_over_catalog() {
        let mut graph = base_graph();
        let mut cable = LineBranch::new("cab-1", "K1", "gpz", "st-1")
            .with_length(2.0)
            .with_type_ref("XRUHAKXS-120");
        cable.impedance_override = Some(ImpedanceOverride {
            r_total_ohm: 1.0,
            x_total_ohm: 0.4,
            b_total_us: 0.0,
        });
        graph.add_branch(Branch::Cable(cable)).unwrap();

        let cat = catalog();
        let config = StudyCaseConfig::default();
        let envelope =
            build_solver_input(&request(&graph, Some(&cat), &config, SolverAnalysisType::Sc3f))
                .unwrap();

        let entries = trace_kinds_for(&envelope, "cab-1", "r_ohm_per_km");
        assert_eq!(entries[0].source_kind, SourceKind::Override);
        let Some(SolverPayload::ShortCircuit(payload)) = &envelope.payload else {
            panic!("expected SC payload");
        };
        assert!((payload.branches[0].r_ohm_per_km - 0.5).abs() < 1e-12);
        assert_eq!(envelope.provenance_summary.overrides_used_refs, vec!["cab-1"]);
    }

    #[test]
    fn catalog_resolution_records_catalog_kind() {
        let mut graph = base_graph();
        graph
            .add_branch(Branch::Cable(
                LineBranch::new("cab-1", "K1", "gpz", "st-1")
                    .with_length(0.5)
                    .with_type_ref("XRUHAKXS-120"),
            ))
            .unwrap();
        let cat = catalog();
        let config = StudyCaseConfig::default();
        let envelope =
            build_solver_input(&request(&graph, Some(&cat), &config, SolverAnalysisType::Sc3f))
                .unwrap();

        let entries = trace_kinds_for(&envelope, "cab-1", "r_ohm_per_km");
        assert_eq!(entries[0].source_kind, SourceKind::Catalog);
        assert_eq!(
            entries[0].source_ref.catalog_ref.as_deref(),
            Some("XRUHAKXS-120")
        );
        assert_eq!(
            envelope.provenance_summary.catalog_refs_used,
            vec!["XRUHAKXS-120"]
        );
        let Some(SolverPayload::ShortCircuit(payload)) = &envelope.payload else {
            panic!("expected SC payload");
        };
        assert_eq!(payload.branches[0].r0_ohm_per_km, Some(1.01));
    }

    #[test]
    fn instance_parameters_record_derived_kind() {
        let mut graph = base_graph();
        graph
            .add_branch(Branch::Cable(
                LineBranch::new("cab-1", "K1", "gpz", "st-1")
                    .with_impedance(0.253, 0.073, 0.0)
                    .with_length(0.5),
            ))
            .unwrap();
        let config = StudyCaseConfig::default();
        let envelope =
            build_solver_input(&request(&graph, None, &config, SolverAnalysisType::Sc3f)).unwrap();

        let entries = trace_kinds_for(&envelope, "cab-1", "r_ohm_per_km");
        assert_eq!(entries[0].source_kind, SourceKind::Derived);
        assert_eq!(
            entries[0].source_ref.derivation_rule.as_deref(),
            Some("instance_parameters")
        );
        assert!(envelope.eligibility.eligible);
    }

    #[test]
    fn no_source_blocks_eligibility() {
        let mut graph = base_graph();
        graph
            .add_branch(Branch::Cable(
                LineBranch::new("cab-1", "K1", "gpz", "st-1").with_length(0.5),
            ))
            .unwrap();
        let config = StudyCaseConfig::default();
        let envelope =
            build_solver_input(&request(&graph, None, &config, SolverAnalysisType::Sc3f)).unwrap();

        assert!(!envelope.eligibility.eligible);
        assert!(envelope.eligibility.blocker_codes().contains(&"ELIG_NO_SOURCE"));
        let entries = trace_kinds_for(&envelope, "cab-1", "r_ohm_per_km");
        assert_eq!(
            entries[0].source_ref.derivation_rule.as_deref(),
            Some("no_source")
        );
    }

    #[test]
    fn envelope_hash_is_deterministic() {
        let build = || {
            let mut graph = base_graph();
            graph
                .add_branch(Branch::Cable(
                    LineBranch::new("cab-1", "K1", "gpz", "st-1")
                        .with_impedance(0.253, 0.073, 0.0)
                        .with_length(0.5),
                ))
                .unwrap();
            let config = StudyCaseConfig::default();
            build_solver_input(&request(&graph, None, &config, SolverAnalysisType::LoadFlow))
                .unwrap()
                .solver_input_hash()
                .unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn trace_is_sorted() {
        let mut graph = base_graph();
        graph
            .add_branch(Branch::Cable(
                LineBranch::new("cab-2", "K2", "gpz", "st-1")
                    .with_impedance(0.1, 0.1, 0.0)
                    .with_length(1.0),
            ))
            .unwrap();
        graph
            .add_branch(Branch::Cable(
                LineBranch::new("cab-1", "K1", "gpz", "st-1")
                    .with_impedance(0.1, 0.1, 0.0)
                    .with_length(1.0),
            ))
            .unwrap();
        let config = StudyCaseConfig::default();
        let envelope =
            build_solver_input(&request(&graph, None, &config, SolverAnalysisType::Sc3f)).unwrap();
        let keys: Vec<(String, String)> = envelope
            .trace
            .iter()
            .map(|e| (e.element_ref.clone(), e.field_path.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn ineligible_envelope_still_carries_payload() {
        let graph = base_graph();
        let config = StudyCaseConfig::default();
        let mut req = request(&graph, None, &config, SolverAnalysisType::Sc1f);
        req.fault_node_id = Some("st-1");
        let envelope = build_solver_input(&req).unwrap();
        assert!(!envelope.eligibility.eligible);
        assert_eq!(envelope.eligibility.blocker_codes(), vec!["ELIG_SC1F_NO_Z0"]);
        assert!(envelope.payload.is_some());
    }
}
