//! Readiness scan over a network snapshot.
//!
//! Readiness is data, not an exception: the checker walks a snapshot
//! against a fixed rule table and emits typed issues with stable codes,
//! Polish messages from the closed table, and fix-action records the UI
//! can dispatch. Per-analysis flags are computed by subsetting issues by
//! area and priority.
//!
//! The checker needs to know whether a `type_ref` actually resolves; that
//! knowledge lives in the catalog crate, injected here through the
//! [`CatalogIndex`] trait so the model layer stays free of catalog types.

use crate::messages::message_pl_or_code;
use crate::network::{Branch, NetworkGraph, NodeType};
use crate::snapshot::NetworkSnapshot;
use serde::Serialize;

/// Functional area an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessArea {
    Sources,
    Catalogs,
    Topology,
    Stations,
    Protection,
    Analysis,
}

/// Issue priority; blockers gate run creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessPriority {
    Blocker,
    Warning,
    Info,
}

/// Opaque fix-action record consumed by the wizard layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixAction {
    pub action_type: FixActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hint: Option<String>,
}

/// Kinds of fix actions the UI knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixActionType {
    OpenModal,
    NavigateToElement,
    SelectCatalog,
    AddMissingDevice,
}

impl FixAction {
    pub fn navigate_to(element_ref: &str) -> Self {
        Self {
            action_type: FixActionType::NavigateToElement,
            element_ref: Some(element_ref.to_string()),
            modal_type: None,
            payload_hint: None,
        }
    }

    pub fn select_catalog(element_ref: &str) -> Self {
        Self {
            action_type: FixActionType::SelectCatalog,
            element_ref: Some(element_ref.to_string()),
            modal_type: None,
            payload_hint: None,
        }
    }

    pub fn add_missing_device() -> Self {
        Self {
            action_type: FixActionType::AddMissingDevice,
            element_ref: None,
            modal_type: None,
            payload_hint: None,
        }
    }
}

/// One readiness finding.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessIssue {
    pub code: String,
    pub area: ReadinessArea,
    pub priority: ReadinessPriority,
    pub message_pl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint_pl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wizard_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_action: Option<FixAction>,
}

impl ReadinessIssue {
    fn new(code: &str, area: ReadinessArea, priority: ReadinessPriority) -> Self {
        Self {
            code: code.to_string(),
            area,
            priority,
            message_pl: message_pl_or_code(code).to_string(),
            element_id: None,
            element_type: None,
            fix_hint_pl: None,
            wizard_step: None,
            fix_action: None,
        }
    }

    fn on_element(mut self, element_id: &str, element_type: &str) -> Self {
        self.element_id = Some(element_id.to_string());
        self.element_type = Some(element_type.to_string());
        self
    }

    fn with_fix_hint(mut self, hint_pl: &str) -> Self {
        self.fix_hint_pl = Some(hint_pl.to_string());
        self
    }

    fn with_wizard_step(mut self, step: &str) -> Self {
        self.wizard_step = Some(step.to_string());
        self
    }

    fn with_fix_action(mut self, action: FixAction) -> Self {
        self.fix_action = Some(action);
        self
    }
}

/// Readiness view of one snapshot, with per-analysis flags.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessProfile {
    pub snapshot_id: String,
    pub snapshot_fingerprint: String,
    pub issues: Vec<ReadinessIssue>,
    pub short_circuit_ready: bool,
    pub load_flow_ready: bool,
    pub protection_ready: bool,
}

impl ReadinessProfile {
    /// True when no blocker exists in the solver-relevant areas.
    pub fn ready(&self) -> bool {
        self.short_circuit_ready && self.load_flow_ready
    }

    pub fn blockers(&self) -> impl Iterator<Item = &ReadinessIssue> {
        self.issues
            .iter()
            .filter(|i| i.priority == ReadinessPriority::Blocker)
    }

    pub fn blocker_codes(&self) -> Vec<&str> {
        self.blockers().map(|i| i.code.as_str()).collect()
    }
}

/// Catalog lookups the readiness checker needs. Implemented by the catalog
/// repository; `None` at the call site means "no catalog available".
pub trait CatalogIndex {
    fn has_line_type(&self, id: &str) -> bool;
    fn has_cable_type(&self, id: &str) -> bool;
    fn has_transformer_type(&self, id: &str) -> bool;
    fn has_inverter_type(&self, id: &str) -> bool;
}

/// Areas whose blockers gate the electrical analyses.
const ANALYSIS_AREAS: [ReadinessArea; 4] = [
    ReadinessArea::Sources,
    ReadinessArea::Catalogs,
    ReadinessArea::Topology,
    ReadinessArea::Stations,
];

/// Scan a snapshot and produce its readiness profile.
pub fn check_snapshot_readiness(
    snapshot: &NetworkSnapshot,
    catalog: Option<&dyn CatalogIndex>,
) -> ReadinessProfile {
    let graph = &snapshot.graph;
    let mut issues = Vec::new();

    check_sources(graph, &mut issues);
    check_branches(graph, catalog, &mut issues);
    check_inverter_sources(graph, catalog, &mut issues);
    check_nodes(graph, &mut issues);
    check_topology(graph, &mut issues);

    issues.sort_by(|a, b| {
        (a.priority, a.area, &a.code, &a.element_id).cmp(&(b.priority, b.area, &b.code, &b.element_id))
    });

    let blocked = |areas: &[ReadinessArea]| {
        issues
            .iter()
            .any(|i| i.priority == ReadinessPriority::Blocker && areas.contains(&i.area))
    };
    let analysis_blocked = blocked(&ANALYSIS_AREAS);
    let protection_blocked = blocked(&[ReadinessArea::Protection]) || analysis_blocked;

    ReadinessProfile {
        snapshot_id: snapshot.snapshot_id.clone(),
        snapshot_fingerprint: snapshot.fingerprint.clone(),
        issues,
        short_circuit_ready: !analysis_blocked,
        load_flow_ready: !analysis_blocked,
        protection_ready: !protection_blocked,
    }
}

fn check_sources(graph: &NetworkGraph, issues: &mut Vec<ReadinessIssue>) {
    let slacks = graph.slack_nodes();
    if slacks.is_empty() && !graph.nodes.is_empty() {
        issues.push(
            ReadinessIssue::new(
                "source.grid_supply_missing",
                ReadinessArea::Sources,
                ReadinessPriority::Blocker,
            )
            .with_fix_hint("Dodaj źródło zasilania w kreatorze")
            .with_wizard_step("K2")
            .with_fix_action(FixAction::add_missing_device()),
        );
    }

    for node in slacks {
        if node.voltage_level_kv.value() <= 0.0 {
            issues.push(
                ReadinessIssue::new(
                    "source.voltage_invalid",
                    ReadinessArea::Sources,
                    ReadinessPriority::Blocker,
                )
                .on_element(&node.id, "Source")
                .with_fix_hint("Ustaw napięcie źródła")
                .with_fix_action(FixAction::navigate_to(&node.id)),
            );
        }
        if let Some(sk3) = node.sk3_mva {
            if sk3.value() <= 0.0 {
                issues.push(
                    ReadinessIssue::new(
                        "source.sk3_invalid",
                        ReadinessArea::Sources,
                        ReadinessPriority::Blocker,
                    )
                    .on_element(&node.id, "Source")
                    .with_fix_hint("Ustaw moc zwarciową Sk3")
                    .with_fix_action(FixAction::navigate_to(&node.id)),
                );
            }
        }
    }
}

fn check_branches(
    graph: &NetworkGraph,
    catalog: Option<&dyn CatalogIndex>,
    issues: &mut Vec<ReadinessIssue>,
) {
    for branch in graph.branches.values() {
        match branch {
            Branch::Line(conductor) | Branch::Cable(conductor) => {
                let is_cable = matches!(branch, Branch::Cable(_));
                let has_instance_impedance =
                    conductor.r_ohm_per_km > 0.0 || conductor.x_ohm_per_km > 0.0;
                match (&conductor.type_ref, catalog) {
                    (Some(type_ref), Some(index)) => {
                        let resolves = if is_cable {
                            index.has_cable_type(type_ref)
                        } else {
                            index.has_line_type(type_ref)
                        };
                        if !resolves {
                            issues.push(
                                ReadinessIssue::new(
                                    "catalog.materialization_failed",
                                    ReadinessArea::Catalogs,
                                    ReadinessPriority::Blocker,
                                )
                                .on_element(&conductor.id, branch.type_tag())
                                .with_fix_hint("Odśwież parametry z katalogu")
                                .with_fix_action(FixAction::select_catalog(&conductor.id)),
                            );
                        }
                    }
                    (None, _)
                        if !has_instance_impedance && conductor.impedance_override.is_none() =>
                    {
                        issues.push(
                            ReadinessIssue::new(
                                "trunk.catalog_missing",
                                ReadinessArea::Catalogs,
                                ReadinessPriority::Blocker,
                            )
                            .on_element(&conductor.id, branch.type_tag())
                            .with_fix_hint("Wybierz typ z katalogu")
                            .with_fix_action(FixAction::select_catalog(&conductor.id)),
                        );
                    }
                    _ => {}
                }

                if conductor.length_km <= 0.0 {
                    issues.push(
                        ReadinessIssue::new(
                            "trunk.segment_length_missing",
                            ReadinessArea::Topology,
                            ReadinessPriority::Blocker,
                        )
                        .on_element(&conductor.id, branch.type_tag())
                        .with_fix_hint("Ustaw długość odcinka")
                        .with_fix_action(FixAction::navigate_to(&conductor.id)),
                    );
                }
            }
            Branch::Transformer(trafo) => {
                if let (Some(type_ref), Some(index)) = (&trafo.type_ref, catalog) {
                    if !index.has_transformer_type(type_ref) {
                        issues.push(
                            ReadinessIssue::new(
                                "catalog.materialization_failed",
                                ReadinessArea::Catalogs,
                                ReadinessPriority::Blocker,
                            )
                            .on_element(&trafo.id, "Transformer")
                            .with_fix_hint("Odśwież parametry z katalogu")
                            .with_fix_action(FixAction::select_catalog(&trafo.id)),
                        );
                    }
                }
                if trafo.type_ref.is_none() && trafo.rated_power_mva <= 0.0 {
                    issues.push(
                        ReadinessIssue::new(
                            "transformer.catalog_missing",
                            ReadinessArea::Catalogs,
                            ReadinessPriority::Blocker,
                        )
                        .on_element(&trafo.id, "Transformer")
                        .with_fix_hint("Wybierz transformator z katalogu")
                        .with_fix_action(FixAction::select_catalog(&trafo.id)),
                    );
                }
                if trafo.type_ref.is_none() && trafo.rated_power_mva > 0.0 {
                    if trafo.voltage_lv_kv <= 0.0 {
                        issues.push(
                            ReadinessIssue::new(
                                "transformer.lv_voltage_missing",
                                ReadinessArea::Catalogs,
                                ReadinessPriority::Blocker,
                            )
                            .on_element(&trafo.id, "Transformer")
                            .with_fix_hint(
                                "Wybierz transformator z katalogu z poprawnym U_dolne",
                            )
                            .with_fix_action(FixAction::select_catalog(&trafo.id)),
                        );
                    }
                    if trafo.uk_percent <= 0.0 {
                        issues.push(
                            ReadinessIssue::new(
                                "transformer.uk_invalid",
                                ReadinessArea::Catalogs,
                                ReadinessPriority::Blocker,
                            )
                            .on_element(&trafo.id, "Transformer")
                            .with_fix_hint("Sprawdź parametry transformatora w katalogu")
                            .with_fix_action(FixAction::select_catalog(&trafo.id)),
                        );
                    }
                }
            }
        }
    }
}

fn check_inverter_sources(
    graph: &NetworkGraph,
    catalog: Option<&dyn CatalogIndex>,
    issues: &mut Vec<ReadinessIssue>,
) {
    for source in graph.inverter_sources.values() {
        let has_instance_rating = source.in_rated_a > 0.0 && source.k_sc > 0.0;
        match (&source.type_ref, catalog) {
            (Some(type_ref), Some(index)) if !index.has_inverter_type(type_ref) => {
                issues.push(
                    ReadinessIssue::new(
                        "catalog.materialization_failed",
                        ReadinessArea::Catalogs,
                        ReadinessPriority::Blocker,
                    )
                    .on_element(&source.id, "Inverter")
                    .with_fix_action(FixAction::select_catalog(&source.id)),
                );
            }
            (None, _) if !has_instance_rating => {
                issues.push(
                    ReadinessIssue::new(
                        "catalog.binding_missing",
                        ReadinessArea::Catalogs,
                        ReadinessPriority::Blocker,
                    )
                    .on_element(&source.id, "Inverter")
                    .with_fix_hint("Wybierz typ z katalogu")
                    .with_fix_action(FixAction::select_catalog(&source.id)),
                );
            }
            _ => {}
        }
    }
}

fn check_nodes(graph: &NetworkGraph, issues: &mut Vec<ReadinessIssue>) {
    for node in graph.nodes.values() {
        if node.node_type != NodeType::Slack && node.voltage_level_kv.value() <= 0.0 {
            issues.push(
                ReadinessIssue::new(
                    "station.voltage_missing",
                    ReadinessArea::Stations,
                    ReadinessPriority::Blocker,
                )
                .on_element(&node.id, "Bus")
                .with_fix_hint("Ustaw napięcie bazowe węzła")
                .with_fix_action(FixAction::navigate_to(&node.id)),
            );
        }
    }
}

fn check_topology(graph: &NetworkGraph, issues: &mut Vec<ReadinessIssue>) {
    if !graph.nodes.is_empty() && graph.branches.is_empty() && graph.nodes.len() > 1 {
        issues.push(
            ReadinessIssue::new(
                "trunk.segment_missing",
                ReadinessArea::Topology,
                ReadinessPriority::Blocker,
            )
            .with_fix_hint("Dodaj odcinek magistrali SN")
            .with_fix_action(FixAction::add_missing_device()),
        );
    }

    if graph.nodes.len() >= 2 && graph.connected_components(true).len() > 1 {
        issues.push(
            ReadinessIssue::new(
                "E-D03",
                ReadinessArea::Topology,
                ReadinessPriority::Blocker,
            )
            .with_fix_hint("Połącz wyspy sieci gałęzią lub zamknij łącznik"),
        );
    }
}
