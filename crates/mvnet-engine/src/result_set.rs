//! Deterministic, signed result sets.
//!
//! A `ResultSet` merges solver output with readiness and validation
//! badges into one immutable artifact. Element results are sorted by
//! `element_ref`, badges by `(severity, code)`, metrics by code, and the
//! whole payload is signed: `deterministic_signature` is the canonical
//! fingerprint of the payload with the signature field blanked, so the
//! signature is a function of the payload and nothing else.
//!
//! The overlay carries *tokens only* - severity tokens, stroke tokens,
//! pre-computed numeric badges. Hex colors are forbidden everywhere; the
//! UI maps tokens to theme colors on its side.

use crate::{EngineError, EngineResult};
use mvnet_core::canonical;
use mvnet_solver::{PowerFlowSolution, ShortCircuitSolution};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Version stamp of the result contract.
pub const RESULT_CONTRACT_VERSION: &str = "1.0";

/// Overlay severity, ordered from informational to blocking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlaySeverity {
    Info,
    Warning,
    Important,
    Blocker,
}

impl OverlaySeverity {
    fn from_tag(tag: &str) -> Self {
        match tag.to_uppercase().as_str() {
            "BLOCKER" => OverlaySeverity::Blocker,
            "IMPORTANT" => OverlaySeverity::Important,
            "WARNING" | "WARN" => OverlaySeverity::Warning,
            _ => OverlaySeverity::Info,
        }
    }
}

/// Element kind token used by the SLD overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayElementKind {
    Bus,
    Branch,
    Transformer,
    Load,
    Generator,
    Device,
    Measurement,
    Substation,
}

fn element_kind(element_type: &str) -> OverlayElementKind {
    match element_type.to_lowercase().as_str() {
        "bus" | "node" => OverlayElementKind::Bus,
        "branch" | "line" | "cable" => OverlayElementKind::Branch,
        "transformer" => OverlayElementKind::Transformer,
        "load" => OverlayElementKind::Load,
        "generator" | "inverter" => OverlayElementKind::Generator,
        "measurement" => OverlayElementKind::Measurement,
        "substation" => OverlayElementKind::Substation,
        _ => OverlayElementKind::Device,
    }
}

/// Issue badge attached to one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayBadge {
    pub label: String,
    pub severity: OverlaySeverity,
    pub code: String,
}

/// Where a displayed metric came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricSource {
    Solver,
    Validation,
    Readiness,
}

/// Typed display metric (code + unit + format hint, never a raw string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMetric {
    pub code: String,
    pub value: f64,
    pub unit: String,
    pub format_hint: String,
    pub source: MetricSource,
}

/// Overlay state of one element.
///
/// `color_token`/`stroke_token` are semantic tokens the UI maps onto its
/// theme; hex colors never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayElement {
    pub ref_id: String,
    pub kind: OverlayElementKind,
    pub badges: Vec<OverlayBadge>,
    pub metrics: BTreeMap<String, OverlayMetric>,
    pub severity: OverlaySeverity,
    pub color_token: String,
    pub stroke_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_token: Option<String>,
}

/// Visual tokens of a severity level.
fn visual_tokens(severity: OverlaySeverity) -> (&'static str, &'static str, Option<&'static str>) {
    match severity {
        OverlaySeverity::Info => ("ok", "normal", None),
        OverlaySeverity::Warning => ("warning", "normal", None),
        OverlaySeverity::Important => ("critical", "bold", None),
        OverlaySeverity::Blocker => ("critical", "bold", Some("pulse")),
    }
}

/// One legend row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLegendEntry {
    pub severity: OverlaySeverity,
    pub label: String,
    pub description: String,
}

/// Fixed Polish legend of the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLegend {
    pub title: String,
    pub entries: Vec<OverlayLegendEntry>,
}

/// Network-level warning without an element anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayWarning {
    pub code: String,
    pub message: String,
    pub severity: OverlaySeverity,
}

/// Complete overlay projection of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayPayload {
    pub elements: BTreeMap<String, OverlayElement>,
    pub legend: OverlayLegend,
    pub warnings: Vec<OverlayWarning>,
}

/// Solver values of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementResult {
    pub element_ref: String,
    pub element_type: String,
    pub values: BTreeMap<String, Value>,
}

/// The deterministic, signed output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub contract_version: String,
    pub run_id: String,
    pub analysis_type: String,
    pub solver_input_hash: String,
    pub created_at: String,
    pub deterministic_signature: String,
    pub global_results: BTreeMap<String, Value>,
    pub element_results: Vec<ElementResult>,
    pub overlay_payload: OverlayPayload,
}

impl ResultSet {
    /// Canonical value tree; byte-stable across processes for the same
    /// result set.
    pub fn to_canonical_value(&self) -> EngineResult<Value> {
        let raw = serde_json::to_value(self)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        Ok(canonical::canonicalize(&raw)?)
    }
}

fn default_legend() -> OverlayLegend {
    // Labels come from the closed table; order follows rising severity.
    let [info, warning, important, blocker] = mvnet_core::messages::LEGEND_SEVERITY_PL;
    OverlayLegend {
        title: "Legenda wyników".to_string(),
        entries: vec![
            OverlayLegendEntry {
                severity: OverlaySeverity::Info,
                label: info.to_string(),
                description: "Element poprawny, wyniki dostępne".to_string(),
            },
            OverlayLegendEntry {
                severity: OverlaySeverity::Warning,
                label: warning.to_string(),
                description: "Element z ostrzeżeniami walidacji".to_string(),
            },
            OverlayLegendEntry {
                severity: OverlaySeverity::Important,
                label: important.to_string(),
                description: "Element wymaga uwagi".to_string(),
            },
            OverlayLegendEntry {
                severity: OverlaySeverity::Blocker,
                label: blocker.to_string(),
                description: "Element uniemożliwia poprawne obliczenia".to_string(),
            },
        ],
    }
}

/// Known solver value keys → (metric code, unit, format hint).
const METRIC_MAP: [(&str, &str, &str, &str); 16] = [
    ("ikss_a", "IK_3F_A", "A", "fixed0"),
    ("ip_a", "IP_A", "A", "fixed0"),
    ("ib_a", "IB_A", "A", "fixed0"),
    ("ith_a", "ITH_A", "A", "fixed0"),
    ("sk_mva", "SK_MVA", "MVA", "fixed2"),
    ("v_pu", "V_PU", "p.u.", "fixed4"),
    ("u_kv", "U_kV", "kV", "fixed2"),
    ("angle_deg", "ANGLE_DEG", "°", "fixed2"),
    ("p_injected_mw", "P_MW", "MW", "fixed4"),
    ("q_injected_mvar", "Q_Mvar", "Mvar", "fixed4"),
    ("p_from_mw", "P_MW", "MW", "fixed4"),
    ("q_from_mvar", "Q_Mvar", "Mvar", "fixed4"),
    ("losses_p_mw", "LOSSES_P_MW", "MW", "fixed4"),
    ("losses_q_mvar", "LOSSES_Q_Mvar", "Mvar", "fixed4"),
    ("loading_pct", "LOADING_PCT", "%", "fixed1"),
    ("i_from_a", "I_A", "A", "fixed1"),
];

fn extract_metrics(values: &BTreeMap<String, Value>) -> BTreeMap<String, OverlayMetric> {
    let mut metrics = BTreeMap::new();
    for (key, code, unit, hint) in METRIC_MAP {
        let Some(value) = values.get(key).and_then(Value::as_f64) else {
            continue;
        };
        metrics.entry(code.to_string()).or_insert(OverlayMetric {
            code: code.to_string(),
            value,
            unit: unit.to_string(),
            format_hint: hint.to_string(),
            source: MetricSource::Solver,
        });
    }
    metrics
}

/// Per-element badges pulled from a readiness or validation snapshot.
fn badges_from_snapshot(snapshot: &Value) -> BTreeMap<String, Vec<OverlayBadge>> {
    let mut badges: BTreeMap<String, Vec<OverlayBadge>> = BTreeMap::new();
    let Some(issues) = snapshot.get("issues").and_then(Value::as_array) else {
        return badges;
    };
    for issue in issues {
        let element_ref = issue
            .get("element_id")
            .or_else(|| issue.get("element_ref"))
            .and_then(Value::as_str);
        let Some(element_ref) = element_ref else {
            continue;
        };
        let severity_tag = issue
            .get("priority")
            .or_else(|| issue.get("severity"))
            .and_then(Value::as_str)
            .unwrap_or("WARNING");
        let label = issue
            .get("message_pl")
            .or_else(|| issue.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Problem");
        let code = issue.get("code").and_then(Value::as_str).unwrap_or("");
        badges.entry(element_ref.to_string()).or_default().push(OverlayBadge {
            label: label.to_string(),
            severity: OverlaySeverity::from_tag(severity_tag),
            code: code.to_string(),
        });
    }
    badges
}

/// Global (element-less) warnings from a snapshot.
fn warnings_from_snapshot(snapshot: &Value, fallback_code: &str) -> Vec<OverlayWarning> {
    let Some(issues) = snapshot.get("issues").and_then(Value::as_array) else {
        return Vec::new();
    };
    issues
        .iter()
        .filter(|issue| {
            issue
                .get("element_id")
                .or_else(|| issue.get("element_ref"))
                .and_then(Value::as_str)
                .is_none()
        })
        .map(|issue| OverlayWarning {
            code: issue
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or(fallback_code)
                .to_string(),
            message: issue
                .get("message_pl")
                .or_else(|| issue.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            severity: OverlaySeverity::from_tag(
                issue
                    .get("priority")
                    .or_else(|| issue.get("severity"))
                    .and_then(Value::as_str)
                    .unwrap_or("WARNING"),
            ),
        })
        .collect()
}

fn aggregate_severity(badges: &[OverlayBadge]) -> OverlaySeverity {
    badges
        .iter()
        .map(|b| b.severity)
        .max()
        .unwrap_or(OverlaySeverity::Info)
}

/// Inputs of one result-set build.
pub struct ResultSetBuild {
    pub run_id: String,
    pub analysis_type: String,
    pub solver_input_hash: String,
    pub created_at: String,
    pub element_results: Vec<ElementResult>,
    pub global_results: BTreeMap<String, Value>,
    pub readiness_snapshot: Value,
    pub validation_snapshot: Value,
}

/// Assemble and sign a result set.
pub fn build_result_set(build: ResultSetBuild) -> EngineResult<ResultSet> {
    let ResultSetBuild {
        run_id,
        analysis_type,
        solver_input_hash,
        created_at,
        mut element_results,
        global_results,
        readiness_snapshot,
        validation_snapshot,
    } = build;

    element_results.sort_by(|a, b| a.element_ref.cmp(&b.element_ref));

    let readiness_badges = badges_from_snapshot(&readiness_snapshot);
    let validation_badges = badges_from_snapshot(&validation_snapshot);

    let mut all_refs: Vec<String> = element_results
        .iter()
        .map(|er| er.element_ref.clone())
        .chain(readiness_badges.keys().cloned())
        .chain(validation_badges.keys().cloned())
        .collect();
    all_refs.sort();
    all_refs.dedup();

    let mut overlay_elements = BTreeMap::new();
    for element_ref in all_refs {
        let mut badges: Vec<OverlayBadge> = Vec::new();
        badges.extend(readiness_badges.get(&element_ref).cloned().unwrap_or_default());
        badges.extend(validation_badges.get(&element_ref).cloned().unwrap_or_default());
        badges.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.code.cmp(&b.code)));

        let element = element_results
            .iter()
            .find(|er| er.element_ref == element_ref);
        let element_type = element.map(|er| er.element_type.as_str()).unwrap_or("unknown");
        let metrics = element
            .map(|er| extract_metrics(&er.values))
            .unwrap_or_default();
        let severity = aggregate_severity(&badges);
        let (color_token, stroke_token, animation_token) = visual_tokens(severity);

        overlay_elements.insert(
            element_ref.clone(),
            OverlayElement {
                ref_id: element_ref,
                kind: element_kind(element_type),
                badges,
                metrics,
                severity,
                color_token: color_token.to_string(),
                stroke_token: stroke_token.to_string(),
                animation_token: animation_token.map(|t| t.to_string()),
            },
        );
    }

    let mut warnings = warnings_from_snapshot(&readiness_snapshot, "W-RDY-000");
    warnings.extend(warnings_from_snapshot(&validation_snapshot, "W-VAL-000"));
    warnings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.code.cmp(&b.code)));

    let mut result_set = ResultSet {
        contract_version: RESULT_CONTRACT_VERSION.to_string(),
        run_id,
        analysis_type,
        solver_input_hash,
        created_at,
        deterministic_signature: String::new(),
        global_results,
        element_results,
        overlay_payload: OverlayPayload {
            elements: overlay_elements,
            legend: default_legend(),
            warnings,
        },
    };

    let signature = canonical::fingerprint(&result_set.to_canonical_value()?)?;
    result_set.deterministic_signature = signature;
    Ok(result_set)
}

// =============================================================================
// Solver output mapping
// =============================================================================

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Project a power-flow solution into element and global results.
pub fn map_power_flow(
    solution: &PowerFlowSolution,
) -> EngineResult<(Vec<ElementResult>, BTreeMap<String, Value>)> {
    let mut elements = Vec::new();

    for bus in &solution.bus_results {
        let mut values = BTreeMap::new();
        values.insert("v_pu".to_string(), number(bus.v_pu));
        values.insert("u_kv".to_string(), number(bus.u_kv));
        values.insert("angle_deg".to_string(), number(bus.angle_deg));
        values.insert("p_injected_mw".to_string(), number(bus.p_injected_mw));
        values.insert("q_injected_mvar".to_string(), number(bus.q_injected_mvar));
        elements.push(ElementResult {
            element_ref: bus.bus_id.clone(),
            element_type: "Bus".to_string(),
            values,
        });
    }

    for branch in &solution.branch_results {
        let mut values = BTreeMap::new();
        values.insert("p_from_mw".to_string(), number(branch.p_from_mw));
        values.insert("q_from_mvar".to_string(), number(branch.q_from_mvar));
        values.insert("p_to_mw".to_string(), number(branch.p_to_mw));
        values.insert("q_to_mvar".to_string(), number(branch.q_to_mvar));
        values.insert("losses_p_mw".to_string(), number(branch.losses_p_mw));
        values.insert("losses_q_mvar".to_string(), number(branch.losses_q_mvar));
        values.insert("i_from_a".to_string(), number(branch.i_from_a));
        if let Some(loading) = branch.loading_pct {
            values.insert("loading_pct".to_string(), number(loading));
        }
        elements.push(ElementResult {
            element_ref: branch.branch_id.clone(),
            element_type: "Branch".to_string(),
            values,
        });
    }

    let trace = serde_json::to_value(&solution.trace)
        .map_err(|e| EngineError::Serialization(e.to_string()))?;
    let globals = BTreeMap::from([
        ("converged".to_string(), Value::Bool(solution.converged)),
        ("iterations".to_string(), json!(solution.iterations)),
        (
            "max_mismatch_pu".to_string(),
            number(solution.max_mismatch_pu),
        ),
        ("slack_p_mw".to_string(), number(solution.slack_p_mw)),
        ("slack_q_mvar".to_string(), number(solution.slack_q_mvar)),
        (
            "total_losses_p_mw".to_string(),
            number(solution.total_losses_p_mw),
        ),
        (
            "total_losses_q_mvar".to_string(),
            number(solution.total_losses_q_mvar),
        ),
        ("trace".to_string(), trace),
    ]);

    Ok((elements, globals))
}

/// Project a short-circuit solution into element and global results.
pub fn map_short_circuit(
    solution: &ShortCircuitSolution,
) -> EngineResult<(Vec<ElementResult>, BTreeMap<String, Value>)> {
    let mut elements = Vec::new();

    let mut fault_values = BTreeMap::new();
    fault_values.insert("ikss_a".to_string(), number(solution.ikss_a));
    fault_values.insert("ip_a".to_string(), number(solution.ip_a));
    fault_values.insert("ib_a".to_string(), number(solution.ib_a));
    fault_values.insert("ith_a".to_string(), number(solution.ith_a));
    fault_values.insert("sk_mva".to_string(), number(solution.sk_mva));
    fault_values.insert("kappa".to_string(), number(solution.kappa));
    elements.push(ElementResult {
        element_ref: solution.fault_node_id.clone(),
        element_type: "Bus".to_string(),
        values: fault_values,
    });

    for branch in &solution.branch_contributions {
        let mut values = BTreeMap::new();
        values.insert("i_from_a".to_string(), number(branch.i_branch_a));
        values.insert(
            "direction".to_string(),
            Value::String(branch.direction.clone()),
        );
        elements.push(ElementResult {
            element_ref: branch.branch_ref.clone(),
            element_type: "Branch".to_string(),
            values,
        });
    }

    let contributions = serde_json::to_value(&solution.contributions)
        .map_err(|e| EngineError::Serialization(e.to_string()))?;
    let trace = serde_json::to_value(&solution.trace)
        .map_err(|e| EngineError::Serialization(e.to_string()))?;

    let globals = BTreeMap::from([
        ("fault_node_id".to_string(), Value::String(solution.fault_node_id.clone())),
        ("fault_type".to_string(), Value::String(solution.fault_type.clone())),
        ("ikss_a".to_string(), number(solution.ikss_a)),
        ("ip_a".to_string(), number(solution.ip_a)),
        ("ib_a".to_string(), number(solution.ib_a)),
        ("ith_a".to_string(), number(solution.ith_a)),
        ("sk_mva".to_string(), number(solution.sk_mva)),
        ("kappa".to_string(), number(solution.kappa)),
        ("r_over_x".to_string(), number(solution.r_over_x)),
        ("zk_r_ohm".to_string(), number(solution.zk_r_ohm)),
        ("zk_x_ohm".to_string(), number(solution.zk_x_ohm)),
        ("contributions".to_string(), contributions),
        (
            "warnings".to_string(),
            json!(solution.warnings),
        ),
        ("trace".to_string(), trace),
    ]);

    Ok((elements, globals))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_build(run_id: &str) -> ResultSetBuild {
        ResultSetBuild {
            run_id: run_id.to_string(),
            analysis_type: "SC_3F".to_string(),
            solver_input_hash: "abc".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            element_results: vec![ElementResult {
                element_ref: "lv".to_string(),
                element_type: "Bus".to_string(),
                values: BTreeMap::from([
                    ("ikss_a".to_string(), json!(7217.0)),
                    ("sk_mva".to_string(), json!(250.0)),
                ]),
            }],
            global_results: BTreeMap::from([("ikss_a".to_string(), json!(7217.0))]),
            readiness_snapshot: json!({"issues": []}),
            validation_snapshot: json!({"issues": []}),
        }
    }

    #[test]
    fn signature_is_function_of_payload_only() {
        let a = build_result_set(minimal_build("run-1")).unwrap();
        let b = build_result_set(minimal_build("run-1")).unwrap();
        assert_eq!(a.deterministic_signature, b.deterministic_signature);
        let c = build_result_set(minimal_build("run-2")).unwrap();
        assert_ne!(a.deterministic_signature, c.deterministic_signature);
    }

    #[test]
    fn metrics_are_extracted_with_codes() {
        let result_set = build_result_set(minimal_build("run-1")).unwrap();
        let element = &result_set.overlay_payload.elements["lv"];
        assert!(element.metrics.contains_key("IK_3F_A"));
        assert_eq!(element.metrics["SK_MVA"].unit, "MVA");
        assert_eq!(element.metrics["IK_3F_A"].format_hint, "fixed0");
    }

    #[test]
    fn badges_merge_from_readiness_and_validation() {
        let mut build = minimal_build("run-1");
        build.readiness_snapshot = json!({"issues": [
            {"code": "trunk.catalog_missing", "priority": "BLOCKER",
             "message_pl": "Odcinek nie ma przypisanego katalogu", "element_id": "lv"},
        ]});
        build.validation_snapshot = json!({"issues": [
            {"code": "W-V01", "severity": "WARNING",
             "message_pl": "Ostrzeżenie walidacji", "element_ref": "lv"},
        ]});
        let result_set = build_result_set(build).unwrap();
        let element = &result_set.overlay_payload.elements["lv"];
        assert_eq!(element.badges.len(), 2);
        assert_eq!(element.severity, OverlaySeverity::Blocker);
        // Blocker sorts before warning.
        assert_eq!(element.badges[0].severity, OverlaySeverity::Blocker);
        assert_eq!(element.color_token, "critical");
        assert_eq!(element.animation_token.as_deref(), Some("pulse"));
    }

    #[test]
    fn clean_element_gets_ok_tokens() {
        let result_set = build_result_set(minimal_build("run-1")).unwrap();
        let element = &result_set.overlay_payload.elements["lv"];
        assert_eq!(element.color_token, "ok");
        assert_eq!(element.stroke_token, "normal");
        assert!(element.animation_token.is_none());
    }

    #[test]
    fn legend_is_polish_and_fixed() {
        let result_set = build_result_set(minimal_build("run-1")).unwrap();
        let labels: Vec<&str> = result_set
            .overlay_payload
            .legend
            .entries
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, ["Poprawne", "Ostrzeżenie", "Ważne", "Blokujące"]);
    }

    #[test]
    fn no_hex_colors_anywhere() {
        let mut build = minimal_build("run-1");
        build.readiness_snapshot = json!({"issues": [
            {"code": "E-D03", "priority": "BLOCKER", "message_pl": "Sieć zawiera rozłączone wyspy"},
        ]});
        let result_set = build_result_set(build).unwrap();
        let bytes = canonical::canonical_bytes(&result_set.to_canonical_value().unwrap()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains('#'), "hex-like token in result payload");
    }

    #[test]
    fn canonical_round_trip_preserves_bytes() {
        let result_set = build_result_set(minimal_build("run-1")).unwrap();
        let value = result_set.to_canonical_value().unwrap();
        let parsed: ResultSet = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(parsed.to_canonical_value().unwrap(), value);
        assert_eq!(
            parsed.deterministic_signature,
            result_set.deterministic_signature
        );
    }

    #[test]
    fn element_results_are_sorted() {
        let mut build = minimal_build("run-1");
        build.element_results = vec![
            ElementResult {
                element_ref: "z".to_string(),
                element_type: "Bus".to_string(),
                values: BTreeMap::new(),
            },
            ElementResult {
                element_ref: "a".to_string(),
                element_type: "Bus".to_string(),
                values: BTreeMap::new(),
            },
        ];
        let result_set = build_result_set(build).unwrap();
        assert_eq!(result_set.element_results[0].element_ref, "a");
        assert_eq!(result_set.element_results[1].element_ref, "z");
    }
}
