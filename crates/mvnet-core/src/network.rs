//! In-memory MV network model.
//!
//! The graph owns four id-keyed element maps (nodes, branches, switches,
//! inverter sources). `BTreeMap` keys give every iteration the ascending-id
//! order that the canonical codec and the solvers rely on, so no call site
//! ever sorts explicitly.
//!
//! Branches are a closed sum type - `Line | Cable | Transformer` - and all
//! dispatch is by pattern matching. The string tags (`"LINE"`, `"CABLE"`,
//! `"TRANSFORMER"`) exist only at the canonical-value boundary.
//!
//! Insertion never coerces: duplicate ids, endpoints that do not exist, and
//! self-loops are rejected with typed errors.

use crate::canonical::{self, CodecResult};
use crate::error::{CoreError, CoreResult};
use crate::units::{Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians};
use petgraph::{Graph, Undirected};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Bus role in power-flow terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Reference bus: V and θ fixed, P and Q calculated. One per island.
    Slack,
    /// Voltage-regulated bus: P and |V| specified.
    Pv,
    /// Load bus: P and Q specified. Most MV buses are PQ.
    Pq,
}

/// A bus in the network.
///
/// `p_mw`/`q_mvar` are consumption (load convention); the solvers negate
/// them into injections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    /// Nominal voltage level of the bus
    pub voltage_level_kv: Kilovolts,
    /// Voltage magnitude setpoint (slack/PV) or initial guess (PQ)
    pub v_mag_pu: PerUnit,
    /// Voltage angle setpoint (slack) or initial guess
    pub v_angle_rad: Radians,
    /// Active power demand
    pub p_mw: Megawatts,
    /// Reactive power demand
    pub q_mvar: Megavars,
    /// Short-circuit power of the upstream grid at a supply bus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sk3_mva: Option<MegavoltAmperes>,
    pub in_service: bool,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            voltage_level_kv: Kilovolts(0.0),
            v_mag_pu: PerUnit::ONE,
            v_angle_rad: Radians::ZERO,
            p_mw: Megawatts(0.0),
            q_mvar: Megavars(0.0),
            sk3_mva: None,
            in_service: true,
        }
    }

    /// Set the nominal voltage level in kV.
    pub fn with_voltage_level(mut self, kv: f64) -> Self {
        self.voltage_level_kv = Kilovolts(kv);
        self
    }

    /// Set the load demand in MW / Mvar.
    pub fn with_load(mut self, p_mw: f64, q_mvar: f64) -> Self {
        self.p_mw = Megawatts(p_mw);
        self.q_mvar = Megavars(q_mvar);
        self
    }

    /// Set the voltage setpoint (magnitude in pu, angle in radians).
    pub fn with_setpoint(mut self, v_pu: f64, angle_rad: f64) -> Self {
        self.v_mag_pu = PerUnit(v_pu);
        self.v_angle_rad = Radians(angle_rad);
        self
    }

    /// Set the upstream grid short-circuit power in MVA.
    pub fn with_sk3(mut self, sk3_mva: f64) -> Self {
        self.sk3_mva = Some(MegavoltAmperes(sk3_mva));
        self
    }
}

/// Total series/shunt values overriding catalog or instance per-km data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceOverride {
    pub r_total_ohm: f64,
    pub x_total_ohm: f64,
    pub b_total_us: f64,
}

/// Overhead line or cable segment (same parameter shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineBranch {
    pub id: String,
    pub name: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub b_us_per_km: f64,
    pub length_km: f64,
    pub rated_current_a: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impedance_override: Option<ImpedanceOverride>,
    pub in_service: bool,
}

impl LineBranch {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        from_node_id: impl Into<String>,
        to_node_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            from_node_id: from_node_id.into(),
            to_node_id: to_node_id.into(),
            r_ohm_per_km: 0.0,
            x_ohm_per_km: 0.0,
            b_us_per_km: 0.0,
            length_km: 0.0,
            rated_current_a: 0.0,
            type_ref: None,
            impedance_override: None,
            in_service: true,
        }
    }

    /// Set per-km series impedance and shunt susceptance.
    pub fn with_impedance(mut self, r_ohm_per_km: f64, x_ohm_per_km: f64, b_us_per_km: f64) -> Self {
        self.r_ohm_per_km = r_ohm_per_km;
        self.x_ohm_per_km = x_ohm_per_km;
        self.b_us_per_km = b_us_per_km;
        self
    }

    pub fn with_length(mut self, length_km: f64) -> Self {
        self.length_km = length_km;
        self
    }

    pub fn with_rated_current(mut self, rated_current_a: f64) -> Self {
        self.rated_current_a = rated_current_a;
        self
    }

    pub fn with_type_ref(mut self, type_ref: impl Into<String>) -> Self {
        self.type_ref = Some(type_ref.into());
        self
    }
}

/// Two-winding transformer branch (HV side = `from_node_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerBranch {
    pub id: String,
    pub name: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub rated_power_mva: f64,
    pub voltage_hv_kv: f64,
    pub voltage_lv_kv: f64,
    /// Short-circuit voltage in percent
    pub uk_percent: f64,
    /// Copper (load) losses in kW
    pub pk_kw: f64,
    /// No-load current in percent
    pub i0_percent: f64,
    /// Iron (no-load) losses in kW
    pub p0_kw: f64,
    pub vector_group: String,
    pub tap_position: i32,
    pub tap_step_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
    pub in_service: bool,
}

impl TransformerBranch {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        from_node_id: impl Into<String>,
        to_node_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            from_node_id: from_node_id.into(),
            to_node_id: to_node_id.into(),
            rated_power_mva: 0.0,
            voltage_hv_kv: 0.0,
            voltage_lv_kv: 0.0,
            uk_percent: 0.0,
            pk_kw: 0.0,
            i0_percent: 0.0,
            p0_kw: 0.0,
            vector_group: String::new(),
            tap_position: 0,
            tap_step_percent: 0.0,
            type_ref: None,
            in_service: true,
        }
    }

    /// Set nameplate ratings: Sn, HV/LV voltages, uk%, Pk.
    pub fn with_rating(
        mut self,
        rated_power_mva: f64,
        voltage_hv_kv: f64,
        voltage_lv_kv: f64,
        uk_percent: f64,
        pk_kw: f64,
    ) -> Self {
        self.rated_power_mva = rated_power_mva;
        self.voltage_hv_kv = voltage_hv_kv;
        self.voltage_lv_kv = voltage_lv_kv;
        self.uk_percent = uk_percent;
        self.pk_kw = pk_kw;
        self
    }

    pub fn with_vector_group(mut self, vector_group: impl Into<String>) -> Self {
        self.vector_group = vector_group.into();
        self
    }

    pub fn with_tap(mut self, tap_position: i32, tap_step_percent: f64) -> Self {
        self.tap_position = tap_position;
        self.tap_step_percent = tap_step_percent;
        self
    }

    /// Tap ratio applied from the HV side.
    pub fn tap_ratio(&self) -> f64 {
        1.0 + f64::from(self.tap_position) * self.tap_step_percent / 100.0
    }
}

/// Closed branch sum type. String tags exist only in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "branch_type")]
pub enum Branch {
    #[serde(rename = "LINE")]
    Line(LineBranch),
    #[serde(rename = "CABLE")]
    Cable(LineBranch),
    #[serde(rename = "TRANSFORMER")]
    Transformer(TransformerBranch),
}

impl Branch {
    pub fn id(&self) -> &str {
        match self {
            Branch::Line(b) | Branch::Cable(b) => &b.id,
            Branch::Transformer(t) => &t.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Branch::Line(b) | Branch::Cable(b) => &b.name,
            Branch::Transformer(t) => &t.name,
        }
    }

    pub fn from_node_id(&self) -> &str {
        match self {
            Branch::Line(b) | Branch::Cable(b) => &b.from_node_id,
            Branch::Transformer(t) => &t.from_node_id,
        }
    }

    pub fn to_node_id(&self) -> &str {
        match self {
            Branch::Line(b) | Branch::Cable(b) => &b.to_node_id,
            Branch::Transformer(t) => &t.to_node_id,
        }
    }

    pub fn in_service(&self) -> bool {
        match self {
            Branch::Line(b) | Branch::Cable(b) => b.in_service,
            Branch::Transformer(t) => t.in_service,
        }
    }

    /// The tag used at the canonical-value boundary.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Branch::Line(_) => "LINE",
            Branch::Cable(_) => "CABLE",
            Branch::Transformer(_) => "TRANSFORMER",
        }
    }

    /// Line/cable payload if this branch is a conductor segment.
    pub fn as_conductor(&self) -> Option<&LineBranch> {
        match self {
            Branch::Line(b) | Branch::Cable(b) => Some(b),
            Branch::Transformer(_) => None,
        }
    }

    /// Transformer payload if this branch is a transformer.
    pub fn as_transformer(&self) -> Option<&TransformerBranch> {
        match self {
            Branch::Transformer(t) => Some(t),
            _ => None,
        }
    }
}

/// Switching device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchType {
    Breaker,
    Disconnector,
    LoadSwitch,
    Recloser,
    Fuse,
}

/// Switch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchState {
    Open,
    Closed,
}

/// Switching device between two buses.
///
/// Closed in-service switches are zero-impedance merges for the solvers;
/// open switches disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub id: String,
    pub name: String,
    pub from_node_id: String,
    pub to_node_id: String,
    pub switch_type: SwitchType,
    pub state: SwitchState,
    pub in_service: bool,
}

impl Switch {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        from_node_id: impl Into<String>,
        to_node_id: impl Into<String>,
        switch_type: SwitchType,
        state: SwitchState,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            from_node_id: from_node_id.into(),
            to_node_id: to_node_id.into(),
            switch_type,
            state,
            in_service: true,
        }
    }

    /// True when the switch conducts (closed and in service).
    pub fn conducts(&self) -> bool {
        self.in_service && self.state == SwitchState::Closed
    }
}

/// Converter technology of an inverter-based source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConverterKind {
    Pv,
    Bess,
    Wind,
}

/// Inverter-based source (PV plant, battery, wind converter).
///
/// Short-circuit contribution is current-limited: `k_sc · in_rated_a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterSource {
    pub id: String,
    pub name: String,
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter_kind: Option<ConverterKind>,
    pub in_rated_a: f64,
    pub k_sc: f64,
    pub contributes_negative_sequence: bool,
    pub contributes_zero_sequence: bool,
    pub in_service: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
}

impl InverterSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_id: impl Into<String>,
        in_rated_a: f64,
        k_sc: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_id: node_id.into(),
            converter_kind: None,
            in_rated_a,
            k_sc,
            contributes_negative_sequence: false,
            contributes_zero_sequence: false,
            in_service: true,
            type_ref: None,
        }
    }
}

/// Size and load summary of a graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub num_nodes: usize,
    pub num_branches: usize,
    pub num_switches: usize,
    pub num_inverter_sources: usize,
    pub total_load_mw: f64,
    pub total_load_mvar: f64,
}

/// The mutable network model: id-keyed element maps plus the owning model id.
///
/// Mutation stops the moment a snapshot is taken of the graph; from then on
/// every change goes through a fresh copy and a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkGraph {
    pub network_model_id: String,
    pub nodes: BTreeMap<String, Node>,
    pub branches: BTreeMap<String, Branch>,
    pub switches: BTreeMap<String, Switch>,
    pub inverter_sources: BTreeMap<String, InverterSource>,
}

impl NetworkGraph {
    pub fn new(network_model_id: impl Into<String>) -> Self {
        Self {
            network_model_id: network_model_id.into(),
            ..Self::default()
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    pub fn add_node(&mut self, node: Node) -> CoreResult<()> {
        if self.contains_id(&node.id) {
            return Err(CoreError::DuplicateIdentifier {
                element_id: node.id,
            });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn add_branch(&mut self, branch: Branch) -> CoreResult<()> {
        if self.contains_id(branch.id()) {
            return Err(CoreError::DuplicateIdentifier {
                element_id: branch.id().to_string(),
            });
        }
        self.check_endpoints(branch.id(), branch.from_node_id(), branch.to_node_id())?;
        self.branches.insert(branch.id().to_string(), branch);
        Ok(())
    }

    pub fn add_switch(&mut self, switch: Switch) -> CoreResult<()> {
        if self.contains_id(&switch.id) {
            return Err(CoreError::DuplicateIdentifier {
                element_id: switch.id,
            });
        }
        self.check_endpoints(&switch.id, &switch.from_node_id, &switch.to_node_id)?;
        self.switches.insert(switch.id.clone(), switch);
        Ok(())
    }

    pub fn add_inverter_source(&mut self, source: InverterSource) -> CoreResult<()> {
        if self.contains_id(&source.id) {
            return Err(CoreError::DuplicateIdentifier {
                element_id: source.id,
            });
        }
        if !self.nodes.contains_key(&source.node_id) {
            return Err(CoreError::DanglingReference {
                element_id: source.id.clone(),
                missing_ref: source.node_id.clone(),
            });
        }
        self.inverter_sources.insert(source.id.clone(), source);
        Ok(())
    }

    fn check_endpoints(&self, element_id: &str, from: &str, to: &str) -> CoreResult<()> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(CoreError::DanglingReference {
                    element_id: element_id.to_string(),
                    missing_ref: endpoint.to_string(),
                });
            }
        }
        if from == to {
            return Err(CoreError::ParameterInconsistent(format!(
                "element {element_id} connects node {from} to itself"
            )));
        }
        Ok(())
    }

    fn contains_id(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
            || self.branches.contains_key(id)
            || self.switches.contains_key(id)
            || self.inverter_sources.contains_key(id)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a node and purge every branch, switch, and source touching it.
    pub fn remove_node(&mut self, node_id: &str) -> CoreResult<Node> {
        let node = self.nodes.remove(node_id).ok_or_else(|| CoreError::NotFound {
            element_id: node_id.to_string(),
        })?;
        self.branches
            .retain(|_, b| b.from_node_id() != node_id && b.to_node_id() != node_id);
        self.switches
            .retain(|_, s| s.from_node_id != node_id && s.to_node_id != node_id);
        self.inverter_sources.retain(|_, s| s.node_id != node_id);
        Ok(node)
    }

    pub fn remove_branch(&mut self, branch_id: &str) -> CoreResult<Branch> {
        self.branches
            .remove(branch_id)
            .ok_or_else(|| CoreError::NotFound {
                element_id: branch_id.to_string(),
            })
    }

    pub fn remove_switch(&mut self, switch_id: &str) -> CoreResult<Switch> {
        self.switches
            .remove(switch_id)
            .ok_or_else(|| CoreError::NotFound {
                element_id: switch_id.to_string(),
            })
    }

    pub fn remove_inverter_source(&mut self, source_id: &str) -> CoreResult<InverterSource> {
        self.inverter_sources
            .remove(source_id)
            .ok_or_else(|| CoreError::NotFound {
                element_id: source_id.to_string(),
            })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_node(&self, node_id: &str) -> CoreResult<&Node> {
        self.nodes.get(node_id).ok_or_else(|| CoreError::NotFound {
            element_id: node_id.to_string(),
        })
    }

    pub fn get_branch(&self, branch_id: &str) -> CoreResult<&Branch> {
        self.branches
            .get(branch_id)
            .ok_or_else(|| CoreError::NotFound {
                element_id: branch_id.to_string(),
            })
    }

    /// All slack nodes in id order.
    pub fn slack_nodes(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.node_type == NodeType::Slack)
            .collect()
    }

    /// The slack node, or `NotFound` when the graph has none.
    pub fn get_slack_node(&self) -> CoreResult<&Node> {
        self.slack_nodes()
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound {
                element_id: "<slack>".to_string(),
            })
    }

    /// Nodes that can feed a fault: slack buses and buses carrying an
    /// in-service inverter source.
    pub fn source_nodes(&self) -> Vec<&Node> {
        let inverter_buses: HashSet<&str> = self
            .inverter_sources
            .values()
            .filter(|s| s.in_service)
            .map(|s| s.node_id.as_str())
            .collect();
        self.nodes
            .values()
            .filter(|n| n.node_type == NodeType::Slack || inverter_buses.contains(n.id.as_str()))
            .collect()
    }

    /// Line/cable segments in id order.
    pub fn conductors(&self) -> impl Iterator<Item = &LineBranch> {
        self.branches.values().filter_map(Branch::as_conductor)
    }

    /// Transformers in id order.
    pub fn transformers(&self) -> impl Iterator<Item = &TransformerBranch> {
        self.branches.values().filter_map(Branch::as_transformer)
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            num_nodes: self.nodes.len(),
            num_branches: self.branches.len(),
            num_switches: self.switches.len(),
            num_inverter_sources: self.inverter_sources.len(),
            ..NetworkStats::default()
        };
        for node in self.nodes.values() {
            if node.node_type == NodeType::Pq && node.in_service {
                stats.total_load_mw += node.p_mw.value();
                stats.total_load_mvar += node.q_mvar.value();
            }
        }
        stats
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Project the in-service topology into a petgraph graph.
    ///
    /// With `respect_switches`, only closed in-service switches connect
    /// their endpoints; otherwise every in-service switch does regardless
    /// of position. Out-of-service branches never connect.
    fn topology_graph(
        &self,
        respect_switches: bool,
    ) -> (
        Graph<&str, (), Undirected>,
        HashMap<&str, petgraph::graph::NodeIndex>,
    ) {
        let mut topo: Graph<&str, (), Undirected> = Graph::new_undirected();
        let mut index: HashMap<&str, petgraph::graph::NodeIndex> = HashMap::new();
        for id in self.nodes.keys() {
            index.insert(id.as_str(), topo.add_node(id.as_str()));
        }
        let mut connect = |topo: &mut Graph<&str, (), Undirected>, from: &str, to: &str| {
            if let (Some(&a), Some(&b)) = (index.get(from), index.get(to)) {
                topo.add_edge(a, b, ());
            }
        };
        for branch in self.branches.values() {
            if branch.in_service() {
                connect(&mut topo, branch.from_node_id(), branch.to_node_id());
            }
        }
        for switch in self.switches.values() {
            let conducts = if respect_switches {
                switch.conducts()
            } else {
                switch.in_service
            };
            if conducts {
                connect(&mut topo, &switch.from_node_id, &switch.to_node_id);
            }
        }
        (topo, index)
    }

    /// Connected components over in-service elements, as sorted id sets.
    ///
    /// Breadth-first labelling started in ascending id order, so the
    /// resulting component list is deterministic without a final sort.
    pub fn connected_components(&self, respect_switches: bool) -> Vec<BTreeSet<String>> {
        let (topo, index) = self.topology_graph(respect_switches);
        let mut visited: HashSet<petgraph::graph::NodeIndex> = HashSet::new();
        let mut components: Vec<BTreeSet<String>> = Vec::new();
        for id in self.nodes.keys() {
            let start = index[id.as_str()];
            if visited.contains(&start) {
                continue;
            }
            let mut members = BTreeSet::new();
            let mut queue = VecDeque::new();
            queue.push_back(start);
            while let Some(node) = queue.pop_front() {
                if !visited.insert(node) {
                    continue;
                }
                members.insert(topo[node].to_string());
                for neighbor in topo.neighbors(node) {
                    if !visited.contains(&neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            components.push(members);
        }
        components
    }

    // =========================================================================
    // Canonical boundary
    // =========================================================================

    /// Canonical value tree of the whole graph.
    ///
    /// Element maps become id-sorted arrays; the codec re-sorts and rounds
    /// on hashing, so this dump is the only adapter between the typed model
    /// and JSON.
    pub fn to_canonical_value(&self) -> CodecResult<Value> {
        let to_values = |result: Result<Vec<Value>, serde_json::Error>| {
            result.map_err(|err| crate::canonical::CodecError::Serialize(err.to_string()))
        };
        let nodes = to_values(self.nodes.values().map(serde_json::to_value).collect())?;
        let branches = to_values(self.branches.values().map(serde_json::to_value).collect())?;
        let switches = to_values(self.switches.values().map(serde_json::to_value).collect())?;
        let sources = to_values(
            self.inverter_sources
                .values()
                .map(serde_json::to_value)
                .collect(),
        )?;
        canonical::canonicalize(&serde_json::json!({
            "network_model_id": self.network_model_id,
            "nodes": nodes,
            "branches": branches,
            "switches": switches,
            "inverter_sources": sources,
        }))
    }
}
