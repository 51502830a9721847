//! IEC 60909 short-circuit solver.
//!
//! Thevenin method over the Z-bus: assemble the positive-sequence Y-bus,
//! reduce it at the voltage sources, and read the driving-point impedance
//! at the fault node. The canonical three-phase chain is
//!
//! ```text
//! Zk → κ → Ik'' → ip → Ib → Ith → Sk''
//! ```
//!
//! with every step recorded in the white-box trace (formula, symbol
//! values, numeric substitution, result).
//!
//! Grid modelling at a supply bus follows the network-feeder rule of the
//! standard: `Z_Q = c·U_n² / S_k3`, X = 0.995·|Z|, R = 0.1·X. A slack bus
//! without `S_k3` is an ideal source and is grounded outright during the
//! reduction.
//!
//! Unbalanced faults (1F, 2F, 2FG) combine the sequence impedances; the
//! negative sequence is taken equal to the positive one unless per-element
//! data says otherwise, the zero sequence comes from a separately
//! assembled Y0-bus.

use crate::mn_table::{m_factor, m_factor_analytic, N_FAR_FROM_GENERATOR};
use crate::trace::TraceStep;
use crate::ybus::{build_y_bus, SequenceKind, YBus};
use crate::{SolverError, SolverResult};
use mvnet_input::contracts::ShortCircuitPayload;
use num_complex::Complex64;
use serde::Serialize;

/// Fault variant under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    ThreePhase,
    TwoPhase,
    SinglePhase,
    TwoPhaseToGround,
}

impl FaultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultType::ThreePhase => "SC_3F",
            FaultType::TwoPhase => "SC_2F",
            FaultType::SinglePhase => "SC_1F",
            FaultType::TwoPhaseToGround => "SC_2FG",
        }
    }

    /// Whether the variant needs the zero-sequence network.
    pub fn needs_zero_sequence(&self) -> bool {
        matches!(self, FaultType::SinglePhase | FaultType::TwoPhaseToGround)
    }
}

/// Where a fault-current share comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionKind {
    Grid,
    Inverter,
}

/// Source-wise share of the initial short-circuit current.
#[derive(Debug, Clone, Serialize)]
pub struct SourceContribution {
    pub source_ref: String,
    pub kind: ContributionKind,
    pub i_contrib_a: f64,
    pub share: f64,
}

/// Current-divider share of one branch adjacent to the fault.
#[derive(Debug, Clone, Serialize)]
pub struct BranchContribution {
    pub branch_ref: String,
    pub i_branch_a: f64,
    /// `to_fault`, `from_fault`, or `mixed` after aggregation.
    pub direction: String,
}

/// Complete result of one short-circuit calculation.
#[derive(Debug, Clone, Serialize)]
pub struct ShortCircuitSolution {
    pub fault_node_id: String,
    pub fault_type: String,
    /// Initial symmetric short-circuit current Ik'' (A)
    pub ikss_a: f64,
    /// Peak current ip (A)
    pub ip_a: f64,
    /// Symmetric breaking current Ib (A)
    pub ib_a: f64,
    /// Thermal-equivalent current Ith (A)
    pub ith_a: f64,
    /// Initial short-circuit power Sk'' (MVA)
    pub sk_mva: f64,
    pub kappa: f64,
    pub r_over_x: f64,
    pub zk_r_ohm: f64,
    pub zk_x_ohm: f64,
    pub contributions: Vec<SourceContribution>,
    pub branch_contributions: Vec<BranchContribution>,
    /// Warning codes from the closed table.
    pub warnings: Vec<String>,
    pub trace: Vec<TraceStep>,
}

/// IEC 60909 short-circuit solver.
#[derive(Debug, Clone, Default)]
pub struct ShortCircuitSolver {
    fault_impedance_ohm: Option<f64>,
}

impl ShortCircuitSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a scenario fault impedance. Non-zero values are currently
    /// ignored with a warning (solid fault assumed).
    pub fn with_fault_impedance(mut self, z_f_ohm: f64) -> Self {
        self.fault_impedance_ohm = Some(z_f_ohm);
        self
    }

    /// Run the calculation for a fault at `fault_node_id`.
    ///
    /// `z0_bus` supplies a pre-assembled zero-sequence network; when
    /// absent it is assembled from the payload's `r0`/`x0` data. Missing
    /// zero-sequence data for an unbalanced fault surfaces as
    /// `EligibilityBlocker("ELIG_SC1F_NO_Z0")`.
    pub fn solve(
        &self,
        payload: &ShortCircuitPayload,
        fault_node_id: &str,
        fault_type: FaultType,
        z0_bus: Option<&YBus>,
    ) -> SolverResult<ShortCircuitSolution> {
        let mut warnings: Vec<String> = Vec::new();

        let y1 = build_y_bus(
            &payload.buses,
            &payload.branches,
            &payload.transformers,
            &payload.switches,
            payload.base_mva,
            SequenceKind::Positive,
        )?;
        let fault_idx = y1.index_of(fault_node_id)?;
        let un_kv = y1.voltage_base_kv[fault_idx];
        if un_kv <= 0.0 {
            return Err(SolverError::ValueDomain(format!(
                "fault node {fault_node_id} has no voltage level"
            )));
        }
        let un_v = un_kv * 1e3;
        let c = payload.c_factor;
        let z_base = y1.z_base_ohm(fault_idx);

        let z1_pu = thevenin_impedance(payload, &y1, fault_idx, c)?;
        let z1_ohm = z1_pu * z_base;

        // Sequence combination per fault variant, in Ω at the fault
        // voltage base. Z2 = Z1 (far-from-generator network).
        let (z_loop_ohm, z0_ohm, ikss_a) = match fault_type {
            FaultType::ThreePhase => {
                let ik = c * un_v / (3f64.sqrt() * z1_ohm.norm());
                (z1_ohm, None, ik)
            }
            FaultType::TwoPhase => {
                let z_loop = z1_ohm * 2.0;
                let ik = c * un_v / z_loop.norm();
                (z_loop, None, ik)
            }
            FaultType::SinglePhase => {
                let z0_ohm = self.zero_sequence_impedance(
                    payload, z0_bus, fault_node_id, c, z_base,
                )?;
                let z_loop = z1_ohm * 2.0 + z0_ohm;
                let ik = 3f64.sqrt() * c * un_v / z_loop.norm();
                (z_loop, Some(z0_ohm), ik)
            }
            FaultType::TwoPhaseToGround => {
                let z0_ohm = self.zero_sequence_impedance(
                    payload, z0_bus, fault_node_id, c, z_base,
                )?;
                let z_loop = z1_ohm + z0_ohm * 2.0;
                let ik = 3f64.sqrt() * c * un_v / z_loop.norm();
                (z_loop, Some(z0_ohm), ik)
            }
        };

        if let Some(z_f) = self.fault_impedance_ohm {
            if z_f > 0.0 {
                warnings.push("SC_FAULT_IMPEDANCE_IGNORED".to_string());
            }
        }

        if !ikss_a.is_finite() || ikss_a <= 0.0 {
            return Err(SolverError::ValueDomain(format!(
                "non-physical initial current {ikss_a} at {fault_node_id}"
            )));
        }

        let r_over_x = if z_loop_ohm.im.abs() > 1e-12 {
            z_loop_ohm.re / z_loop_ohm.im
        } else {
            0.0
        };
        let kappa = (1.02 + 0.98 * (-3.0 * r_over_x).exp()).clamp(1.0, 2.0);
        let ip_a = 2f64.sqrt() * kappa * ikss_a;
        let ib_a = ikss_a;

        let t_k = payload.thermal_time_seconds;
        let m = match m_factor(t_k, kappa) {
            Some(m) => m,
            None => {
                warnings.push("SC_THERMAL_TIME_OUT_OF_TABLE".to_string());
                m_factor_analytic(t_k, kappa)
            }
        };
        let n = N_FAR_FROM_GENERATOR;
        let ith_a = ikss_a * (m + n).sqrt();
        let sk_mva = 3f64.sqrt() * un_v * ikss_a / 1e6;

        for value in [ip_a, ith_a, sk_mva, kappa] {
            if !value.is_finite() {
                return Err(SolverError::ValueDomain(
                    "non-finite derived short-circuit quantity".to_string(),
                ));
            }
        }

        let contributions =
            self.source_contributions(payload, fault_node_id, ikss_a, &mut warnings);
        let branch_contributions = branch_current_divider(payload, &y1, fault_idx, ikss_a);

        let trace = build_trace(
            fault_type, c, un_v, z_loop_ohm, z0_ohm, kappa, r_over_x, ikss_a, ip_a, ib_a, ith_a,
            m, n, t_k, sk_mva,
        );

        Ok(ShortCircuitSolution {
            fault_node_id: fault_node_id.to_string(),
            fault_type: fault_type.as_str().to_string(),
            ikss_a,
            ip_a,
            ib_a,
            ith_a,
            sk_mva,
            kappa,
            r_over_x,
            zk_r_ohm: z_loop_ohm.re,
            zk_x_ohm: z_loop_ohm.im,
            contributions,
            branch_contributions,
            warnings,
            trace,
        })
    }

    fn zero_sequence_impedance(
        &self,
        payload: &ShortCircuitPayload,
        z0_bus: Option<&YBus>,
        fault_node_id: &str,
        c: f64,
        z_base: f64,
    ) -> SolverResult<Complex64> {
        let owned;
        let y0 = match z0_bus {
            Some(prebuilt) => prebuilt,
            None => {
                owned = build_y_bus(
                    &payload.buses,
                    &payload.branches,
                    &payload.transformers,
                    &payload.switches,
                    payload.base_mva,
                    SequenceKind::Zero,
                )?;
                &owned
            }
        };
        let idx = y0.index_of(fault_node_id)?;
        let z0_pu = thevenin_impedance(payload, y0, idx, c)?;
        Ok(z0_pu * z_base)
    }

    fn source_contributions(
        &self,
        payload: &ShortCircuitPayload,
        fault_node_id: &str,
        ikss_a: f64,
        warnings: &mut Vec<String>,
    ) -> Vec<SourceContribution> {
        let mut contributions = Vec::new();
        let mut inverter_total = 0.0;

        if payload.include_inverter_contribution {
            for source in payload
                .inverter_sources
                .iter()
                .filter(|s| s.in_service)
            {
                let i_contrib = source.k_sc * source.in_rated_a;
                inverter_total += i_contrib;
                contributions.push(SourceContribution {
                    source_ref: source.ref_id.clone(),
                    kind: ContributionKind::Inverter,
                    i_contrib_a: i_contrib,
                    share: i_contrib / ikss_a,
                });
            }
        }

        let mut grid_contrib = ikss_a - inverter_total;
        if grid_contrib < 0.0 {
            grid_contrib = 0.0;
            warnings.push("SC_GRID_SHARE_CLAMPED".to_string());
        }
        let grid_ref = payload
            .buses
            .iter()
            .find(|b| b.node_type == "SLACK")
            .map(|b| b.ref_id.clone())
            .unwrap_or_else(|| fault_node_id.to_string());
        contributions.insert(
            0,
            SourceContribution {
                source_ref: grid_ref,
                kind: ContributionKind::Grid,
                i_contrib_a: grid_contrib,
                share: grid_contrib / ikss_a,
            },
        );
        contributions
    }
}

/// Driving-point (Thevenin) impedance at `fault_idx`, per-unit.
///
/// Voltage sources are folded in first: slack buses with `S_k3` become a
/// network-feeder admittance on the diagonal, slack buses without become
/// grounded nodes removed during the reduction. The remaining system is
/// solved for the fault-node column of the Z-bus.
fn thevenin_impedance(
    payload: &ShortCircuitPayload,
    ybus: &YBus,
    fault_idx: usize,
    c: f64,
) -> SolverResult<Complex64> {
    let n = ybus.size();
    let mut matrix = ybus.matrix.clone();
    let mut grounded = vec![false; n];

    for bus in &payload.buses {
        if bus.node_type != "SLACK" || !bus.in_service {
            continue;
        }
        let idx = ybus.node_index[&bus.ref_id];
        match bus.sk3_mva {
            Some(sk3) if sk3 > 0.0 => {
                let un = bus.voltage_level_kv;
                let z_q_abs = c * un * un / sk3;
                let x_q = 0.995 * z_q_abs;
                let r_q = 0.1 * x_q;
                let z_q_pu = Complex64::new(r_q, x_q) / ybus.z_base_ohm(idx);
                matrix[idx][idx] += z_q_pu.inv();
            }
            _ => grounded[idx] = true,
        }
    }

    if grounded[fault_idx] {
        return Err(SolverError::ValueDomain(
            "fault at an ideal source bus has unbounded current".to_string(),
        ));
    }

    // Reduce: keep rows/cols of ungrounded nodes, solve Y·z = e_fault.
    let keep: Vec<usize> = (0..n).filter(|&i| !grounded[i]).collect();
    let position: std::collections::BTreeMap<usize, usize> = keep
        .iter()
        .enumerate()
        .map(|(pos, &idx)| (idx, pos))
        .collect();
    let m = keep.len();
    let mut reduced = vec![vec![Complex64::new(0.0, 0.0); m]; m];
    for (ri, &i) in keep.iter().enumerate() {
        for (rj, &j) in keep.iter().enumerate() {
            reduced[ri][rj] = matrix[i][j];
        }
    }
    let mut rhs = vec![Complex64::new(0.0, 0.0); m];
    rhs[position[&fault_idx]] = Complex64::new(1.0, 0.0);

    let column = solve_complex_system(&reduced, &rhs)?;
    let zkk = column[position[&fault_idx]];
    if !zkk.re.is_finite() || !zkk.im.is_finite() {
        return Err(SolverError::NumericalFailure(
            "non-finite Thevenin impedance".to_string(),
        ));
    }
    Ok(zkk)
}

/// Gaussian elimination with partial pivoting over complex entries.
fn solve_complex_system(
    a: &[Vec<Complex64>],
    b: &[Complex64],
) -> SolverResult<Vec<Complex64>> {
    let n = b.len();
    if n == 0 {
        return Err(SolverError::NumericalFailure(
            "empty system after source reduction".to_string(),
        ));
    }

    let mut aug: Vec<Vec<Complex64>> = a.to_vec();
    for (row, value) in aug.iter_mut().zip(b.iter()) {
        row.push(*value);
    }

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].norm();
        for row in (col + 1)..n {
            if aug[row][col].norm() > max_val {
                max_val = aug[row][col].norm();
                max_row = row;
            }
        }
        if max_val < 1e-12 {
            return Err(SolverError::NumericalFailure(
                "singular admittance matrix (isolated island at the fault)".to_string(),
            ));
        }
        aug.swap(col, max_row);

        for row in (col + 1)..n {
            let factor = aug[row][col] / aug[col][col];
            for k in col..=n {
                let above = aug[col][k];
                aug[row][k] -= factor * above;
            }
        }
    }

    let mut x = vec![Complex64::new(0.0, 0.0); n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }
    Ok(x)
}

/// Distribute the fault current over branches adjacent to the fault node
/// by the admittance current divider.
fn branch_current_divider(
    payload: &ShortCircuitPayload,
    ybus: &YBus,
    fault_idx: usize,
    ikss_a: f64,
) -> Vec<BranchContribution> {
    let mut adjacent: Vec<(String, f64)> = Vec::new();

    for branch in payload.branches.iter().filter(|b| b.in_service) {
        let (Some(&i), Some(&j)) = (
            ybus.node_index.get(&branch.from_bus_ref),
            ybus.node_index.get(&branch.to_bus_ref),
        ) else {
            continue;
        };
        if i != j && (i == fault_idx || j == fault_idx) {
            let z = Complex64::new(branch.r_ohm_per_km, branch.x_ohm_per_km) * branch.length_km;
            if z.norm() > 1e-12 {
                adjacent.push((branch.ref_id.clone(), z.inv().norm()));
            }
        }
    }
    for trafo in payload.transformers.iter().filter(|t| t.in_service) {
        let (Some(&i), Some(&j)) = (
            ybus.node_index.get(&trafo.from_bus_ref),
            ybus.node_index.get(&trafo.to_bus_ref),
        ) else {
            continue;
        };
        if i != j && (i == fault_idx || j == fault_idx) && trafo.rated_power_mva > 0.0 {
            let z_ohm_lv = trafo.uk_percent / 100.0 * trafo.voltage_lv_kv * trafo.voltage_lv_kv
                / trafo.rated_power_mva;
            if z_ohm_lv > 1e-12 {
                adjacent.push((trafo.ref_id.clone(), 1.0 / z_ohm_lv));
            }
        }
    }

    let total: f64 = adjacent.iter().map(|(_, y)| y).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    let raw: Vec<BranchContribution> = adjacent
        .into_iter()
        .map(|(branch_ref, y)| BranchContribution {
            branch_ref,
            i_branch_a: ikss_a * y / total,
            direction: "to_fault".to_string(),
        })
        .collect();
    aggregate_branch_contributions(raw)
}

/// Merge duplicate branch entries. Agreeing directions sum plainly;
/// disagreeing directions report `mixed` and sum magnitudes.
pub fn aggregate_branch_contributions(
    entries: Vec<BranchContribution>,
) -> Vec<BranchContribution> {
    use std::collections::BTreeMap;
    let mut merged: BTreeMap<String, BranchContribution> = BTreeMap::new();
    for entry in entries {
        match merged.get_mut(&entry.branch_ref) {
            None => {
                merged.insert(entry.branch_ref.clone(), entry);
            }
            Some(existing) => {
                if existing.direction != entry.direction {
                    existing.direction = "mixed".to_string();
                }
                existing.i_branch_a += entry.i_branch_a.abs();
            }
        }
    }
    merged.into_values().collect()
}

#[allow(clippy::too_many_arguments)]
fn build_trace(
    fault_type: FaultType,
    c: f64,
    un_v: f64,
    z_loop_ohm: Complex64,
    z0_ohm: Option<Complex64>,
    kappa: f64,
    r_over_x: f64,
    ikss_a: f64,
    ip_a: f64,
    ib_a: f64,
    ith_a: f64,
    m: f64,
    n: f64,
    t_k: f64,
    sk_mva: f64,
) -> Vec<TraceStep> {
    let zk_abs = z_loop_ohm.norm();

    let mut zk_step = TraceStep::new(
        "Zk",
        "Impedancja zwarciowa w miejscu zwarcia",
        r"Z_k = \sqrt{R_k^2 + X_k^2}",
    )
    .input("R_k", z_loop_ohm.re, "Ω")
    .input("X_k", z_loop_ohm.im, "Ω")
    .substitution(format!(
        "Zk = √({:.4}² + {:.4}²) = {:.4} Ω",
        z_loop_ohm.re, z_loop_ohm.im, zk_abs
    ))
    .result(zk_abs, "Ω");
    if let Some(z0) = z0_ohm {
        zk_step = zk_step.input("Z_0", z0.norm(), "Ω");
    }

    let ikss_formula = match fault_type {
        FaultType::ThreePhase => r"I_k'' = \frac{c \cdot U_n}{\sqrt{3} \cdot Z_k}",
        FaultType::TwoPhase => r"I_k'' = \frac{c \cdot U_n}{Z_1 + Z_2}",
        FaultType::SinglePhase => r"I_k'' = \frac{\sqrt{3} \cdot c \cdot U_n}{Z_1 + Z_2 + Z_0}",
        FaultType::TwoPhaseToGround => r"I_k'' = \frac{\sqrt{3} \cdot c \cdot U_n}{Z_1 + 2 Z_0}",
    };

    vec![
        zk_step,
        TraceStep::new("kappa", "Współczynnik udaru", r"\kappa = 1{,}02 + 0{,}98 \cdot e^{-3 R/X}")
            .input("R/X", r_over_x, "")
            .substitution(format!(
                "κ = 1,02 + 0,98·e^(−3·{:.4}) = {:.4}",
                r_over_x, kappa
            ))
            .result(kappa, ""),
        TraceStep::new("Ikss", "Prąd zwarciowy początkowy", ikss_formula)
            .input("c", c, "")
            .input("U_n", un_v, "V")
            .input("Z_k", zk_abs, "Ω")
            .substitution(format!(
                "Ik'' = {:.2}·{:.0} V / (√3·{:.4} Ω) = {:.1} A",
                c, un_v, zk_abs, ikss_a
            ))
            .result(ikss_a, "A"),
        TraceStep::new("Ip", "Prąd udarowy", r"i_p = \sqrt{2} \cdot \kappa \cdot I_k''")
            .input("κ", kappa, "")
            .input("I_k''", ikss_a, "A")
            .substitution(format!("ip = √2·{:.4}·{:.1} = {:.1} A", kappa, ikss_a, ip_a))
            .result(ip_a, "A"),
        TraceStep::new("Ib", "Prąd wyłączeniowy symetryczny", r"I_b = I_k''")
            .input("I_k''", ikss_a, "A")
            .substitution(format!("Ib = {ikss_a:.1} A"))
            .result(ib_a, "A"),
        TraceStep::new(
            "Ith",
            "Prąd cieplny zastępczy",
            r"I_{th} = I_k'' \cdot \sqrt{m + n}",
        )
        .input("m", m, "")
        .input("n", n, "")
        .input("t_k", t_k, "s")
        .substitution(format!(
            "Ith = {:.1}·√({:.4} + {:.4}) = {:.1} A",
            ikss_a, m, n, ith_a
        ))
        .result(ith_a, "A"),
        TraceStep::new(
            "Sk",
            "Moc zwarciowa początkowa",
            r"S_k'' = \sqrt{3} \cdot U_n \cdot I_k''",
        )
        .input("U_n", un_v, "V")
        .input("I_k''", ikss_a, "A")
        .substitution(format!(
            "Sk'' = √3·{:.0}·{:.1} / 10⁶ = {:.1} MVA",
            un_v, ikss_a, sk_mva
        ))
        .result(sk_mva, "MVA"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvnet_input::contracts::{
        BranchPayload, BusPayload, InverterSourcePayload, TransformerPayload,
    };

    fn bus(id: &str, node_type: &str, kv: f64, sk3: Option<f64>) -> BusPayload {
        BusPayload {
            ref_id: id.to_string(),
            name: id.to_string(),
            node_type: node_type.to_string(),
            voltage_level_kv: kv,
            voltage_magnitude_pu: 1.0,
            voltage_angle_rad: 0.0,
            active_power_mw: 0.0,
            reactive_power_mvar: 0.0,
            sk3_mva: sk3,
            in_service: true,
        }
    }

    fn transformer_25mva() -> TransformerPayload {
        TransformerPayload {
            ref_id: "tr-1".to_string(),
            name: "TR 110/20".to_string(),
            from_bus_ref: "hv".to_string(),
            to_bus_ref: "lv".to_string(),
            rated_power_mva: 25.0,
            voltage_hv_kv: 110.0,
            voltage_lv_kv: 20.0,
            uk_percent: 10.0,
            pk_kw: 120.0,
            i0_percent: 0.0,
            p0_kw: 0.0,
            vector_group: "Dyn11".to_string(),
            tap_position: 0,
            tap_step_percent: 0.0,
            in_service: true,
            catalog_ref: None,
        }
    }

    /// 110/20 kV, 25 MVA transformer, ideal grid: the canonical textbook
    /// network for the LV-side fault.
    fn transformer_payload() -> ShortCircuitPayload {
        ShortCircuitPayload {
            buses: vec![bus("hv", "SLACK", 110.0, None), bus("lv", "PQ", 20.0, None)],
            branches: vec![],
            transformers: vec![transformer_25mva()],
            inverter_sources: vec![],
            switches: vec![],
            base_mva: 100.0,
            c_factor: 1.0,
            thermal_time_seconds: 1.0,
            include_inverter_contribution: true,
        }
    }

    #[test]
    fn three_phase_fault_at_transformer_secondary() {
        let solution = ShortCircuitSolver::new()
            .solve(&transformer_payload(), "lv", FaultType::ThreePhase, None)
            .unwrap();
        // Z_t ≈ 0.1·20²/25 = 1.6 Ω → Ik'' ≈ 20000/(√3·1.6) ≈ 7217 A.
        assert!(
            (solution.ikss_a - 7217.0).abs() / 7217.0 < 0.02,
            "Ik'' = {}",
            solution.ikss_a
        );
        assert!(solution.kappa >= 1.02 && solution.kappa <= 2.0);
        assert!(
            (solution.sk_mva - 250.0).abs() / 250.0 < 0.02,
            "Sk = {}",
            solution.sk_mva
        );
        assert!(solution.ip_a > solution.ikss_a);
        assert!(solution.ith_a >= solution.ikss_a);
    }

    #[test]
    fn trace_carries_mandatory_keys() {
        let solution = ShortCircuitSolver::new()
            .solve(&transformer_payload(), "lv", FaultType::ThreePhase, None)
            .unwrap();
        let keys: Vec<&str> = solution.trace.iter().map(|s| s.key.as_str()).collect();
        for expected in ["Zk", "kappa", "Ikss", "Ip", "Ib", "Ith", "Sk"] {
            assert!(keys.contains(&expected), "missing trace key {expected}");
        }
        // Steps carry rendered substitutions, not just formulas.
        for step in &solution.trace {
            assert!(!step.substitution.is_empty(), "empty substitution in {}", step.key);
        }
    }

    #[test]
    fn grid_contribution_covers_full_current_without_inverters() {
        let solution = ShortCircuitSolver::new()
            .solve(&transformer_payload(), "lv", FaultType::ThreePhase, None)
            .unwrap();
        assert_eq!(solution.contributions.len(), 1);
        let grid = &solution.contributions[0];
        assert_eq!(grid.kind, ContributionKind::Grid);
        assert!((grid.share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn contribution_conservation_with_inverter() {
        let mut payload = transformer_payload();
        payload.inverter_sources.push(InverterSourcePayload {
            ref_id: "inv-1".to_string(),
            name: "PV".to_string(),
            bus_ref: "lv".to_string(),
            converter_kind: Some("PV".to_string()),
            in_rated_a: 500.0,
            k_sc: 1.1,
            contributes_negative_sequence: false,
            contributes_zero_sequence: false,
            in_service: true,
            catalog_ref: None,
        });
        let solution = ShortCircuitSolver::new()
            .solve(&payload, "lv", FaultType::ThreePhase, None)
            .unwrap();
        let total: f64 = solution.contributions.iter().map(|c| c.i_contrib_a).sum();
        assert!((total - solution.ikss_a).abs() / solution.ikss_a <= 0.01);
        let shares: f64 = solution.contributions.iter().map(|c| c.share).sum();
        assert!((shares - 1.0).abs() < 1e-9);
    }

    #[test]
    fn grid_share_clamped_when_inverters_exceed_fault_current() {
        let mut payload = transformer_payload();
        payload.inverter_sources.push(InverterSourcePayload {
            ref_id: "inv-1".to_string(),
            name: "PV".to_string(),
            bus_ref: "lv".to_string(),
            converter_kind: Some("PV".to_string()),
            in_rated_a: 50_000.0,
            k_sc: 1.2,
            contributes_negative_sequence: false,
            contributes_zero_sequence: false,
            in_service: true,
            catalog_ref: None,
        });
        let solution = ShortCircuitSolver::new()
            .solve(&payload, "lv", FaultType::ThreePhase, None)
            .unwrap();
        let grid = solution
            .contributions
            .iter()
            .find(|c| c.kind == ContributionKind::Grid)
            .unwrap();
        assert_eq!(grid.i_contrib_a, 0.0);
        assert!(solution
            .warnings
            .contains(&"SC_GRID_SHARE_CLAMPED".to_string()));
    }

    #[test]
    fn grid_feeder_impedance_limits_current() {
        let mut payload = transformer_payload();
        payload.buses[0].sk3_mva = Some(500.0);
        let with_feeder = ShortCircuitSolver::new()
            .solve(&payload, "lv", FaultType::ThreePhase, None)
            .unwrap();
        let ideal = ShortCircuitSolver::new()
            .solve(&transformer_payload(), "lv", FaultType::ThreePhase, None)
            .unwrap();
        assert!(with_feeder.ikss_a < ideal.ikss_a);
    }

    #[test]
    fn two_phase_is_sqrt3_over_2_of_three_phase() {
        let solver = ShortCircuitSolver::new();
        let three = solver
            .solve(&transformer_payload(), "lv", FaultType::ThreePhase, None)
            .unwrap();
        let two = solver
            .solve(&transformer_payload(), "lv", FaultType::TwoPhase, None)
            .unwrap();
        let ratio = two.ikss_a / three.ikss_a;
        assert!((ratio - 3f64.sqrt() / 2.0).abs() < 1e-6, "ratio {ratio}");
    }

    #[test]
    fn single_phase_without_z0_is_blocked() {
        let result = ShortCircuitSolver::new().solve(
            &transformer_payload(),
            "lv",
            FaultType::SinglePhase,
            None,
        );
        assert!(
            matches!(result, Err(SolverError::EligibilityBlocker(code)) if code == "ELIG_SC1F_NO_Z0")
        );
    }

    #[test]
    fn single_phase_with_z0_data_succeeds() {
        let mut payload = transformer_payload();
        payload.buses.push(bus("st-1", "PQ", 20.0, None));
        payload.branches.push(BranchPayload {
            ref_id: "cab-1".to_string(),
            name: "K1".to_string(),
            branch_type: "CABLE".to_string(),
            from_bus_ref: "lv".to_string(),
            to_bus_ref: "st-1".to_string(),
            r_ohm_per_km: 0.253,
            x_ohm_per_km: 0.073,
            b_us_per_km: 0.0,
            length_km: 0.5,
            rated_current_a: 310.0,
            r0_ohm_per_km: Some(1.01),
            x0_ohm_per_km: Some(0.29),
            in_service: true,
            catalog_ref: None,
        });
        let solution = ShortCircuitSolver::new()
            .solve(&payload, "st-1", FaultType::SinglePhase, None)
            .unwrap();
        assert!(solution.ikss_a > 0.0);
        // Zero-sequence impedance appears among the Zk inputs.
        let zk = solution.trace.iter().find(|s| s.key == "Zk").unwrap();
        assert!(zk.inputs.contains_key("Z_0"));
        let three = ShortCircuitSolver::new()
            .solve(&payload, "st-1", FaultType::ThreePhase, None)
            .unwrap();
        assert!(solution.ikss_a < three.ikss_a);
    }

    #[test]
    fn fault_at_ideal_source_is_value_domain() {
        let result = ShortCircuitSolver::new().solve(
            &transformer_payload(),
            "hv",
            FaultType::ThreePhase,
            None,
        );
        assert!(matches!(result, Err(SolverError::ValueDomain(_))));
    }

    #[test]
    fn isolated_island_is_numerical_failure() {
        let payload = ShortCircuitPayload {
            buses: vec![bus("a", "PQ", 20.0, None), bus("b", "PQ", 20.0, None)],
            branches: vec![BranchPayload {
                ref_id: "l1".to_string(),
                name: "L1".to_string(),
                branch_type: "LINE".to_string(),
                from_bus_ref: "a".to_string(),
                to_bus_ref: "b".to_string(),
                r_ohm_per_km: 0.1,
                x_ohm_per_km: 0.3,
                b_us_per_km: 0.0,
                length_km: 1.0,
                rated_current_a: 300.0,
                r0_ohm_per_km: None,
                x0_ohm_per_km: None,
                in_service: true,
                catalog_ref: None,
            }],
            transformers: vec![],
            inverter_sources: vec![],
            switches: vec![],
            base_mva: 100.0,
            c_factor: 1.0,
            thermal_time_seconds: 1.0,
            include_inverter_contribution: true,
        };
        let result = ShortCircuitSolver::new().solve(&payload, "b", FaultType::ThreePhase, None);
        assert!(matches!(result, Err(SolverError::NumericalFailure(_))));
    }

    #[test]
    fn ignored_fault_impedance_warns() {
        let solution = ShortCircuitSolver::new()
            .with_fault_impedance(0.5)
            .solve(&transformer_payload(), "lv", FaultType::ThreePhase, None)
            .unwrap();
        assert!(solution
            .warnings
            .contains(&"SC_FAULT_IMPEDANCE_IGNORED".to_string()));
    }

    #[test]
    fn mixed_direction_aggregation() {
        let merged = aggregate_branch_contributions(vec![
            BranchContribution {
                branch_ref: "b1".to_string(),
                i_branch_a: 100.0,
                direction: "to_fault".to_string(),
            },
            BranchContribution {
                branch_ref: "b1".to_string(),
                i_branch_a: 40.0,
                direction: "from_fault".to_string(),
            },
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].direction, "mixed");
        assert!((merged[0].i_branch_a - 140.0).abs() < 1e-12);
    }

    #[test]
    fn branch_divider_splits_by_admittance() {
        let mut payload = transformer_payload();
        payload.buses.push(bus("st-1", "PQ", 20.0, None));
        for (id, length) in [("cab-1", 0.5), ("cab-2", 1.0)] {
            payload.branches.push(BranchPayload {
                ref_id: id.to_string(),
                name: id.to_string(),
                branch_type: "CABLE".to_string(),
                from_bus_ref: "lv".to_string(),
                to_bus_ref: "st-1".to_string(),
                r_ohm_per_km: 0.253,
                x_ohm_per_km: 0.073,
                b_us_per_km: 0.0,
                length_km: length,
                rated_current_a: 310.0,
                r0_ohm_per_km: None,
                x0_ohm_per_km: None,
                in_service: true,
                catalog_ref: None,
            });
        }
        let solution = ShortCircuitSolver::new()
            .solve(&payload, "st-1", FaultType::ThreePhase, None)
            .unwrap();
        assert_eq!(solution.branch_contributions.len(), 2);
        let shorter = solution
            .branch_contributions
            .iter()
            .find(|b| b.branch_ref == "cab-1")
            .unwrap();
        let longer = solution
            .branch_contributions
            .iter()
            .find(|b| b.branch_ref == "cab-2")
            .unwrap();
        // The 500 m segment has twice the admittance of the 1 km one.
        assert!((shorter.i_branch_a / longer.i_branch_a - 2.0).abs() < 1e-9);
        let total: f64 = solution
            .branch_contributions
            .iter()
            .map(|b| b.i_branch_a)
            .sum();
        assert!((total - solution.ikss_a).abs() < 1e-6);
    }
}
