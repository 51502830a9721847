//! Newton–Raphson AC power flow over a solver-input payload.
//!
//! Bus classification follows the payload's node types:
//!
//! ```text
//! ┌────────────┬────────────────────┬────────────────────┐
//! │  BUS TYPE  │  SPECIFIED         │  CALCULATED        │
//! │────────────│────────────────────│────────────────────│
//! │  SLACK     │  V, θ              │  P, Q              │
//! │  PV        │  P, |V|            │  Q, θ              │
//! │  PQ        │  P, Q              │  |V|, θ            │
//! └────────────┴────────────────────┴────────────────────┘
//! ```
//!
//! Each iteration computes mismatches, builds the analytic Jacobian
//! (H/N/J/L blocks), solves the linear system by LU factorization, clips
//! the step, and updates the state. The node index comes from sorted ids,
//! so iteration order - and with it the white-box trace - is
//! deterministic.

use crate::trace::{IterationTrace, TraceLevel};
use crate::ybus::{build_y_bus, SequenceKind, YBus};
use crate::{SolverError, SolverResult};
use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use mvnet_input::contracts::LoadFlowPayload;
use num_complex::Complex64;
use serde::Serialize;

/// Largest per-variable Newton step; larger corrections are scaled down.
const MAX_STEP: f64 = 0.5;

/// Bus type classification for power flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusKind {
    Slack,
    Pv,
    Pq,
}

/// Per-bus solution row.
#[derive(Debug, Clone, Serialize)]
pub struct BusResult {
    pub bus_id: String,
    pub v_pu: f64,
    pub u_kv: f64,
    pub angle_deg: f64,
    pub p_injected_mw: f64,
    pub q_injected_mvar: f64,
}

/// Per-branch solution row (lines, cables, and transformers).
#[derive(Debug, Clone, Serialize)]
pub struct BranchFlow {
    pub branch_id: String,
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub losses_p_mw: f64,
    pub losses_q_mvar: f64,
    pub i_from_a: f64,
    /// Current loading relative to the rated current; absent for
    /// transformers and unrated segments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_pct: Option<f64>,
}

/// Power-flow solution with the ordered iteration trace.
#[derive(Debug, Clone, Serialize)]
pub struct PowerFlowSolution {
    pub converged: bool,
    pub iterations: usize,
    pub max_mismatch_pu: f64,
    pub bus_results: Vec<BusResult>,
    pub branch_results: Vec<BranchFlow>,
    pub slack_p_mw: f64,
    pub slack_q_mvar: f64,
    pub total_losses_p_mw: f64,
    pub total_losses_q_mvar: f64,
    pub trace: Vec<IterationTrace>,
}

/// Newton–Raphson power-flow solver.
#[derive(Debug, Clone)]
pub struct PowerFlowSolver {
    trace_level: TraceLevel,
    flat_start: bool,
}

impl Default for PowerFlowSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerFlowSolver {
    pub fn new() -> Self {
        Self {
            trace_level: TraceLevel::Summary,
            flat_start: true,
        }
    }

    /// Select how much iteration detail the trace carries.
    pub fn with_trace_level(mut self, level: TraceLevel) -> Self {
        self.trace_level = level;
        self
    }

    /// Start from the payload's voltage guesses instead of a flat start.
    pub fn with_payload_init(mut self) -> Self {
        self.flat_start = false;
        self
    }

    /// Solve the nodal equations for a frozen load-flow payload.
    pub fn solve(&self, payload: &LoadFlowPayload) -> SolverResult<PowerFlowSolution> {
        let ybus = build_y_bus(
            &payload.buses,
            &payload.branches,
            &payload.transformers,
            &payload.switches,
            payload.base_mva,
            SequenceKind::Positive,
        )?;
        let n = ybus.size();

        // Classify merged buses and accumulate scheduled injections.
        // Load convention: payload P/Q are consumption, injections are
        // their negation.
        let mut kinds = vec![BusKind::Pq; n];
        let mut p_spec = vec![0.0; n];
        let mut q_spec = vec![0.0; n];
        let mut v_sched = vec![1.0; n];
        let mut theta_sched = vec![0.0; n];
        for bus in &payload.buses {
            if !bus.in_service {
                continue;
            }
            let idx = ybus.index_of(&bus.ref_id)?;
            match bus.node_type.as_str() {
                "SLACK" => {
                    kinds[idx] = BusKind::Slack;
                    v_sched[idx] = bus.voltage_magnitude_pu;
                    theta_sched[idx] = bus.voltage_angle_rad;
                }
                "PV" => {
                    if kinds[idx] != BusKind::Slack {
                        kinds[idx] = BusKind::Pv;
                    }
                    v_sched[idx] = bus.voltage_magnitude_pu;
                }
                _ => {}
            }
            p_spec[idx] -= bus.active_power_mw / payload.base_mva;
            q_spec[idx] -= bus.reactive_power_mvar / payload.base_mva;
        }

        if !kinds.contains(&BusKind::Slack) {
            return Err(SolverError::EligibilityBlocker("ELIG_NO_SLACK".to_string()));
        }

        let mut v_mag = vec![1.0; n];
        let mut v_ang = vec![0.0; n];
        for i in 0..n {
            match kinds[i] {
                BusKind::Slack => {
                    v_mag[i] = v_sched[i];
                    v_ang[i] = theta_sched[i];
                }
                BusKind::Pv => v_mag[i] = v_sched[i],
                BusKind::Pq => {
                    if !self.flat_start {
                        v_mag[i] = v_sched[i];
                    }
                }
            }
        }

        let p_buses: Vec<usize> = (0..n).filter(|&i| kinds[i] != BusKind::Slack).collect();
        let q_buses: Vec<usize> = (0..n).filter(|&i| kinds[i] == BusKind::Pq).collect();
        let n_p = p_buses.len();
        let n_q = q_buses.len();
        let n_vars = n_p + n_q;

        let mut trace: Vec<IterationTrace> = Vec::new();
        let mut converged = false;
        let mut iterations = 0usize;
        let mut max_mismatch = f64::INFINITY;

        if n_vars == 0 {
            converged = true;
            max_mismatch = 0.0;
        }

        for iter in 0..payload.max_iterations {
            if converged {
                break;
            }

            let (p_calc, q_calc) = compute_power(&ybus.matrix, &v_mag, &v_ang);

            let mut mismatch = vec![0.0; n_vars];
            let mut norm_sq = 0.0;
            max_mismatch = 0.0;
            for (k, &i) in p_buses.iter().enumerate() {
                mismatch[k] = p_spec[i] - p_calc[i];
                max_mismatch = max_mismatch.max(mismatch[k].abs());
                norm_sq += mismatch[k] * mismatch[k];
            }
            for (k, &i) in q_buses.iter().enumerate() {
                mismatch[n_p + k] = q_spec[i] - q_calc[i];
                max_mismatch = max_mismatch.max(mismatch[n_p + k].abs());
                norm_sq += mismatch[n_p + k] * mismatch[n_p + k];
            }

            if self.trace_level == TraceLevel::Full {
                trace.push(IterationTrace {
                    iteration: iter,
                    norm_mismatch: norm_sq.sqrt(),
                    max_mismatch_pu: max_mismatch,
                    cause_if_failed: None,
                });
            }

            if max_mismatch < payload.tolerance {
                converged = true;
                iterations = iter;
                break;
            }

            let jacobian = build_jacobian(&ybus.matrix, &v_mag, &v_ang, &p_buses, &q_buses);
            let delta = solve_linear_system(&jacobian, &mismatch)?;

            // Clip oversized steps; keeps early iterations from leaving
            // the attraction basin.
            let worst = delta.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
            let scale = if worst > MAX_STEP { MAX_STEP / worst } else { 1.0 };

            for (k, &i) in p_buses.iter().enumerate() {
                v_ang[i] += scale * delta[k];
            }
            for (k, &i) in q_buses.iter().enumerate() {
                v_mag[i] += scale * delta[n_p + k];
            }
            iterations = iter + 1;
        }

        if !converged {
            if let Some(last) = trace.last_mut() {
                last.cause_if_failed = Some("max_iterations_exceeded".to_string());
            }
            return Err(SolverError::ConvergenceFailure {
                iterations,
                last_mismatch: max_mismatch,
            });
        }

        Ok(self.postprocess(
            payload,
            &ybus,
            &kinds,
            &v_mag,
            &v_ang,
            converged,
            iterations,
            max_mismatch,
            trace,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn postprocess(
        &self,
        payload: &LoadFlowPayload,
        ybus: &YBus,
        kinds: &[BusKind],
        v_mag: &[f64],
        v_ang: &[f64],
        converged: bool,
        iterations: usize,
        max_mismatch: f64,
        trace: Vec<IterationTrace>,
    ) -> PowerFlowSolution {
        let base = payload.base_mva;
        let (p_calc, q_calc) = compute_power(&ybus.matrix, v_mag, v_ang);

        let voltage_at = |bus_ref: &str| -> (usize, Complex64) {
            let idx = ybus.node_index[bus_ref];
            (idx, Complex64::from_polar(v_mag[idx], v_ang[idx]))
        };

        let mut bus_results = Vec::new();
        for bus in &payload.buses {
            let idx = ybus.node_index[&bus.ref_id];
            bus_results.push(BusResult {
                bus_id: bus.ref_id.clone(),
                v_pu: v_mag[idx],
                u_kv: v_mag[idx] * bus.voltage_level_kv,
                angle_deg: v_ang[idx].to_degrees(),
                p_injected_mw: p_calc[idx] * base,
                q_injected_mvar: q_calc[idx] * base,
            });
        }

        let mut branch_results = Vec::new();
        let mut losses_p = 0.0;
        let mut losses_q = 0.0;

        for branch in payload.branches.iter().filter(|b| b.in_service) {
            let (i, v_i) = voltage_at(&branch.from_bus_ref);
            let (j, v_j) = voltage_at(&branch.to_bus_ref);
            if i == j {
                continue;
            }
            let z_base = ybus.z_base_ohm(i);
            let z_ohm = Complex64::new(branch.r_ohm_per_km, branch.x_ohm_per_km) * branch.length_km;
            let y_series = z_base / z_ohm;
            let b_half = Complex64::new(
                0.0,
                branch.b_us_per_km * 1e-6 * branch.length_km * z_base / 2.0,
            );

            let i_from = (v_i - v_j) * y_series + v_i * b_half;
            let i_to = (v_j - v_i) * y_series + v_j * b_half;
            let s_from = v_i * i_from.conj() * base;
            let s_to = v_j * i_to.conj() * base;
            let loss = s_from + s_to;
            losses_p += loss.re;
            losses_q += loss.im;

            let kv = ybus.voltage_base_kv[i];
            let i_base_a = base * 1e3 / (3f64.sqrt() * kv);
            let i_from_a = i_from.norm() * i_base_a;
            let loading_pct = (branch.rated_current_a > 0.0)
                .then(|| i_from_a / branch.rated_current_a * 100.0);

            branch_results.push(BranchFlow {
                branch_id: branch.ref_id.clone(),
                p_from_mw: s_from.re,
                q_from_mvar: s_from.im,
                p_to_mw: s_to.re,
                q_to_mvar: s_to.im,
                losses_p_mw: loss.re,
                losses_q_mvar: loss.im,
                i_from_a,
                loading_pct,
            });
        }

        for trafo in payload.transformers.iter().filter(|t| t.in_service) {
            let (i, v_i) = voltage_at(&trafo.from_bus_ref);
            let (j, v_j) = voltage_at(&trafo.to_bus_ref);
            if i == j {
                continue;
            }
            let scale = payload.base_mva / trafo.rated_power_mva.max(1e-9);
            let z_pu = trafo.uk_percent / 100.0 * scale;
            let r_pu = trafo.pk_kw / 1000.0 / trafo.rated_power_mva.max(1e-9) * scale;
            let x_pu = (z_pu * z_pu - r_pu * r_pu).max(0.0).sqrt();
            let y = Complex64::new(r_pu, x_pu).inv();
            let tap = 1.0 + f64::from(trafo.tap_position) * trafo.tap_step_percent / 100.0;

            let i_from = v_i * (y / (tap * tap)) - v_j * (y / tap);
            let i_to = v_j * y - v_i * (y / tap);
            let s_from = v_i * i_from.conj() * base;
            let s_to = v_j * i_to.conj() * base;
            let loss = s_from + s_to;
            losses_p += loss.re;
            losses_q += loss.im;

            let kv = ybus.voltage_base_kv[i];
            let i_base_a = base * 1e3 / (3f64.sqrt() * kv);

            branch_results.push(BranchFlow {
                branch_id: trafo.ref_id.clone(),
                p_from_mw: s_from.re,
                q_from_mvar: s_from.im,
                p_to_mw: s_to.re,
                q_to_mvar: s_to.im,
                losses_p_mw: loss.re,
                losses_q_mvar: loss.im,
                i_from_a: i_from.norm() * i_base_a,
                loading_pct: None,
            });
        }

        // Slack injection: the calculated power at slack indices.
        let mut slack_p = 0.0;
        let mut slack_q = 0.0;
        for (idx, kind) in kinds.iter().enumerate() {
            if *kind == BusKind::Slack {
                slack_p += p_calc[idx] * base;
                slack_q += q_calc[idx] * base;
            }
        }

        PowerFlowSolution {
            converged,
            iterations,
            max_mismatch_pu: max_mismatch,
            bus_results,
            branch_results,
            slack_p_mw: slack_p,
            slack_q_mvar: slack_q,
            total_losses_p_mw: losses_p,
            total_losses_q_mvar: losses_q,
            trace,
        }
    }
}

/// P and Q injections from the current voltage state.
///
/// `P_i = Σ V_i·V_j·(G_ij·cos θ_ij + B_ij·sin θ_ij)`,
/// `Q_i = Σ V_i·V_j·(G_ij·sin θ_ij − B_ij·cos θ_ij)`.
fn compute_power(y_bus: &[Vec<Complex64>], v_mag: &[f64], v_ang: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = v_mag.len();
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            let y = y_bus[i][j];
            let theta = v_ang[i] - v_ang[j];
            let (sin_t, cos_t) = theta.sin_cos();
            p[i] += v_mag[i] * v_mag[j] * (y.re * cos_t + y.im * sin_t);
            q[i] += v_mag[i] * v_mag[j] * (y.re * sin_t - y.im * cos_t);
        }
    }
    (p, q)
}

/// Analytic Jacobian, dense, blocks [H N; J L] over (θ, |V|) variables.
fn build_jacobian(
    y_bus: &[Vec<Complex64>],
    v_mag: &[f64],
    v_ang: &[f64],
    p_buses: &[usize],
    q_buses: &[usize],
) -> Vec<Vec<f64>> {
    let n_p = p_buses.len();
    let n_q = q_buses.len();
    let n_vars = n_p + n_q;
    let (p_calc, q_calc) = compute_power(y_bus, v_mag, v_ang);
    let mut jac = vec![vec![0.0; n_vars]; n_vars];

    let entry = |i: usize, j: usize| y_bus[i][j];

    // H: ∂P/∂θ
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            let y = entry(i, j);
            jac[row][col] = if i == j {
                -q_calc[i] - y.im * v_mag[i] * v_mag[i]
            } else {
                let theta = v_ang[i] - v_ang[j];
                v_mag[i] * v_mag[j] * (y.re * theta.sin() - y.im * theta.cos())
            };
        }
    }

    // N: ∂P/∂V
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            let y = entry(i, j);
            jac[row][n_p + col] = if i == j {
                p_calc[i] / v_mag[i] + y.re * v_mag[i]
            } else {
                let theta = v_ang[i] - v_ang[j];
                v_mag[i] * (y.re * theta.cos() + y.im * theta.sin())
            };
        }
    }

    // J: ∂Q/∂θ
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            let y = entry(i, j);
            jac[n_p + row][col] = if i == j {
                p_calc[i] - y.re * v_mag[i] * v_mag[i]
            } else {
                let theta = v_ang[i] - v_ang[j];
                -v_mag[i] * v_mag[j] * (y.re * theta.cos() + y.im * theta.sin())
            };
        }
    }

    // L: ∂Q/∂V
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            let y = entry(i, j);
            jac[n_p + row][n_p + col] = if i == j {
                q_calc[i] / v_mag[i] - y.im * v_mag[i]
            } else {
                let theta = v_ang[i] - v_ang[j];
                v_mag[i] * (y.re * theta.sin() - y.im * theta.cos())
            };
        }
    }

    jac
}

/// Solve `J·Δx = Δf` by LU factorization with partial pivoting.
fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> SolverResult<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Ok(vec![]);
    }

    let mut mat = Mat::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            mat.write(i, j, a[i][j]);
        }
    }
    let mut rhs = Mat::zeros(n, 1);
    for i in 0..n {
        rhs.write(i, 0, b[i]);
    }

    let lu = mat.partial_piv_lu();
    let solution = lu.solve(&rhs);
    let x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();

    if x.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NumericalFailure(
            "singular Jacobian matrix".to_string(),
        ));
    }
    Ok(x)
}
