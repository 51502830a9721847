//! Bus-admittance matrix assembly in per-unit.
//!
//! MV feeders are small (tens of buses), so the matrix is dense complex.
//! Assembly order:
//!
//! 1. Closed in-service switches merge their endpoints (union–find), open
//!    switches are omitted - a switch is never an impedance.
//! 2. Merged representatives get indices in ascending id order.
//! 3. Lines/cables stamp series admittance (Ω → pu on the node voltage
//!    base) plus half line-charging at each end.
//! 4. Transformers stamp the uk/Pk short-circuit impedance on the system
//!    MVA base, with the tap ratio on the HV side, plus the magnetizing
//!    branch from i0/P0 on the LV side.
//!
//! The same skeleton assembles the zero-sequence network from `r0`/`x0`
//! conductor data; transformer vector groups decide where a zero-sequence
//! path exists.

use crate::{SolverError, SolverResult};
use mvnet_input::contracts::{BranchPayload, BusPayload, SwitchPayload, TransformerPayload};
use num_complex::Complex64;
use std::collections::BTreeMap;

/// Which sequence network is being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Positive,
    Zero,
}

/// Dense complex Y-bus with the id → index map of merged buses.
#[derive(Debug, Clone)]
pub struct YBus {
    /// Dense admittance matrix, per-unit on `base_mva`.
    pub matrix: Vec<Vec<Complex64>>,
    /// Every payload bus id → matrix index of its merged representative.
    pub node_index: BTreeMap<String, usize>,
    /// Nominal voltage (kV) per matrix index.
    pub voltage_base_kv: Vec<f64>,
    /// System MVA base the matrix is normalized on.
    pub base_mva: f64,
}

impl YBus {
    pub fn size(&self) -> usize {
        self.matrix.len()
    }

    /// Matrix index of a bus id.
    pub fn index_of(&self, bus_id: &str) -> SolverResult<usize> {
        self.node_index
            .get(bus_id)
            .copied()
            .ok_or_else(|| SolverError::NumericalFailure(format!("unknown bus id: {bus_id}")))
    }

    /// Impedance base (Ω) at a matrix index.
    pub fn z_base_ohm(&self, index: usize) -> f64 {
        let kv = self.voltage_base_kv[index];
        kv * kv / self.base_mva
    }
}

/// Union–find over bus slots; closed switches unify endpoints.
struct NodeMerge {
    parent: Vec<usize>,
}

impl NodeMerge {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller root wins, keeping representative choice id-ordered.
            let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[drop] = keep;
        }
    }
}

/// Assemble the bus-admittance matrix of the requested sequence.
pub fn build_y_bus(
    buses: &[BusPayload],
    branches: &[BranchPayload],
    transformers: &[TransformerPayload],
    switches: &[SwitchPayload],
    base_mva: f64,
    sequence: SequenceKind,
) -> SolverResult<YBus> {
    if buses.is_empty() {
        return Err(SolverError::NumericalFailure(
            "network has no buses".to_string(),
        ));
    }
    if base_mva <= 0.0 {
        return Err(SolverError::ParameterInconsistent(format!(
            "base_mva must be positive, got {base_mva}"
        )));
    }

    // Slot per payload bus, ascending ref_id order (payloads are sorted).
    let slot_of: BTreeMap<&str, usize> = buses
        .iter()
        .enumerate()
        .map(|(i, b)| (b.ref_id.as_str(), i))
        .collect();

    let mut merge = NodeMerge::new(buses.len());
    for switch in switches {
        if switch.in_service && switch.state == "CLOSED" {
            if let (Some(&a), Some(&b)) = (
                slot_of.get(switch.from_bus_ref.as_str()),
                slot_of.get(switch.to_bus_ref.as_str()),
            ) {
                merge.union(a, b);
            }
        }
    }

    // Representatives → compact matrix indices, in ascending slot order so
    // indices follow ascending bus id.
    let mut index_of_root: BTreeMap<usize, usize> = BTreeMap::new();
    for slot in 0..buses.len() {
        let root = merge.find(slot);
        let next = index_of_root.len();
        index_of_root.entry(root).or_insert(next);
    }
    let n = index_of_root.len();

    let mut node_index: BTreeMap<String, usize> = BTreeMap::new();
    let mut voltage_base_kv = vec![0.0; n];
    for (slot, bus) in buses.iter().enumerate() {
        let idx = index_of_root[&merge.find(slot)];
        node_index.insert(bus.ref_id.clone(), idx);
        if voltage_base_kv[idx] <= 0.0 {
            voltage_base_kv[idx] = bus.voltage_level_kv;
        }
    }

    let mut matrix = vec![vec![Complex64::new(0.0, 0.0); n]; n];

    for branch in branches {
        if !branch.in_service {
            continue;
        }
        let (Some(&from_slot), Some(&to_slot)) = (
            slot_of.get(branch.from_bus_ref.as_str()),
            slot_of.get(branch.to_bus_ref.as_str()),
        ) else {
            return Err(SolverError::NumericalFailure(format!(
                "branch {} references unknown bus",
                branch.ref_id
            )));
        };
        let i = index_of_root[&merge.find(from_slot)];
        let j = index_of_root[&merge.find(to_slot)];
        if i == j {
            // Both ends merged onto one bus; the segment is bypassed.
            continue;
        }

        let (r_per_km, x_per_km) = match sequence {
            SequenceKind::Positive => (branch.r_ohm_per_km, branch.x_ohm_per_km),
            SequenceKind::Zero => match (branch.r0_ohm_per_km, branch.x0_ohm_per_km) {
                (Some(r0), Some(x0)) => (r0, x0),
                _ => {
                    return Err(SolverError::EligibilityBlocker(
                        "ELIG_SC1F_NO_Z0".to_string(),
                    ))
                }
            },
        };

        let z_ohm = Complex64::new(r_per_km, x_per_km) * branch.length_km;
        if z_ohm.norm() < 1e-12 {
            return Err(SolverError::ParameterInconsistent(format!(
                "branch {} has zero impedance",
                branch.ref_id
            )));
        }
        let z_base = {
            let kv = voltage_base_kv[i];
            kv * kv / base_mva
        };
        let y_series = z_base / z_ohm;

        // Line charging, half at each end; none in the zero-sequence net.
        let y_shunt_half = match sequence {
            SequenceKind::Positive => {
                let b_siemens = branch.b_us_per_km * 1e-6 * branch.length_km;
                Complex64::new(0.0, b_siemens * z_base / 2.0)
            }
            SequenceKind::Zero => Complex64::new(0.0, 0.0),
        };

        matrix[i][j] -= y_series;
        matrix[j][i] -= y_series;
        matrix[i][i] += y_series + y_shunt_half;
        matrix[j][j] += y_series + y_shunt_half;
    }

    for trafo in transformers {
        if !trafo.in_service {
            continue;
        }
        let (Some(&from_slot), Some(&to_slot)) = (
            slot_of.get(trafo.from_bus_ref.as_str()),
            slot_of.get(trafo.to_bus_ref.as_str()),
        ) else {
            return Err(SolverError::NumericalFailure(format!(
                "transformer {} references unknown bus",
                trafo.ref_id
            )));
        };
        let i = index_of_root[&merge.find(from_slot)];
        let j = index_of_root[&merge.find(to_slot)];
        if i == j {
            continue;
        }

        let y_series = transformer_series_admittance(trafo, base_mva)?;

        match sequence {
            SequenceKind::Positive => {
                let tap = 1.0 + f64::from(trafo.tap_position) * trafo.tap_step_percent / 100.0;
                if tap <= 0.0 {
                    return Err(SolverError::ParameterInconsistent(format!(
                        "transformer {} has non-positive tap ratio {tap}",
                        trafo.ref_id
                    )));
                }
                matrix[i][i] += y_series / (tap * tap);
                matrix[j][j] += y_series;
                matrix[i][j] -= y_series / tap;
                matrix[j][i] -= y_series / tap;

                if let Some(y_mag) = magnetizing_admittance(trafo, base_mva) {
                    matrix[j][j] += y_mag;
                }
            }
            SequenceKind::Zero => {
                // The winding connection decides where zero-sequence
                // current can flow: Dyn grounds the LV side, YNd the HV
                // side; other groups leave the path open.
                let group = trafo.vector_group.to_lowercase();
                if group.starts_with('d') && group.contains("yn") {
                    matrix[j][j] += y_series;
                } else if group.starts_with("yn") && group.contains('d') {
                    matrix[i][i] += y_series;
                }
            }
        }
    }

    Ok(YBus {
        matrix,
        node_index,
        voltage_base_kv,
        base_mva,
    })
}

/// Series admittance of a transformer in per-unit on the system base.
///
/// `z_pu = (uk/100)·base/rated`, `r_pu = (Pk/1000)/rated · base/rated`,
/// `x_pu = √(z² − r²)`; `r > z` is rejected as inconsistent nameplate data.
fn transformer_series_admittance(
    trafo: &TransformerPayload,
    base_mva: f64,
) -> SolverResult<Complex64> {
    if trafo.rated_power_mva <= 0.0 {
        return Err(SolverError::ParameterInconsistent(format!(
            "transformer {} has non-positive rated power",
            trafo.ref_id
        )));
    }
    let scale = base_mva / trafo.rated_power_mva;
    let z_pu = trafo.uk_percent / 100.0 * scale;
    let r_pu = trafo.pk_kw / 1000.0 / trafo.rated_power_mva * scale;
    if r_pu > z_pu {
        return Err(SolverError::ParameterInconsistent(format!(
            "transformer {}: resistance from Pk exceeds impedance from uk (r_pu={r_pu:.6} > z_pu={z_pu:.6})",
            trafo.ref_id
        )));
    }
    let x_pu = (z_pu * z_pu - r_pu * r_pu).sqrt();
    let z = Complex64::new(r_pu, x_pu);
    if z.norm() < 1e-12 {
        return Err(SolverError::ParameterInconsistent(format!(
            "transformer {} has zero short-circuit impedance",
            trafo.ref_id
        )));
    }
    Ok(z.inv())
}

/// Magnetizing branch from i0/P0, per-unit on the system base. `None`
/// when the nameplate carries no magnetizing data.
fn magnetizing_admittance(trafo: &TransformerPayload, base_mva: f64) -> Option<Complex64> {
    if trafo.i0_percent <= 0.0 {
        return None;
    }
    let y_abs = trafo.i0_percent / 100.0 * trafo.rated_power_mva / base_mva;
    let g = trafo.p0_kw / 1000.0 / base_mva;
    let b = if y_abs > g {
        -(y_abs * y_abs - g * g).sqrt()
    } else {
        0.0
    };
    Some(Complex64::new(g.min(y_abs), b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(id: &str, kv: f64) -> BusPayload {
        BusPayload {
            ref_id: id.to_string(),
            name: id.to_string(),
            node_type: "PQ".to_string(),
            voltage_level_kv: kv,
            voltage_magnitude_pu: 1.0,
            voltage_angle_rad: 0.0,
            active_power_mw: 0.0,
            reactive_power_mvar: 0.0,
            sk3_mva: None,
            in_service: true,
        }
    }

    fn line(id: &str, from: &str, to: &str, r: f64, x: f64, length: f64) -> BranchPayload {
        BranchPayload {
            ref_id: id.to_string(),
            name: id.to_string(),
            branch_type: "CABLE".to_string(),
            from_bus_ref: from.to_string(),
            to_bus_ref: to.to_string(),
            r_ohm_per_km: r,
            x_ohm_per_km: x,
            b_us_per_km: 0.0,
            length_km: length,
            rated_current_a: 300.0,
            r0_ohm_per_km: None,
            x0_ohm_per_km: None,
            in_service: true,
            catalog_ref: None,
        }
    }

    fn trafo(id: &str, from: &str, to: &str) -> TransformerPayload {
        TransformerPayload {
            ref_id: id.to_string(),
            name: id.to_string(),
            from_bus_ref: from.to_string(),
            to_bus_ref: to.to_string(),
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

    fn closed_switch(id: &str, from: &str, to: &str) -> SwitchPayload {
        SwitchPayload {
            ref_id: id.to_string(),
            name: id.to_string(),
            switch_type: "BREAKER".to_string(),
            from_bus_ref: from.to_string(),
            to_bus_ref: to.to_string(),
            state: "CLOSED".to_string(),
            in_service: true,
        }
    }

    #[test]
    fn line_stamps_symmetric_matrix() {
        let buses = vec![bus("a", 15.0), bus("b", 15.0)];
        let branches = vec![line("l1", "a", "b", 0.253, 0.073, 0.5)];
        let ybus =
            build_y_bus(&buses, &branches, &[], &[], 100.0, SequenceKind::Positive).unwrap();
        assert_eq!(ybus.size(), 2);
        let y01 = ybus.matrix[0][1];
        let y10 = ybus.matrix[1][0];
        assert!((y01 - y10).norm() < 1e-12);
        // Row sums vanish without shunts.
        let row0 = ybus.matrix[0][0] + ybus.matrix[0][1];
        assert!(row0.norm() < 1e-9);
    }

    #[test]
    fn per_unit_conversion_uses_voltage_base() {
        let buses = vec![bus("a", 15.0), bus("b", 15.0)];
        let branches = vec![line("l1", "a", "b", 0.253, 0.073, 0.5)];
        let ybus =
            build_y_bus(&buses, &branches, &[], &[], 100.0, SequenceKind::Positive).unwrap();
        let z_base = 15.0 * 15.0 / 100.0;
        let z_pu = Complex64::new(0.253, 0.073) * 0.5 / z_base;
        assert!((ybus.matrix[0][1] + z_pu.inv()).norm() < 1e-9);
    }

    #[test]
    fn closed_switch_merges_buses() {
        let buses = vec![bus("a", 15.0), bus("b", 15.0), bus("c", 15.0)];
        let branches = vec![line("l1", "a", "c", 0.2, 0.1, 1.0)];
        let switches = vec![closed_switch("sw", "a", "b")];
        let ybus = build_y_bus(
            &buses,
            &branches,
            &[],
            &switches,
            100.0,
            SequenceKind::Positive,
        )
        .unwrap();
        assert_eq!(ybus.size(), 2);
        assert_eq!(ybus.index_of("a").unwrap(), ybus.index_of("b").unwrap());
        assert_ne!(ybus.index_of("a").unwrap(), ybus.index_of("c").unwrap());
    }

    #[test]
    fn open_switch_does_not_merge() {
        let buses = vec![bus("a", 15.0), bus("b", 15.0)];
        let mut sw = closed_switch("sw", "a", "b");
        sw.state = "OPEN".to_string();
        let ybus =
            build_y_bus(&buses, &[], &[], &[sw], 100.0, SequenceKind::Positive).unwrap();
        assert_eq!(ybus.size(), 2);
    }

    #[test]
    fn transformer_impedance_matches_nameplate() {
        let buses = vec![bus("hv", 110.0), bus("lv", 20.0)];
        let transformers = vec![trafo("tr", "hv", "lv")];
        let ybus = build_y_bus(
            &buses,
            &[],
            &transformers,
            &[],
            100.0,
            SequenceKind::Positive,
        )
        .unwrap();
        // z_pu = 0.1 * 100/25 = 0.4 dominates; |y| ≈ 1/0.4
        let y = ybus.matrix[0][1].norm();
        assert!((y - 2.5).abs() < 0.05, "got |y| = {y}");
    }

    #[test]
    fn inconsistent_transformer_rejected() {
        let buses = vec![bus("hv", 110.0), bus("lv", 20.0)];
        let mut bad = trafo("tr", "hv", "lv");
        bad.uk_percent = 0.01;
        bad.pk_kw = 5000.0;
        let result = build_y_bus(
            &buses,
            &[],
            &[bad],
            &[],
            100.0,
            SequenceKind::Positive,
        );
        assert!(matches!(result, Err(SolverError::ParameterInconsistent(_))));
    }

    #[test]
    fn zero_sequence_requires_z0_data() {
        let buses = vec![bus("a", 15.0), bus("b", 15.0)];
        let branches = vec![line("l1", "a", "b", 0.253, 0.073, 0.5)];
        let result = build_y_bus(&buses, &branches, &[], &[], 100.0, SequenceKind::Zero);
        assert!(matches!(result, Err(SolverError::EligibilityBlocker(code)) if code == "ELIG_SC1F_NO_Z0"));
    }

    #[test]
    fn zero_sequence_uses_r0_x0() {
        let buses = vec![bus("a", 15.0), bus("b", 15.0)];
        let mut branch = line("l1", "a", "b", 0.253, 0.073, 0.5);
        branch.r0_ohm_per_km = Some(1.01);
        branch.x0_ohm_per_km = Some(0.29);
        let y0 = build_y_bus(&buses, &[branch], &[], &[], 100.0, SequenceKind::Zero).unwrap();
        let z_base = 15.0 * 15.0 / 100.0;
        let z0_pu = Complex64::new(1.01, 0.29) * 0.5 / z_base;
        assert!((y0.matrix[0][1] + z0_pu.inv()).norm() < 1e-9);
    }
}
