//! IEC 60909 heat-effect factors (m, n) for the thermal-equivalent
//! short-circuit current `I_th = I_k'' · √(m + n)`.
//!
//! `m` covers the DC-component heat, tabulated over fault duration `t_k`
//! and peak factor κ at 50 Hz; lookups interpolate bilinearly inside the
//! bounding table. `n` covers AC decay and equals 1.0 for far-from-
//! generator faults (Ik''/Ik = 1), the standing assumption in MV
//! distribution.

/// Fault durations (s) of the table rows.
pub const TK_AXIS: [f64; 9] = [0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 3.0];

/// Peak factor κ values of the table columns.
pub const KAPPA_AXIS: [f64; 11] = [1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.7, 1.8, 1.9, 2.0];

/// m(t_k, κ) at 50 Hz, rows follow [`TK_AXIS`], columns [`KAPPA_AXIS`].
pub const M_TABLE: [[f64; 11]; 9] = [
    [0.0, 0.4300, 0.5965, 0.7558, 0.9167, 1.0820, 1.2529, 1.4299, 1.6133, 1.8033, 2.0],
    [0.0, 0.2171, 0.3102, 0.4119, 0.5317, 0.6763, 0.8520, 1.0653, 1.3229, 1.6320, 2.0],
    [0.0, 0.0869, 0.1243, 0.1661, 0.2182, 0.2883, 0.3892, 0.5449, 0.8000, 1.2364, 2.0],
    [0.0, 0.0434, 0.0621, 0.0831, 0.1091, 0.1443, 0.1958, 0.2801, 0.4430, 0.8337, 2.0],
    [0.0, 0.0217, 0.0311, 0.0415, 0.0546, 0.0721, 0.0979, 0.1402, 0.2240, 0.4675, 2.0],
    [0.0, 0.0087, 0.0124, 0.0166, 0.0218, 0.0289, 0.0392, 0.0561, 0.0896, 0.1898, 2.0],
    [0.0, 0.0043, 0.0062, 0.0083, 0.0109, 0.0144, 0.0196, 0.0280, 0.0448, 0.0949, 2.0],
    [0.0, 0.0022, 0.0031, 0.0042, 0.0055, 0.0072, 0.0098, 0.0140, 0.0224, 0.0475, 2.0],
    [0.0, 0.0014, 0.0021, 0.0028, 0.0036, 0.0048, 0.0065, 0.0093, 0.0149, 0.0316, 2.0],
];

/// AC heat factor for far-from-generator faults.
pub const N_FAR_FROM_GENERATOR: f64 = 1.0;

/// Bracketing indices and the interpolation weight of `value` on `axis`.
fn bracket(axis: &[f64], value: f64) -> Option<(usize, usize, f64)> {
    if value < axis[0] || value > axis[axis.len() - 1] {
        return None;
    }
    let upper = axis.iter().position(|&a| a >= value)?;
    if upper == 0 {
        return Some((0, 0, 0.0));
    }
    let lower = upper - 1;
    let span = axis[upper] - axis[lower];
    let t = if span > 0.0 { (value - axis[lower]) / span } else { 0.0 };
    Some((lower, upper, t))
}

/// Bilinear m(t_k, κ) lookup. `None` when `t_k` lies outside the table -
/// callers then fall back to the analytic κ expression and attach a
/// warning.
pub fn m_factor(t_k_seconds: f64, kappa: f64) -> Option<f64> {
    let kappa = kappa.clamp(KAPPA_AXIS[0], KAPPA_AXIS[KAPPA_AXIS.len() - 1]);
    let (t0, t1, wt) = bracket(&TK_AXIS, t_k_seconds)?;
    let (k0, k1, wk) = bracket(&KAPPA_AXIS, kappa)?;

    let low = M_TABLE[t0][k0] + (M_TABLE[t0][k1] - M_TABLE[t0][k0]) * wk;
    let high = M_TABLE[t1][k0] + (M_TABLE[t1][k1] - M_TABLE[t1][k0]) * wk;
    Some(low + (high - low) * wt)
}

/// Analytic fallback for `m` outside the table, from the defining
/// expression at 50 Hz.
pub fn m_factor_analytic(t_k_seconds: f64, kappa: f64) -> f64 {
    const F: f64 = 50.0;
    let kappa = kappa.clamp(1.0, 2.0);
    if kappa <= 1.001 || t_k_seconds <= 0.0 {
        return 0.0;
    }
    let ln = (kappa - 1.0).ln();
    if ln.abs() < 1e-12 {
        // κ → 2 limit of the expression.
        return 2.0;
    }
    let exponent = 4.0 * F * t_k_seconds * ln;
    ((exponent.exp() - 1.0) / (2.0 * F * t_k_seconds * ln)).clamp(0.0, 2.0)
}
