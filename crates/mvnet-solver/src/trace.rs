//! White-box calculation traces.
//!
//! Every solver emits an ordered trace an auditor can follow without
//! re-running the solver: power flow records one row per Newton iteration,
//! short-circuit records one step per formula with its symbols, the
//! numeric substitution, and the result.

use serde::Serialize;
use std::collections::BTreeMap;

/// How much detail a solver trace carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    /// Only final counts and the terminal mismatch.
    Summary,
    /// One row per iteration, in iteration order.
    Full,
}

/// One Newton–Raphson iteration record.
#[derive(Debug, Clone, Serialize)]
pub struct IterationTrace {
    pub iteration: usize,
    /// Euclidean norm of the mismatch vector.
    pub norm_mismatch: f64,
    /// Largest single mismatch in per-unit.
    pub max_mismatch_pu: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause_if_failed: Option<String>,
}

/// A value with its unit, as shown in a calculation step.
#[derive(Debug, Clone, Serialize)]
pub struct TraceValue {
    pub value: f64,
    pub unit: String,
}

impl TraceValue {
    pub fn new(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }
}

/// One formula step of a short-circuit calculation.
///
/// `inputs` maps symbol → value+unit; `substitution` is the rendered
/// numeric form of the formula with those inputs.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub key: String,
    pub title_pl: String,
    pub formula_latex: String,
    pub inputs: BTreeMap<String, TraceValue>,
    pub substitution: String,
    pub result: TraceValue,
}

impl TraceStep {
    pub fn new(key: &str, title_pl: &str, formula_latex: &str) -> Self {
        Self {
            key: key.to_string(),
            title_pl: title_pl.to_string(),
            formula_latex: formula_latex.to_string(),
            inputs: BTreeMap::new(),
            substitution: String::new(),
            result: TraceValue::new(0.0, ""),
        }
    }

    pub fn input(mut self, symbol: &str, value: f64, unit: &str) -> Self {
        self.inputs
            .insert(symbol.to_string(), TraceValue::new(value, unit));
        self
    }

    pub fn substitution(mut self, rendered: String) -> Self {
        self.substitution = rendered;
        self
    }

    pub fn result(mut self, value: f64, unit: &str) -> Self {
        self.result = TraceValue::new(value, unit);
        self
    }
}
