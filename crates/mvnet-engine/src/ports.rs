//! Ports to the outside world: time, identifiers, persistence.
//!
//! The engine never reads the ambient clock or a random source directly;
//! both come in through constructor-injected ports, which is what makes
//! the determinism suites able to pin timestamps and run ids.

use crate::result_set::ResultSet;
use crate::run::Run;
use serde_json::Value;
use std::collections::BTreeMap;

/// Time source.
pub trait Clock {
    /// Current instant as an ISO-8601 string.
    fn now_iso(&self) -> String;
}

/// Wall-clock time in UTC.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_iso(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

/// Pinned time for reproducible pipelines and tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn now_iso(&self) -> String {
        self.0.clone()
    }
}

/// Identifier source for new runs.
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

/// Random UUIDv4 identifiers (production default).
#[derive(Debug, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` identifiers for reproducible pipelines.
#[derive(Debug)]
pub struct SequentialIdSource {
    prefix: String,
    counter: usize,
}

impl SequentialIdSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}-{}", self.prefix, self.counter)
    }
}

/// Persistence port over runs, frozen inputs, and result sets.
///
/// The core ships an in-memory adapter; database adapters live outside
/// the core and see only opaque string ids.
pub trait RunRepository {
    fn put_run(&mut self, run: Run);
    fn get_run(&self, run_id: &str) -> Option<Run>;
    fn put_frozen_input(&mut self, run_id: &str, frozen: Value);
    fn get_frozen_input(&self, run_id: &str) -> Option<Value>;
    fn put_result_set(&mut self, run_id: &str, result_set: ResultSet);
    fn get_result_set(&self, run_id: &str) -> Option<ResultSet>;
    /// Run ids of a study case, in creation order.
    fn runs_for_case(&self, study_case_id: &str) -> Vec<Run>;
}

/// Copy-on-write in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    runs: BTreeMap<String, Run>,
    frozen_inputs: BTreeMap<String, Value>,
    result_sets: BTreeMap<String, ResultSet>,
    case_runs: BTreeMap<String, Vec<String>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunRepository for InMemoryRepository {
    fn put_run(&mut self, run: Run) {
        let case_list = self.case_runs.entry(run.study_case_id.clone()).or_default();
        if !case_list.contains(&run.id) {
            case_list.push(run.id.clone());
        }
        self.runs.insert(run.id.clone(), run);
    }

    fn get_run(&self, run_id: &str) -> Option<Run> {
        self.runs.get(run_id).cloned()
    }

    fn put_frozen_input(&mut self, run_id: &str, frozen: Value) {
        self.frozen_inputs.insert(run_id.to_string(), frozen);
    }

    fn get_frozen_input(&self, run_id: &str) -> Option<Value> {
        self.frozen_inputs.get(run_id).cloned()
    }

    fn put_result_set(&mut self, run_id: &str, result_set: ResultSet) {
        self.result_sets.insert(run_id.to_string(), result_set);
    }

    fn get_result_set(&self, run_id: &str) -> Option<ResultSet> {
        self.result_sets.get(run_id).cloned()
    }

    fn runs_for_case(&self, study_case_id: &str) -> Vec<Run> {
        self.case_runs
            .get(study_case_id)
            .map(|ids| ids.iter().filter_map(|id| self.runs.get(id).cloned()).collect())
            .unwrap_or_default()
    }
}
