//! Contract checks every `BaselineStore` backend must pass.
//!
//! Checks are grouped by [`CheckGroup`]. The `regeneration` group replays the
//! delete-and-recreate cycle a baseline regeneration performs while budget
//! lines, resource details and execution facts still point at the elements
//! being replaced.
//!
//! ```ignore
//! use keystone_storage::conformance::run_conformance_suite;
//!
//! #[test]
//! fn on_disk_store_honours_contract() {
//!     let report = run_conformance_suite(open_scratch_store);
//!     assert!(report.is_conformant(), "{report}");
//! }
//! ```

mod baseline;
mod concurrent;
mod error;
mod facts;
mod regeneration;
mod snapshot;

use std::fmt;

use time::macros::{date, datetime};

use crate::record::{
    NewActualCost, NewBreakdownElement, NewEstimateLine, NewProgressUpdate, NewProject,
    ElementStatus, ProjectId, ProjectStatus,
};
use crate::BaselineStore;

/// Area of the store contract a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckGroup {
    Snapshot,
    Baseline,
    Facts,
    Errors,
    Regeneration,
    Concurrency,
}

impl CheckGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckGroup::Snapshot => "snapshot",
            CheckGroup::Baseline => "baseline",
            CheckGroup::Facts => "facts",
            CheckGroup::Errors => "errors",
            CheckGroup::Regeneration => "regeneration",
            CheckGroup::Concurrency => "concurrency",
        }
    }
}

impl fmt::Display for CheckGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one contract check. `failure` is `None` when it held.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub group: CheckGroup,
    pub name: &'static str,
    pub failure: Option<String>,
}

impl CheckOutcome {
    fn record(group: CheckGroup, name: &'static str, result: Result<(), String>) -> Self {
        Self {
            group,
            name,
            failure: result.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Every check from one suite run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl ConformanceReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    /// True when every check held and at least one ran.
    pub fn is_conformant(&self) -> bool {
        self.total() > 0 && self.failed() == 0
    }

    /// Number of checks run in `group`.
    pub fn count_in(&self, group: CheckGroup) -> usize {
        self.outcomes.iter().filter(|o| o.group == group).count()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failed();
        writeln!(
            f,
            "store contract: {} of {} checks held",
            self.total() - failed,
            self.total()
        )?;
        for outcome in self.failures() {
            let reason = outcome.failure.as_deref().unwrap_or_default();
            writeln!(f, "  {}::{} broke: {reason}", outcome.group, outcome.name)?;
        }
        Ok(())
    }
}

/// Run every contract check against a storage backend.
///
/// `factory` is called once per check and must return an empty store.
pub fn run_conformance_suite<S, F>(factory: F) -> ConformanceReport
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut outcomes = Vec::new();
    outcomes.extend(snapshot::run_snapshot_tests(&factory));
    outcomes.extend(baseline::run_baseline_tests(&factory));
    outcomes.extend(facts::run_fact_tests(&factory));
    outcomes.extend(error::run_error_tests(&factory));
    outcomes.extend(regeneration::run_regeneration_tests(&factory));
    outcomes.extend(concurrent::run_concurrent_tests(&factory));
    ConformanceReport { outcomes }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        start_date: Some(date!(2025 - 01 - 06)),
        end_date: Some(date!(2025 - 06 - 30)),
        duration_days: Some(175),
        status: ProjectStatus::Planning,
    }
}

fn make_estimate_line(project_id: Option<ProjectId>, code: &str, total: f64) -> NewEstimateLine {
    NewEstimateLine {
        project_id,
        cost_code: code.to_string(),
        description: format!("work for {code}"),
        quantity: 1.0,
        unit: "EA".to_string(),
        unit_cost: total,
        total_cost: total,
        phase: Some("construction".to_string()),
    }
}

fn make_element(project_id: ProjectId, code: &str, cost: f64) -> NewBreakdownElement {
    NewBreakdownElement {
        id: None,
        project_id,
        code: code.to_string(),
        description: format!("element {code}"),
        estimated_cost: cost,
        status: ElementStatus::Planned,
        start_date: None,
        end_date: None,
        estimate_line_id: None,
    }
}

fn make_actual_cost(project_id: ProjectId, element_id: Option<i64>, amount: f64) -> NewActualCost {
    NewActualCost {
        project_id,
        element_id,
        category: "materials".to_string(),
        description: "invoice".to_string(),
        amount,
        transaction_date: date!(2025 - 02 - 14),
        recorded_at: datetime!(2025-02-14 09:30:00 UTC),
    }
}

fn make_progress(project_id: ProjectId, element_id: i64, percent: f64) -> NewProgressUpdate {
    NewProgressUpdate {
        project_id,
        element_id,
        percent_complete: percent,
        update_date: date!(2025 - 03 - 01),
        notes: None,
    }
}

/// Commit a single project and return its identifier.
fn seed_project<S: BaselineStore>(s: &S, name: &str) -> Result<ProjectId, String> {
    let mut snap = s.begin_snapshot().map_err(|e| format!("begin: {e}"))?;
    let id = s
        .insert_project(&mut snap, make_project(name))
        .map_err(|e| format!("insert_project: {e}"))?;
    s.commit_snapshot(snap).map_err(|e| format!("commit: {e}"))?;
    Ok(id)
}

fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}
