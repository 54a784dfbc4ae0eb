//! Keystone baseline engine.
//!
//! Turns estimate lines into a breakdown, a budget baseline and resource
//! details, and reconciles recorded actual costs and progress against that
//! baseline. Every operation goes through a [`BaselineStore`] handle injected
//! at construction; mutating operations run in exactly one snapshot and
//! regenerations of the same project are serialized by [`ProjectLocks`].

pub mod baseline;
pub mod breakdown;
pub mod budget;
pub mod drift;
pub mod earned_value;
mod error;
pub mod estimates;
mod locks;
mod outcome;
pub mod present;
pub mod projects;
pub mod resources;
pub mod summary;
pub mod tracking;
mod unit_of_work;

use std::sync::Arc;

use keystone_storage::{BaselineStore, ProjectId, ProjectRecord};

pub use baseline::RegenerationSummary;
pub use breakdown::{aggregate_by_code, BreakdownSummary, CodeGroup};
pub use drift::{AmountMismatch, BudgetDrift, MissingBudgetLine, OrphanBudgetLine};
pub use earned_value::{
    CostVarianceReport, CostVarianceRow, ScheduleVarianceReport, ScheduleVarianceRow,
};
pub use error::EngineError;
pub use estimates::ImportSummary;
pub use locks::{ProjectGuard, ProjectLocks};
pub use outcome::Outcome;
pub use projects::{allowed_transitions, ProjectInput};
pub use resources::classify_unit;
pub use summary::{Finding, FindingSeverity, PerformanceIndex, PerformanceSummary};
pub use tracking::{ActualCostInput, ProgressInput};

/// Entry point for every engine operation.
///
/// Cheap to clone; clones share the store handle and the lock registry.
#[derive(Debug)]
pub struct BaselineEngine<S> {
    store: Arc<S>,
    locks: Arc<ProjectLocks>,
}

impl<S> Clone for BaselineEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: BaselineStore> BaselineEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_shared(Arc::new(store))
    }

    pub fn with_shared(store: Arc<S>) -> Self {
        Self {
            store,
            locks: Arc::new(ProjectLocks::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Read a committed project, mapping a missing row to `NotFound`.
    pub(crate) fn require_project(
        &self,
        project_id: ProjectId,
    ) -> Result<ProjectRecord, EngineError> {
        Ok(self.store.get_project(project_id)?)
    }
}
