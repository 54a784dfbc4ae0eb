use serde::Serialize;

use keystone_storage::{BaselineStore, ProjectId};

use crate::breakdown::{generate_breakdown_in, BreakdownSummary};
use crate::budget::generate_budget_in;
use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::resources::allocate_resources_in;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

/// Counts produced by a full baseline regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegenerationSummary {
    pub breakdown: BreakdownSummary,
    pub budget_lines: usize,
    /// The budget step did not run because the breakdown came out empty.
    pub budget_skipped: bool,
    pub resources: usize,
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Breakdown, budget and resource allocation in a single snapshot.
    ///
    /// Either all three derived tables reflect the current estimate lines or,
    /// on any failure, none of them changed.
    pub fn regenerate_baseline(
        &self,
        project_id: ProjectId,
    ) -> Result<Outcome<RegenerationSummary>, EngineError> {
        let _guard = self.locks.acquire(project_id)?;
        let store = self.store.as_ref();

        let summary = run_in_snapshot(store, "baseline regeneration", |snap| {
            let breakdown = generate_breakdown_in(store, snap, project_id)?;
            let (budget_lines, budget_skipped) = if breakdown.elements_created == 0 {
                (0, true)
            } else {
                (generate_budget_in(store, snap, project_id)?, false)
            };
            let resources = allocate_resources_in(store, snap, project_id)?;
            Ok(RegenerationSummary {
                breakdown,
                budget_lines,
                budget_skipped,
                resources,
            })
        })?;

        tracing::info!(
            project_id,
            elements = summary.breakdown.elements_created,
            budget_lines = summary.budget_lines,
            resources = summary.resources,
            "baseline regenerated"
        );

        let message = if summary.budget_skipped {
            format!(
                "Project {project_id} has no estimate lines; breakdown is empty and the budget step was skipped"
            )
        } else {
            format!(
                "Regenerated baseline for project {project_id}: {} element(s), {} budget line(s), {} resource detail(s)",
                summary.breakdown.elements_created, summary.budget_lines, summary.resources
            )
        };
        Ok(Outcome::new(summary, message))
    }
}
