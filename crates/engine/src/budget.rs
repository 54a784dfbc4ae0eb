use keystone_storage::{BaselineStore, NewBudgetLine, ProjectId};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

/// Replace the project's budget lines with one line per breakdown element.
///
/// Returns the number of lines written. Fails with `PreconditionFailed` when
/// the project has no breakdown.
pub(crate) fn generate_budget_in<S: BaselineStore>(
    store: &S,
    snap: &mut S::Snapshot,
    project_id: ProjectId,
) -> Result<usize, EngineError> {
    store.get_project_for_update(snap, project_id)?;

    let elements = store.list_breakdown_elements_for_update(snap, project_id)?;
    if elements.is_empty() {
        return Err(EngineError::PreconditionFailed(format!(
            "Project {project_id} has no breakdown; generate the breakdown first"
        )));
    }

    let removed = store.delete_budget_lines(snap, project_id)?;
    for element in &elements {
        store.insert_budget_line(
            snap,
            NewBudgetLine {
                project_id,
                element_id: element.id,
                category: element.code.clone(),
                amount: element.estimated_cost,
            },
        )?;
    }

    tracing::debug!(project_id, removed, written = elements.len(), "budget replaced");
    Ok(elements.len())
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Rebuild the budget baseline from the current breakdown.
    pub fn generate_budget(&self, project_id: ProjectId) -> Result<Outcome<usize>, EngineError> {
        let _guard = self.locks.acquire(project_id)?;
        let written = run_in_snapshot(self.store.as_ref(), "budget generation", |snap| {
            generate_budget_in(self.store.as_ref(), snap, project_id)
        })?;

        tracing::info!(project_id, budget_lines = written, "budget generated");
        Ok(Outcome::new(
            written,
            format!("Generated {written} budget line(s) for project {project_id}"),
        ))
    }
}
