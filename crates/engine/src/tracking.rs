//! Intake of execution facts: actual costs and progress updates.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use keystone_storage::{
    ActualCostId, BaselineStore, BreakdownElementRecord, ElementId, NewActualCost,
    NewProgressUpdate, ProgressUpdateId, ProjectId,
};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

/// Category used for an actual cost with no element and no explicit category.
pub const GENERAL_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualCostInput {
    pub element_id: Option<ElementId>,
    /// Defaults to the element's code, or `general` without an element.
    pub category: Option<String>,
    pub description: String,
    pub amount: f64,
    pub transaction_date: Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInput {
    pub element_id: ElementId,
    pub percent_complete: f64,
    pub update_date: Date,
    pub notes: Option<String>,
}

fn element_of_project<S: BaselineStore>(
    store: &S,
    snap: &mut S::Snapshot,
    project_id: ProjectId,
    element_id: ElementId,
) -> Result<BreakdownElementRecord, EngineError> {
    store
        .list_breakdown_elements_for_update(snap, project_id)?
        .into_iter()
        .find(|e| e.id == element_id)
        .ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "breakdown element {element_id} does not belong to project {project_id}"
            ))
        })
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Append an actual cost. Amount must be finite and positive.
    pub fn record_actual_cost(
        &self,
        project_id: ProjectId,
        input: ActualCostInput,
    ) -> Result<Outcome<ActualCostId>, EngineError> {
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "actual cost amount must be a positive number, got {}",
                input.amount
            )));
        }
        let store = self.store.as_ref();

        let id = run_in_snapshot(store, "actual cost intake", |snap| {
            store.get_project_for_update(snap, project_id)?;
            let category = match (input.category, input.element_id) {
                (Some(category), Some(element_id)) => {
                    element_of_project(store, snap, project_id, element_id)?;
                    category
                }
                (None, Some(element_id)) => {
                    element_of_project(store, snap, project_id, element_id)?.code
                }
                (Some(category), None) => category,
                (None, None) => GENERAL_CATEGORY.to_string(),
            };
            Ok(store.insert_actual_cost(
                snap,
                NewActualCost {
                    project_id,
                    element_id: input.element_id,
                    category,
                    description: input.description,
                    amount: input.amount,
                    transaction_date: input.transaction_date,
                    recorded_at: OffsetDateTime::now_utc(),
                },
            )?)
        })?;

        tracing::info!(
            project_id,
            actual_cost_id = id,
            amount = input.amount,
            "actual cost recorded"
        );
        Ok(Outcome::new(
            id,
            format!("Recorded actual cost {id} for project {project_id}"),
        ))
    }

    /// Append a progress update. Percentage must lie in `0..=100`.
    pub fn record_progress(
        &self,
        project_id: ProjectId,
        input: ProgressInput,
    ) -> Result<Outcome<ProgressUpdateId>, EngineError> {
        if !(0.0..=100.0).contains(&input.percent_complete) {
            return Err(EngineError::InvalidInput(format!(
                "percent complete must be between 0 and 100, got {}",
                input.percent_complete
            )));
        }
        let store = self.store.as_ref();

        let id = run_in_snapshot(store, "progress intake", |snap| {
            store.get_project_for_update(snap, project_id)?;
            element_of_project(store, snap, project_id, input.element_id)?;
            Ok(store.insert_progress_update(
                snap,
                NewProgressUpdate {
                    project_id,
                    element_id: input.element_id,
                    percent_complete: input.percent_complete,
                    update_date: input.update_date,
                    notes: input.notes,
                },
            )?)
        })?;

        tracing::info!(
            project_id,
            element_id = input.element_id,
            percent = input.percent_complete,
            "progress recorded"
        );
        Ok(Outcome::new(
            id,
            format!(
                "Recorded {}% complete for element {} of project {project_id}",
                input.percent_complete, input.element_id
            ),
        ))
    }
}
