//! Project creation and status lifecycle.

use serde::{Deserialize, Serialize};
use time::Date;

use keystone_storage::{BaselineStore, NewProject, ProjectId, ProjectRecord, ProjectStatus};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub name: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    /// Defaults to `Pending`.
    pub status: Option<ProjectStatus>,
}

/// Statuses reachable in one step from `from`.
pub fn allowed_transitions(from: ProjectStatus) -> &'static [ProjectStatus] {
    use ProjectStatus::*;
    match from {
        Pending => &[Planning, Cancelled],
        Planning => &[Active, OnHold, Cancelled],
        Active => &[OnHold, Completed, Cancelled],
        OnHold => &[Active, Cancelled],
        Completed => &[Closed],
        Closed | Cancelled => &[],
    }
}

impl<S: BaselineStore> BaselineEngine<S> {
    pub fn create_project(&self, input: ProjectInput) -> Result<Outcome<ProjectId>, EngineError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::InvalidInput(
                "project name must not be empty".to_string(),
            ));
        }
        let duration_days = match (input.start_date, input.end_date) {
            (Some(start), Some(end)) if end < start => {
                return Err(EngineError::InvalidInput(format!(
                    "project end date {end} is before start date {start}"
                )))
            }
            (Some(start), Some(end)) => Some((end - start).whole_days()),
            _ => None,
        };
        let store = self.store.as_ref();

        let id = run_in_snapshot(store, "project creation", |snap| {
            Ok(store.insert_project(
                snap,
                NewProject {
                    name: name.clone(),
                    start_date: input.start_date,
                    end_date: input.end_date,
                    duration_days,
                    status: input.status.unwrap_or(ProjectStatus::Pending),
                },
            )?)
        })?;

        tracing::info!(project_id = id, name = %name, "project created");
        Ok(Outcome::new(id, format!("Created project {id} '{name}'")))
    }

    /// Move a project to `to` if the lifecycle allows it.
    pub fn transition_project(
        &self,
        project_id: ProjectId,
        to: ProjectStatus,
    ) -> Result<Outcome<ProjectStatus>, EngineError> {
        let store = self.store.as_ref();
        let from = run_in_snapshot(store, "project status change", |snap| {
            let project = store.get_project_for_update(snap, project_id)?;
            if !allowed_transitions(project.status).contains(&to) {
                return Err(EngineError::PreconditionFailed(format!(
                    "Project {project_id} cannot move from {} to {to}",
                    project.status
                )));
            }
            store.update_project_status(snap, project_id, to)?;
            Ok(project.status)
        })?;

        tracing::info!(project_id, from = %from, to = %to, "project status changed");
        Ok(Outcome::new(
            to,
            format!("Project {project_id} moved from {from} to {to}"),
        ))
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>, EngineError> {
        Ok(self.store.list_projects()?)
    }

    pub fn project(&self, project_id: ProjectId) -> Result<ProjectRecord, EngineError> {
        self.require_project(project_id)
    }
}
