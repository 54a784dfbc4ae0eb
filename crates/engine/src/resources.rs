//! Resource detail allocation from each element's representative line.

use keystone_storage::{BaselineStore, NewResourceDetail, ProjectId, ResourceType};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

/// Infer a resource type from a unit of measure.
///
/// Case-insensitive substring match, first hit wins:
///
/// 1. contains `HR` → [`ResourceType::Labor`]
/// 2. contains `LS` → [`ResourceType::LumpSum`]
/// 3. anything else → [`ResourceType::Material`]
pub fn classify_unit(unit: &str) -> ResourceType {
    let unit = unit.to_ascii_uppercase();
    if unit.contains("HR") {
        ResourceType::Labor
    } else if unit.contains("LS") {
        ResourceType::LumpSum
    } else {
        ResourceType::Material
    }
}

/// Replace resource details for every element that has a representative
/// estimate line. Returns the number of details written.
pub(crate) fn allocate_resources_in<S: BaselineStore>(
    store: &S,
    snap: &mut S::Snapshot,
    project_id: ProjectId,
) -> Result<usize, EngineError> {
    store.get_project_for_update(snap, project_id)?;

    let elements = store.list_breakdown_elements_for_update(snap, project_id)?;
    let mut written = 0;
    for element in &elements {
        let Some(line_id) = element.estimate_line_id else {
            continue;
        };
        let line = store.get_estimate_line_for_update(snap, line_id)?;
        store.delete_resource_details(snap, element.id)?;
        store.insert_resource_detail(
            snap,
            NewResourceDetail {
                element_id: element.id,
                description: line.description,
                resource_type: classify_unit(&line.unit),
                quantity: line.quantity,
                unit: line.unit,
                unit_cost: line.unit_cost,
                total_cost: line.total_cost,
            },
        )?;
        written += 1;
    }

    tracing::debug!(project_id, written, "resource details replaced");
    Ok(written)
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Derive resource details for the project's breakdown elements.
    ///
    /// A project with no linked elements succeeds with zero resources.
    pub fn allocate_resources(&self, project_id: ProjectId) -> Result<Outcome<usize>, EngineError> {
        let _guard = self.locks.acquire(project_id)?;
        let written = run_in_snapshot(self.store.as_ref(), "resource allocation", |snap| {
            allocate_resources_in(self.store.as_ref(), snap, project_id)
        })?;

        tracing::info!(project_id, resources = written, "resources allocated");
        Ok(Outcome::new(
            written,
            format!("Allocated {written} resource detail(s) for project {project_id}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_are_labor() {
        assert_eq!(classify_unit("HR"), ResourceType::Labor);
        assert_eq!(classify_unit("MHR"), ResourceType::Labor);
        assert_eq!(classify_unit("hrs"), ResourceType::Labor);
    }

    #[test]
    fn lump_sum_is_detected_case_insensitively() {
        assert_eq!(classify_unit("LS"), ResourceType::LumpSum);
        assert_eq!(classify_unit("ls"), ResourceType::LumpSum);
    }

    #[test]
    fn labor_takes_precedence_over_lump_sum() {
        assert_eq!(classify_unit("LS-HR"), ResourceType::Labor);
    }

    #[test]
    fn everything_else_is_material() {
        for unit in ["CY", "EA", "SF", "", "ton"] {
            assert_eq!(classify_unit(unit), ResourceType::Material, "{unit}");
        }
    }
}
