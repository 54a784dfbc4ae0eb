//! Breakdown generation: estimate lines grouped by cost code.

use std::collections::HashMap;

use serde::Serialize;

use keystone_storage::{
    BaselineStore, ElementStatus, EstimateLineId, EstimateLineRecord, NewBreakdownElement,
    ProjectId,
};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

/// One breakdown element-to-be: every estimate line sharing a cost code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeGroup {
    pub code: String,
    /// Description of the first line seen with this code.
    pub description: String,
    pub estimated_cost: f64,
    /// First line seen with this code.
    pub representative_line_id: EstimateLineId,
    pub line_count: usize,
}

/// Group lines by cost code, preserving first-encounter order.
///
/// Callers pass lines in ascending identifier order so the representative
/// line and description are deterministic.
pub fn aggregate_by_code(lines: &[EstimateLineRecord]) -> Vec<CodeGroup> {
    let mut groups: Vec<CodeGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        match index.get(line.cost_code.as_str()) {
            Some(&i) => {
                groups[i].estimated_cost += line.total_cost;
                groups[i].line_count += 1;
            }
            None => {
                index.insert(line.cost_code.as_str(), groups.len());
                groups.push(CodeGroup {
                    code: line.cost_code.clone(),
                    description: line.description.clone(),
                    estimated_cost: line.total_cost,
                    representative_line_id: line.id,
                    line_count: 1,
                });
            }
        }
    }
    groups
}

/// Counts produced by one breakdown run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakdownSummary {
    pub lines_linked: usize,
    pub elements_removed: usize,
    pub elements_created: usize,
    /// Elements whose code existed before and kept its identifier.
    pub identifiers_kept: usize,
    pub estimated_cost: f64,
}

/// Replace the project's breakdown inside an open snapshot.
pub(crate) fn generate_breakdown_in<S: BaselineStore>(
    store: &S,
    snap: &mut S::Snapshot,
    project_id: ProjectId,
) -> Result<BreakdownSummary, EngineError> {
    store.get_project_for_update(snap, project_id)?;

    let lines_linked = store.link_unassigned_estimate_lines(snap, project_id)?;

    let previous: HashMap<String, i64> = store
        .list_breakdown_elements_for_update(snap, project_id)?
        .into_iter()
        .map(|e| (e.code, e.id))
        .collect();
    let elements_removed = store.delete_breakdown_elements(snap, project_id)?;

    let lines = store.list_estimate_lines_for_update(snap, project_id)?;
    let groups = aggregate_by_code(&lines);

    let mut identifiers_kept = 0;
    let mut estimated_cost = 0.0;
    for group in &groups {
        let id = previous.get(&group.code).copied();
        if id.is_some() {
            identifiers_kept += 1;
        }
        store.insert_breakdown_element(
            snap,
            NewBreakdownElement {
                id,
                project_id,
                code: group.code.clone(),
                description: group.description.clone(),
                estimated_cost: group.estimated_cost,
                status: ElementStatus::Planned,
                start_date: None,
                end_date: None,
                estimate_line_id: Some(group.representative_line_id),
            },
        )?;
        estimated_cost += group.estimated_cost;
    }

    store.set_project_estimated_cost(snap, project_id, estimated_cost)?;

    tracing::debug!(
        project_id,
        lines = lines.len(),
        lines_linked,
        elements_removed,
        elements_created = groups.len(),
        identifiers_kept,
        "breakdown replaced"
    );

    Ok(BreakdownSummary {
        lines_linked,
        elements_removed,
        elements_created: groups.len(),
        identifiers_kept,
        estimated_cost,
    })
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Rebuild the project's breakdown elements from its estimate lines.
    ///
    /// Links unassigned estimate lines to the project first. No estimate
    /// lines is not an error: the project ends up with zero elements and an
    /// aggregate cost of zero.
    pub fn generate_breakdown(
        &self,
        project_id: ProjectId,
    ) -> Result<Outcome<BreakdownSummary>, EngineError> {
        let _guard = self.locks.acquire(project_id)?;
        let summary = run_in_snapshot(self.store.as_ref(), "breakdown generation", |snap| {
            generate_breakdown_in(self.store.as_ref(), snap, project_id)
        })?;

        tracing::info!(
            project_id,
            elements = summary.elements_created,
            "breakdown generated"
        );
        let message = if summary.elements_created == 0 {
            format!("Project {project_id} has no estimate lines; breakdown is empty")
        } else {
            format!(
                "Generated {} breakdown element(s) for project {project_id}",
                summary.elements_created
            )
        };
        Ok(Outcome::new(summary, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, code: &str, description: &str, total: f64) -> EstimateLineRecord {
        EstimateLineRecord {
            id,
            project_id: Some(1),
            cost_code: code.to_string(),
            description: description.to_string(),
            quantity: 1.0,
            unit: "EA".to_string(),
            unit_cost: total,
            total_cost: total,
            phase: None,
        }
    }

    #[test]
    fn groups_follow_first_encounter_order() {
        let lines = vec![
            line(1, "03-300", "Concrete", 100.0),
            line(2, "01-010", "Mobilization", 50.0),
            line(3, "03-300", "Concrete pumping", 25.5),
        ];
        let groups = aggregate_by_code(&lines);
        let codes: Vec<&str> = groups.iter().map(|g| g.code.as_str()).collect();
        assert_eq!(codes, vec!["03-300", "01-010"]);
        assert_eq!(groups[0].estimated_cost, 125.5);
        assert_eq!(groups[0].description, "Concrete");
        assert_eq!(groups[0].representative_line_id, 1);
        assert_eq!(groups[0].line_count, 2);
    }

    #[test]
    fn distinct_codes_match_input() {
        let lines = vec![
            line(1, "A", "a", 1.0),
            line(2, "B", "b", 2.0),
            line(3, "A", "a2", 3.0),
            line(4, "C", "c", 4.0),
        ];
        let groups = aggregate_by_code(&lines);
        assert_eq!(groups.len(), 3);
        let total: f64 = groups.iter().map(|g| g.estimated_cost).sum();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(aggregate_by_code(&[]).is_empty());
    }
}
