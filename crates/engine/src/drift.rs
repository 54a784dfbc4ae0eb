//! Budget drift: how far the budget lines have fallen behind the breakdown.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use keystone_storage::{
    BaselineStore, BreakdownElementRecord, BudgetLineId, BudgetLineRecord, ElementId, ProjectId,
};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::BaselineEngine;

/// Amounts closer than this are considered equal.
pub const AMOUNT_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingBudgetLine {
    pub element_id: ElementId,
    pub code: String,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanBudgetLine {
    pub budget_line_id: BudgetLineId,
    pub element_id: ElementId,
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountMismatch {
    pub element_id: ElementId,
    pub code: String,
    pub budgeted: f64,
    pub estimated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetDrift {
    pub project_id: ProjectId,
    pub missing: Vec<MissingBudgetLine>,
    pub orphaned: Vec<OrphanBudgetLine>,
    pub mismatched: Vec<AmountMismatch>,
    pub in_sync: bool,
}

pub fn compare(
    project_id: ProjectId,
    elements: &[BreakdownElementRecord],
    budget: &[BudgetLineRecord],
) -> BudgetDrift {
    let by_id: HashMap<ElementId, &BreakdownElementRecord> =
        elements.iter().map(|e| (e.id, e)).collect();
    let budgeted: HashSet<ElementId> = budget.iter().map(|b| b.element_id).collect();

    let missing: Vec<MissingBudgetLine> = elements
        .iter()
        .filter(|e| !budgeted.contains(&e.id))
        .map(|e| MissingBudgetLine {
            element_id: e.id,
            code: e.code.clone(),
            estimated_cost: e.estimated_cost,
        })
        .collect();

    let mut orphaned = Vec::new();
    let mut mismatched = Vec::new();
    for line in budget {
        match by_id.get(&line.element_id) {
            None => orphaned.push(OrphanBudgetLine {
                budget_line_id: line.id,
                element_id: line.element_id,
                category: line.category.clone(),
                amount: line.amount,
            }),
            Some(e) if (e.estimated_cost - line.amount).abs() > AMOUNT_TOLERANCE => {
                mismatched.push(AmountMismatch {
                    element_id: e.id,
                    code: e.code.clone(),
                    budgeted: line.amount,
                    estimated: e.estimated_cost,
                })
            }
            Some(_) => {}
        }
    }

    let in_sync = missing.is_empty() && orphaned.is_empty() && mismatched.is_empty();
    BudgetDrift {
        project_id,
        missing,
        orphaned,
        mismatched,
        in_sync,
    }
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Compare budget lines with the current breakdown. Read-only.
    pub fn budget_drift(&self, project_id: ProjectId) -> Result<Outcome<BudgetDrift>, EngineError> {
        self.require_project(project_id)?;
        let elements = self.store.list_breakdown_elements(project_id)?;
        let budget = self.store.list_budget_lines(project_id)?;
        let drift = compare(project_id, &elements, &budget);

        let message = if drift.in_sync {
            format!("Budget for project {project_id} matches its breakdown")
        } else {
            format!(
                "Budget for project {project_id} is stale: {} missing, {} orphaned, {} mismatched",
                drift.missing.len(),
                drift.orphaned.len(),
                drift.mismatched.len()
            )
        };
        Ok(Outcome::new(drift, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_storage::ElementStatus;

    fn element(id: ElementId, code: &str, cost: f64) -> BreakdownElementRecord {
        BreakdownElementRecord {
            id,
            project_id: 1,
            code: code.into(),
            description: code.into(),
            estimated_cost: cost,
            status: ElementStatus::Planned,
            start_date: None,
            end_date: None,
            estimate_line_id: None,
        }
    }

    fn line(id: BudgetLineId, element_id: ElementId, amount: f64) -> BudgetLineRecord {
        BudgetLineRecord {
            id,
            project_id: 1,
            element_id,
            category: format!("E{element_id}"),
            amount,
        }
    }

    #[test]
    fn matching_budget_is_in_sync() {
        let drift = compare(1, &[element(1, "A", 10.0)], &[line(1, 1, 10.004)]);
        assert!(drift.in_sync);
    }

    #[test]
    fn reports_every_kind_of_drift() {
        let drift = compare(
            1,
            &[element(1, "A", 10.0), element(2, "B", 20.0)],
            &[line(1, 1, 12.0), line(2, 9, 5.0)],
        );
        assert!(!drift.in_sync);
        assert_eq!(drift.missing[0].element_id, 2);
        assert_eq!(drift.orphaned[0].element_id, 9);
        assert_eq!(drift.mismatched[0].budgeted, 12.0);
    }
}
