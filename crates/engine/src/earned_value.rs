//! Earned-value analysis. Read-only; takes no snapshot.
//!
//! Per element: `EV = PC / 100 × estimated`, `CV = EV − AC`,
//! `CV% = CV / EV × 100`, `PV = estimated`, `SV = EV − PV`, `SPI = EV / PV`.
//! Ratios whose denominator is zero are `None`, never NaN.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use keystone_storage::{
    ActualCostRecord, BaselineStore, BreakdownElementRecord, ElementId, ProgressUpdateRecord,
    ProjectId,
};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::BaselineEngine;

/// `numerator / denominator`, or `None` when the denominator is zero or the
/// quotient is not finite.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}

/// Latest completion percentage per element.
///
/// The update with the greatest date wins; among updates on that date the
/// one with the highest identifier wins.
pub fn latest_progress(updates: &[ProgressUpdateRecord]) -> HashMap<ElementId, f64> {
    let mut latest: HashMap<ElementId, &ProgressUpdateRecord> = HashMap::new();
    for update in updates {
        latest
            .entry(update.element_id)
            .and_modify(|current| {
                if (update.update_date, update.id) > (current.update_date, current.id) {
                    *current = update;
                }
            })
            .or_insert(update);
    }
    latest
        .into_iter()
        .map(|(element_id, u)| (element_id, u.percent_complete))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostVarianceRow {
    pub element_id: ElementId,
    pub code: String,
    pub description: String,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub percent_complete: f64,
    pub earned_value: f64,
    pub cost_variance: f64,
    /// `None` when earned value is zero.
    pub cost_variance_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostVarianceReport {
    pub project_id: ProjectId,
    pub rows: Vec<CostVarianceRow>,
    pub total_estimated: f64,
    pub total_actual: f64,
    pub total_earned: f64,
    pub total_cost_variance: f64,
    /// Actual cost with no element, or tied to an element no longer in the
    /// breakdown. Not included in any row or in `total_actual`.
    pub unattributed_actual_cost: f64,
    /// False when the project has neither actual costs nor progress updates.
    pub anything_recorded: bool,
}

/// Build the cost variance report from already-loaded records.
pub fn cost_variance(
    project_id: ProjectId,
    elements: &[BreakdownElementRecord],
    actuals: &[ActualCostRecord],
    progress: &[ProgressUpdateRecord],
) -> CostVarianceReport {
    let current: HashSet<ElementId> = elements.iter().map(|e| e.id).collect();
    let mut actual_by_element: HashMap<ElementId, f64> = HashMap::new();
    let mut unattributed_actual_cost = 0.0;
    for cost in actuals {
        match cost.element_id {
            Some(id) if current.contains(&id) => {
                *actual_by_element.entry(id).or_insert(0.0) += cost.amount;
            }
            _ => unattributed_actual_cost += cost.amount,
        }
    }
    let pct = latest_progress(progress);

    let rows: Vec<CostVarianceRow> = elements
        .iter()
        .map(|e| {
            let actual_cost = actual_by_element.get(&e.id).copied().unwrap_or(0.0);
            let percent_complete = pct.get(&e.id).copied().unwrap_or(0.0);
            let earned_value = percent_complete / 100.0 * e.estimated_cost;
            let cost_variance = earned_value - actual_cost;
            CostVarianceRow {
                element_id: e.id,
                code: e.code.clone(),
                description: e.description.clone(),
                estimated_cost: e.estimated_cost,
                actual_cost,
                percent_complete,
                earned_value,
                cost_variance,
                cost_variance_pct: ratio(cost_variance, earned_value).map(|r| r * 100.0),
            }
        })
        .collect();

    CostVarianceReport {
        project_id,
        total_estimated: rows.iter().map(|r| r.estimated_cost).sum(),
        total_actual: rows.iter().map(|r| r.actual_cost).sum(),
        total_earned: rows.iter().map(|r| r.earned_value).sum(),
        total_cost_variance: rows.iter().map(|r| r.cost_variance).sum(),
        rows,
        unattributed_actual_cost,
        anything_recorded: !actuals.is_empty() || !progress.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleVarianceRow {
    pub element_id: ElementId,
    pub code: String,
    pub planned_value: f64,
    pub percent_complete: f64,
    pub earned_value: f64,
    pub schedule_variance: f64,
    /// `None` when planned value is zero.
    pub spi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleVarianceReport {
    pub project_id: ProjectId,
    pub rows: Vec<ScheduleVarianceRow>,
    pub total_planned: f64,
    pub total_earned: f64,
    pub total_schedule_variance: f64,
}

/// Build the schedule variance report from already-loaded records.
pub fn schedule_variance(
    project_id: ProjectId,
    elements: &[BreakdownElementRecord],
    progress: &[ProgressUpdateRecord],
) -> ScheduleVarianceReport {
    let pct = latest_progress(progress);
    let rows: Vec<ScheduleVarianceRow> = elements
        .iter()
        .map(|e| {
            let percent_complete = pct.get(&e.id).copied().unwrap_or(0.0);
            let planned_value = e.estimated_cost;
            let earned_value = percent_complete / 100.0 * planned_value;
            ScheduleVarianceRow {
                element_id: e.id,
                code: e.code.clone(),
                planned_value,
                percent_complete,
                earned_value,
                schedule_variance: earned_value - planned_value,
                spi: ratio(earned_value, planned_value),
            }
        })
        .collect();

    ScheduleVarianceReport {
        project_id,
        total_planned: rows.iter().map(|r| r.planned_value).sum(),
        total_earned: rows.iter().map(|r| r.earned_value).sum(),
        total_schedule_variance: rows.iter().map(|r| r.schedule_variance).sum(),
        rows,
    }
}

fn no_baseline(project_id: ProjectId) -> EngineError {
    EngineError::PreconditionFailed(format!(
        "Project {project_id} has no baseline; regenerate the baseline first"
    ))
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Cost variance per breakdown element.
    pub fn analyze_cost_variance(
        &self,
        project_id: ProjectId,
    ) -> Result<Outcome<CostVarianceReport>, EngineError> {
        self.require_project(project_id)?;
        let elements = self.store.list_breakdown_elements(project_id)?;
        if elements.is_empty() {
            return Err(no_baseline(project_id));
        }
        let actuals = self.store.list_actual_costs(project_id)?;
        let progress = self.store.list_progress_updates(project_id)?;

        let report = cost_variance(project_id, &elements, &actuals, &progress);
        tracing::debug!(
            project_id,
            elements = report.rows.len(),
            actuals = actuals.len(),
            progress = progress.len(),
            "cost variance analyzed"
        );

        let message = if report.anything_recorded {
            format!(
                "Cost variance for project {project_id} across {} element(s)",
                report.rows.len()
            )
        } else {
            format!(
                "No actual costs or progress have been recorded yet for project {project_id}"
            )
        };
        Ok(Outcome::new(report, message))
    }

    /// Schedule variance per breakdown element.
    ///
    /// Requires a baseline and at least one progress update.
    pub fn analyze_schedule_variance(
        &self,
        project_id: ProjectId,
    ) -> Result<Outcome<ScheduleVarianceReport>, EngineError> {
        self.require_project(project_id)?;
        let elements = self.store.list_breakdown_elements(project_id)?;
        if elements.is_empty() {
            return Err(no_baseline(project_id));
        }
        let progress = self.store.list_progress_updates(project_id)?;
        if progress.is_empty() {
            return Err(EngineError::PreconditionFailed(format!(
                "Project {project_id} has no progress updates; schedule variance needs at least one"
            )));
        }

        let report = schedule_variance(project_id, &elements, &progress);
        tracing::debug!(project_id, elements = report.rows.len(), "schedule variance analyzed");
        let message = format!(
            "Schedule variance for project {project_id} across {} element(s)",
            report.rows.len()
        );
        Ok(Outcome::new(report, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_storage::ElementStatus;
    use time::macros::{date, datetime};
    use time::Date;

    fn element(id: ElementId, code: &str, estimated: f64) -> BreakdownElementRecord {
        BreakdownElementRecord {
            id,
            project_id: 1,
            code: code.to_string(),
            description: code.to_string(),
            estimated_cost: estimated,
            status: ElementStatus::Planned,
            start_date: None,
            end_date: None,
            estimate_line_id: None,
        }
    }

    fn actual(id: i64, element_id: Option<ElementId>, amount: f64) -> ActualCostRecord {
        ActualCostRecord {
            id,
            project_id: 1,
            element_id,
            category: "general".to_string(),
            description: String::new(),
            amount,
            transaction_date: date!(2024 - 03 - 01),
            recorded_at: datetime!(2024-03-01 12:00 UTC),
        }
    }

    fn progress(id: i64, element_id: ElementId, pct: f64, on: Date) -> ProgressUpdateRecord {
        ProgressUpdateRecord {
            id,
            project_id: 1,
            element_id,
            percent_complete: pct,
            update_date: on,
            notes: None,
        }
    }

    #[test]
    fn overrun_free_element_at_full_progress() {
        let report = cost_variance(
            1,
            &[element(1, "01-010", 5000.0)],
            &[actual(1, Some(1), 3000.0)],
            &[progress(1, 1, 100.0, date!(2024 - 03 - 02))],
        );
        let row = &report.rows[0];
        assert_eq!(row.earned_value, 5000.0);
        assert_eq!(row.actual_cost, 3000.0);
        assert_eq!(row.cost_variance, 2000.0);
        assert_eq!(row.cost_variance_pct, Some(40.0));
        assert!(report.anything_recorded);
    }

    #[test]
    fn half_done_without_actuals() {
        let report = cost_variance(
            1,
            &[element(1, "01-010", 5000.0)],
            &[],
            &[progress(1, 1, 50.0, date!(2024 - 03 - 02))],
        );
        let row = &report.rows[0];
        assert_eq!(row.earned_value, 2500.0);
        assert_eq!(row.actual_cost, 0.0);
        assert_eq!(row.cost_variance, 2500.0);
        assert_eq!(row.cost_variance_pct, Some(100.0));
    }

    #[test]
    fn zero_earned_value_has_no_percentage() {
        let report = cost_variance(1, &[element(1, "A", 100.0)], &[actual(1, Some(1), 10.0)], &[]);
        let row = &report.rows[0];
        assert_eq!(row.earned_value, 0.0);
        assert_eq!(row.cost_variance, -10.0);
        assert_eq!(row.cost_variance_pct, None);
    }

    #[test]
    fn nothing_recorded_gives_zero_rows() {
        let report = cost_variance(1, &[element(1, "A", 100.0), element(2, "B", 50.0)], &[], &[]);
        assert!(!report.anything_recorded);
        for row in &report.rows {
            assert_eq!(row.actual_cost, 0.0);
            assert_eq!(row.earned_value, 0.0);
            assert_eq!(row.cost_variance, 0.0);
        }
    }

    #[test]
    fn actuals_off_the_breakdown_are_unattributed() {
        let report = cost_variance(
            1,
            &[element(1, "A", 100.0)],
            &[
                actual(1, Some(1), 10.0),
                actual(2, None, 4.0),
                actual(3, Some(99), 6.0),
            ],
            &[],
        );
        assert_eq!(report.total_actual, 10.0);
        assert_eq!(report.unattributed_actual_cost, 10.0);
    }

    #[test]
    fn latest_date_wins_then_highest_id() {
        let updates = vec![
            progress(1, 1, 80.0, date!(2024 - 03 - 05)),
            progress(2, 1, 20.0, date!(2024 - 03 - 01)),
            progress(3, 2, 30.0, date!(2024 - 03 - 04)),
            progress(4, 2, 60.0, date!(2024 - 03 - 04)),
        ];
        let latest = latest_progress(&updates);
        assert_eq!(latest[&1], 80.0);
        assert_eq!(latest[&2], 60.0);
    }

    #[test]
    fn earned_value_stays_within_estimate() {
        for pct in [0.0, 12.5, 50.0, 99.9, 100.0] {
            let report = cost_variance(
                1,
                &[element(1, "A", 1234.56)],
                &[],
                &[progress(1, 1, pct, date!(2024 - 01 - 01))],
            );
            let ev = report.rows[0].earned_value;
            assert!((0.0..=1234.56).contains(&ev), "pct {pct} gave ev {ev}");
        }
    }

    #[test]
    fn schedule_variance_of_zero_cost_element() {
        let report = schedule_variance(
            1,
            &[element(1, "A", 0.0), element(2, "B", 200.0)],
            &[progress(1, 2, 25.0, date!(2024 - 01 - 01))],
        );
        assert_eq!(report.rows[0].spi, None);
        assert_eq!(report.rows[1].earned_value, 50.0);
        assert_eq!(report.rows[1].schedule_variance, -150.0);
        assert_eq!(report.rows[1].spi, Some(0.25));
        assert_eq!(report.total_planned, 200.0);
    }

    #[test]
    fn ratio_never_yields_nan() {
        assert_eq!(ratio(0.0, 0.0), None);
        assert_eq!(ratio(5.0, 0.0), None);
        assert_eq!(ratio(f64::INFINITY, 1.0), None);
        assert_eq!(ratio(1.0, 4.0), Some(0.25));
    }
}
