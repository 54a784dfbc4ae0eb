//! Project-level performance summary with qualitative findings.

use serde::Serialize;

use keystone_storage::{BaselineStore, ProjectId};

use crate::earned_value::{ratio, CostVarianceReport, ScheduleVarianceReport};
use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::BaselineEngine;

/// Below this an index signals trouble.
pub const LOWER_THRESHOLD: f64 = 0.95;
/// Above this an index suggests the baseline was too generous.
pub const UPPER_THRESHOLD: f64 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceIndex {
    Cpi,
    Spi,
}

/// A suggestion derived from one performance index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub index: PerformanceIndex,
    pub severity: FindingSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub project_id: ProjectId,
    pub earned_value: f64,
    pub actual_cost: f64,
    /// Budget at completion: total estimated cost of the breakdown.
    pub budget_at_completion: f64,
    pub planned_value: f64,
    /// `None` when no actual cost is attributed to the breakdown.
    pub cpi: Option<f64>,
    /// `None` when planned value is zero.
    pub spi: Option<f64>,
    pub cost_variance: f64,
    pub schedule_variance: f64,
    pub findings: Vec<Finding>,
}

/// Combine the two element-level analyses into project totals.
pub fn summarize(
    cost: &CostVarianceReport,
    schedule: &ScheduleVarianceReport,
) -> PerformanceSummary {
    let earned_value = cost.total_earned;
    let actual_cost = cost.total_actual;
    let planned_value = schedule.total_planned;
    let cpi = ratio(earned_value, actual_cost);
    let spi = ratio(earned_value, planned_value);

    PerformanceSummary {
        project_id: cost.project_id,
        earned_value,
        actual_cost,
        budget_at_completion: cost.total_estimated,
        planned_value,
        cpi,
        spi,
        cost_variance: earned_value - actual_cost,
        schedule_variance: earned_value - planned_value,
        findings: vec![cpi_finding(cpi), spi_finding(spi)],
    }
}

fn cpi_finding(cpi: Option<f64>) -> Finding {
    let (severity, message) = match cpi {
        None => (
            FindingSeverity::Info,
            "No actual cost recorded against the breakdown; CPI is not applicable".to_string(),
        ),
        Some(v) if v < LOWER_THRESHOLD => (
            FindingSeverity::Warning,
            format!("CPI {v:.3} is below {LOWER_THRESHOLD}: costs are overrunning the work performed; review spending and remaining estimates"),
        ),
        Some(v) if v > UPPER_THRESHOLD => (
            FindingSeverity::Info,
            format!("CPI {v:.3} is above {UPPER_THRESHOLD}: work is costing less than budgeted; the estimate may be too high"),
        ),
        Some(v) => (
            FindingSeverity::Info,
            format!("CPI {v:.3} is within the acceptable range"),
        ),
    };
    Finding {
        index: PerformanceIndex::Cpi,
        severity,
        message,
    }
}

fn spi_finding(spi: Option<f64>) -> Finding {
    let (severity, message) = match spi {
        None => (
            FindingSeverity::Info,
            "Planned value is zero; SPI is not applicable".to_string(),
        ),
        Some(v) if v < LOWER_THRESHOLD => (
            FindingSeverity::Warning,
            format!("SPI {v:.3} is below {LOWER_THRESHOLD}: work is behind the baseline; consider adding resources or resequencing"),
        ),
        Some(v) if v > UPPER_THRESHOLD => (
            FindingSeverity::Info,
            format!("SPI {v:.3} is above {UPPER_THRESHOLD}: work is ahead of the baseline"),
        ),
        Some(v) => (
            FindingSeverity::Info,
            format!("SPI {v:.3} is within the acceptable range"),
        ),
    };
    Finding {
        index: PerformanceIndex::Spi,
        severity,
        message,
    }
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Project totals, CPI/SPI and suggestions.
    ///
    /// Fails whenever either the cost or the schedule analysis fails.
    pub fn project_summary_performance(
        &self,
        project_id: ProjectId,
    ) -> Result<Outcome<PerformanceSummary>, EngineError> {
        let cost = self.analyze_cost_variance(project_id)?.value;
        let schedule = self.analyze_schedule_variance(project_id)?.value;
        let summary = summarize(&cost, &schedule);

        let warnings = summary
            .findings
            .iter()
            .filter(|f| f.severity == FindingSeverity::Warning)
            .count();
        tracing::debug!(project_id, warnings, "performance summarized");
        let message = format!(
            "Performance summary for project {project_id}: {warnings} warning(s)"
        );
        Ok(Outcome::new(summary, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earned_value::{CostVarianceRow, ScheduleVarianceRow};

    fn reports(
        estimated: f64,
        actual: f64,
        pct: f64) -> (CostVarianceReport,
        ScheduleVarianceReport,
    ) {
        let ev = pct / 100.0 * estimated;
        let cost = CostVarianceReport {
            project_id: 1,
            rows: vec![CostVarianceRow {
                element_id: 1,
                code: "A".into(),
                description: "A".into(),
                estimated_cost: estimated,
                actual_cost: actual,
                percent_complete: pct,
                earned_value: ev,
                cost_variance: ev - actual,
                cost_variance_pct: None,
            }],
            total_estimated: estimated,
            total_actual: actual,
            total_earned: ev,
            total_cost_variance: ev - actual,
            unattributed_actual_cost: 0.0,
            anything_recorded: true,
        };
        let schedule = ScheduleVarianceReport {
            project_id: 1,
            rows: vec![ScheduleVarianceRow {
                element_id: 1,
                code: "A".into(),
                planned_value: estimated,
                percent_complete: pct,
                earned_value: ev,
                schedule_variance: ev - estimated,
                spi: ratio(ev, estimated),
            }],
            total_planned: estimated,
            total_earned: ev,
            total_schedule_variance: ev - estimated,
        };
        (cost, schedule)
    }

    #[test]
    fn overrun_raises_cost_warning() {
        let (c, s) = reports(1000.0, 800.0, 50.0);
        let summary = summarize(&c, &s);
        assert_eq!(summary.cpi, Some(0.625));
        assert_eq!(summary.findings[0].severity, FindingSeverity::Warning);
        assert!(summary.findings[0].message.contains("overrunning"));
        assert_eq!(summary.findings[1].severity, FindingSeverity::Warning);
    }

    #[test]
    fn underrun_notes_over_estimation() {
        let (c, s) = reports(1000.0, 500.0, 100.0);
        let summary = summarize(&c, &s);
        assert_eq!(summary.cpi, Some(2.0));
        assert_eq!(summary.spi, Some(1.0));
        assert!(summary.findings[0].message.contains("too high"));
        assert!(summary.findings[1].message.contains("acceptable"));
    }

    #[test]
    fn zero_actual_cost_makes_cpi_not_applicable() {
        let (c, s) = reports(1000.0, 0.0, 40.0);
        let summary = summarize(&c, &s);
        assert_eq!(summary.cpi, None);
        assert_eq!(summary.findings[0].severity, FindingSeverity::Info);
        assert!(summary.findings[0].message.contains("not applicable"));
    }

    #[test]
    fn boundaries_are_acceptable() {
        assert!(cpi_finding(Some(0.95)).message.contains("acceptable"));
        assert!(cpi_finding(Some(1.05)).message.contains("acceptable"));
        assert_eq!(spi_finding(Some(0.9499)).severity, FindingSeverity::Warning);
    }
}
