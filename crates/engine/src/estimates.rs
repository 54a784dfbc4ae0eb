//! Estimate line intake.

use serde::Serialize;

use keystone_storage::{BaselineStore, EstimateLineId, NewEstimateLine, ProjectId};

use crate::error::EngineError;
use crate::outcome::Outcome;
use crate::unit_of_work::run_in_snapshot;
use crate::BaselineEngine;

/// A total further than this from `quantity × unit_cost` is flagged.
pub const TOTAL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub line_ids: Vec<EstimateLineId>,
    /// Lines accepted although their total disagrees with quantity × unit cost.
    pub total_mismatches: usize,
}

fn validate(index: usize, line: &NewEstimateLine) -> Result<(), EngineError> {
    if line.cost_code.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "estimate line {index}: cost code must not be empty"
        )));
    }
    for (field, value) in [
        ("quantity", line.quantity),
        ("unit_cost", line.unit_cost),
        ("total_cost", line.total_cost),
    ] {
        if !value.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "estimate line {index}: {field} must be a finite number"
            )));
        }
    }
    Ok(())
}

fn total_mismatch(line: &NewEstimateLine) -> bool {
    (line.quantity * line.unit_cost - line.total_cost).abs() > TOTAL_TOLERANCE
}

impl<S: BaselineStore> BaselineEngine<S> {
    /// Insert estimate lines in one snapshot.
    ///
    /// With `project_id` set every line is linked to that project; otherwise
    /// each line keeps its own (possibly empty) project link. One invalid
    /// line rejects the whole batch.
    pub fn import_estimates(
        &self,
        project_id: Option<ProjectId>,
        lines: Vec<NewEstimateLine>,
    ) -> Result<Outcome<ImportSummary>, EngineError> {
        for (i, line) in lines.iter().enumerate() {
            validate(i, line)?;
        }
        let total_mismatches = lines.iter().filter(|l| total_mismatch(l)).count();
        let store = self.store.as_ref();

        let line_ids = run_in_snapshot(store, "estimate import", |snap| {
            if let Some(id) = project_id {
                store.get_project_for_update(snap, id)?;
            }
            let mut ids = Vec::with_capacity(lines.len());
            for mut line in lines {
                if project_id.is_some() {
                    line.project_id = project_id;
                }
                ids.push(store.insert_estimate_line(snap, line)?);
            }
            Ok(ids)
        })?;

        tracing::info!(
            project_id = ?project_id,
            lines = line_ids.len(),
            total_mismatches,
            "estimate lines imported"
        );
        if total_mismatches > 0 {
            tracing::warn!(total_mismatches, "estimate totals differ from quantity × unit cost");
        }

        let mut message = format!("Imported {} estimate line(s)", line_ids.len());
        if total_mismatches > 0 {
            message.push_str(&format!(
                "; warning: {total_mismatches} line(s) have a total that differs from quantity × unit cost"
            ));
        }
        Ok(Outcome::new(
            ImportSummary {
                line_ids,
                total_mismatches,
            },
            message,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(code: &str, qty: f64, unit_cost: f64, total: f64) -> NewEstimateLine {
        NewEstimateLine {
            project_id: None,
            cost_code: code.into(),
            description: "d".into(),
            quantity: qty,
            unit: "EA".into(),
            unit_cost,
            total_cost: total,
            phase: None,
        }
    }

    #[test]
    fn empty_code_is_rejected() {
        assert!(validate(0, &line("  ", 1.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let err = validate(3, &line("A", f64::NAN, 1.0, 1.0)).unwrap_err();
        assert!(err.to_string().contains("line 3: quantity"));
        assert!(validate(0, &line("A", 1.0, f64::INFINITY, 1.0)).is_err());
    }

    #[test]
    fn mismatch_beyond_a_cent_is_flagged() {
        assert!(!total_mismatch(&line("A", 3.0, 0.1, 0.3)));
        assert!(total_mismatch(&line("A", 2.0, 10.0, 20.02)));
    }
}
