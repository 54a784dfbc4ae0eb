use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

pub type ProjectId = i64;
pub type EstimateLineId = i64;
pub type ElementId = i64;
pub type BudgetLineId = i64;
pub type ResourceDetailId = i64;
pub type ActualCostId = i64;
pub type ProgressUpdateId = i64;

/// Error returned when a status or type string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

/// Declares a closed string-backed enum. `as_str` and `FromStr` both read the
/// same table, so the persisted spelling lives in exactly one place.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                        expected: Self::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

string_enum! {
    /// Lifecycle status of a project.
    ProjectStatus, "project status" {
        Pending => "pending",
        Planning => "planning",
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
        Closed => "closed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    /// Work status of a breakdown element.
    ElementStatus, "element status" {
        Planned => "planned",
        InProgress => "in_progress",
        Completed => "completed",
        OnHold => "on_hold",
    }
}

string_enum! {
    /// Resource classification inferred from an estimate line's unit.
    ResourceType, "resource type" {
        Labor => "labor",
        Material => "material",
        LumpSum => "lump_sum",
        Other => "other",
    }
}

impl ProjectStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Closed | ProjectStatus::Cancelled)
    }
}

/// A project as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub duration_days: Option<i64>,
    pub status: ProjectStatus,
    /// Sum of the project's breakdown element costs as of the last
    /// breakdown regeneration.
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub duration_days: Option<i64>,
    pub status: ProjectStatus,
}

/// A processed cost-estimate row. `project_id` is `None` until linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateLineRecord {
    pub id: EstimateLineId,
    pub project_id: Option<ProjectId>,
    pub cost_code: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
    pub phase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEstimateLine {
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub cost_code: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
    #[serde(default)]
    pub phase: Option<String>,
}

/// A breakdown (WBS) element derived from one or more estimate lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownElementRecord {
    pub id: ElementId,
    pub project_id: ProjectId,
    pub code: String,
    pub description: String,
    pub estimated_cost: f64,
    pub status: ElementStatus,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    /// Representative estimate line used for resource derivation.
    pub estimate_line_id: Option<EstimateLineId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBreakdownElement {
    /// Reuse this identifier instead of allocating a fresh one.
    pub id: Option<ElementId>,
    pub project_id: ProjectId,
    pub code: String,
    pub description: String,
    pub estimated_cost: f64,
    pub status: ElementStatus,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub estimate_line_id: Option<EstimateLineId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLineRecord {
    pub id: BudgetLineId,
    pub project_id: ProjectId,
    pub element_id: ElementId,
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBudgetLine {
    pub project_id: ProjectId,
    pub element_id: ElementId,
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetailRecord {
    pub id: ResourceDetailId,
    pub element_id: ElementId,
    pub description: String,
    pub resource_type: ResourceType,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResourceDetail {
    pub element_id: ElementId,
    pub description: String,
    pub resource_type: ResourceType,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub total_cost: f64,
}

/// An incurred cost. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualCostRecord {
    pub id: ActualCostId,
    pub project_id: ProjectId,
    pub element_id: Option<ElementId>,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub transaction_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActualCost {
    pub project_id: ProjectId,
    pub element_id: Option<ElementId>,
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub transaction_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// A completion report for one element. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdateRecord {
    pub id: ProgressUpdateId,
    pub project_id: ProjectId,
    pub element_id: ElementId,
    pub percent_complete: f64,
    pub update_date: Date,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProgressUpdate {
    pub project_id: ProjectId,
    pub element_id: ElementId,
    pub percent_complete: f64,
    pub update_date: Date,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in ProjectStatus::ALL {
            let parsed: ProjectStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(
            "ON_HOLD".parse::<ProjectStatus>().unwrap(),
            ProjectStatus::OnHold
        );
        assert_eq!(
            " In_Progress ".parse::<ElementStatus>().unwrap(),
            ElementStatus::InProgress
        );
    }

    #[test]
    fn unknown_status_lists_expected_values() {
        let err = "paused".parse::<ProjectStatus>().unwrap_err();
        assert_eq!(err.kind, "project status");
        assert!(err.expected.contains("on_hold"));
        assert!(err.to_string().contains("paused"));
    }

    #[test]
    fn serde_spelling_matches_as_str() {
        for rt in ResourceType::ALL {
            let json = serde_json::to_string(rt).unwrap();
            assert_eq!(json, format!("\"{}\"", rt.as_str()));
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(ProjectStatus::Closed.is_terminal());
        assert!(ProjectStatus::Cancelled.is_terminal());
        assert!(!ProjectStatus::Completed.is_terminal());
    }
}
