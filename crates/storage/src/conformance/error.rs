use super::{expect_eq, make_element, seed_project, CheckGroup, CheckOutcome};
use crate::record::{NewBudgetLine, ProjectStatus};
use crate::{BaselineStore, StorageError};

pub(super) fn run_error_tests<S, F>(factory: &F) -> Vec<CheckOutcome>
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "get_project_nonexistent",
        get_project_nonexistent(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "get_project_for_update_nonexistent",
        get_project_for_update_nonexistent(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "update_status_nonexistent",
        update_status_nonexistent(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "get_element_nonexistent",
        get_element_nonexistent(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "get_estimate_line_nonexistent",
        get_estimate_line_nonexistent(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "element_for_missing_project_rejected",
        element_for_missing_project_rejected(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "budget_line_for_missing_element_rejected",
        budget_line_for_missing_element_rejected(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Errors,
        "lists_empty_for_nonexistent_project",
        lists_empty_for_nonexistent_project(&factory()),
    ));

    results
}

// ── 1. get_project on empty store returns ProjectNotFound with the id ────────

fn get_project_nonexistent<S: BaselineStore>(s: &S) -> Result<(), String> {
    match s.get_project(404) {
        Err(StorageError::ProjectNotFound { project_id }) => {
            expect_eq("project_id", project_id, 404)
        }
        other => Err(format!("expected ProjectNotFound, got {other:?}")),
    }
}

// ── 2. snapshot-scoped lookup reports the same error ─────────────────────────

fn get_project_for_update_nonexistent<S: BaselineStore>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let result = s.get_project_for_update(&mut snap, 7);
    s.abort_snapshot(snap).map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::ProjectNotFound { project_id: 7 }) => Ok(()),
        other => Err(format!("expected ProjectNotFound(7), got {other:?}")),
    }
}

// ── 3. status update on a missing project fails ──────────────────────────────

fn update_status_nonexistent<S: BaselineStore>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let result = s.update_project_status(&mut snap, 12, ProjectStatus::Active);
    s.abort_snapshot(snap).map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::ProjectNotFound { project_id: 12 }) => Ok(()),
        other => Err(format!("expected ProjectNotFound(12), got {other:?}")),
    }
}

// ── 4. get_breakdown_element on a missing id ─────────────────────────────────

fn get_element_nonexistent<S: BaselineStore>(s: &S) -> Result<(), String> {
    match s.get_breakdown_element(31) {
        Err(StorageError::ElementNotFound { element_id: 31 }) => Ok(()),
        other => Err(format!("expected ElementNotFound(31), got {other:?}")),
    }
}

// ── 5. get_estimate_line_for_update on a missing id ──────────────────────────

fn get_estimate_line_nonexistent<S: BaselineStore>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let result = s.get_estimate_line_for_update(&mut snap, 5);
    s.abort_snapshot(snap).map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::EstimateLineNotFound { line_id: 5 }) => Ok(()),
        other => Err(format!("expected EstimateLineNotFound(5), got {other:?}")),
    }
}

// ── 6. elements must belong to an existing project ───────────────────────────

fn element_for_missing_project_rejected<S: BaselineStore>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let result = s.insert_breakdown_element(&mut snap, make_element(88, "01", 1.0));
    s.abort_snapshot(snap).map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::ProjectNotFound { project_id: 88 }) => Ok(()),
        other => Err(format!("expected ProjectNotFound(88), got {other:?}")),
    }
}

// ── 7. budget lines must reference an existing element ───────────────────────

fn budget_line_for_missing_element_rejected<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let result = s.insert_budget_line(
        &mut snap,
        NewBudgetLine {
            project_id: p,
            element_id: 9_999,
            category: "01".to_string(),
            amount: 1.0,
        },
    );
    s.abort_snapshot(snap).map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::ElementNotFound { element_id: 9_999 }) => Ok(()),
        other => Err(format!("expected ElementNotFound(9999), got {other:?}")),
    }
}

// ── 8. list queries on an unknown project are empty, not errors ──────────────

fn lists_empty_for_nonexistent_project<S: BaselineStore>(s: &S) -> Result<(), String> {
    expect_eq(
        "estimate lines",
        s.list_estimate_lines(1).map_err(|e| e.to_string())?.len(),
        0,
    )?;
    expect_eq(
        "elements",
        s.list_breakdown_elements(1).map_err(|e| e.to_string())?.len(),
        0,
    )?;
    expect_eq(
        "budget lines",
        s.list_budget_lines(1).map_err(|e| e.to_string())?.len(),
        0,
    )?;
    expect_eq(
        "resource details",
        s.list_resource_details(1).map_err(|e| e.to_string())?.len(),
        0,
    )?;
    expect_eq(
        "actual costs",
        s.list_actual_costs(1).map_err(|e| e.to_string())?.len(),
        0,
    )?;
    expect_eq(
        "progress updates",
        s.list_progress_updates(1).map_err(|e| e.to_string())?.len(),
        0,
    )
}
