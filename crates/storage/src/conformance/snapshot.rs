//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes are visible, and aborted or dropped writes are discarded.

use super::{
    expect_eq, make_element, make_estimate_line, make_project, seed_project, CheckGroup,
    CheckOutcome,
};
use crate::{BaselineStore, StorageError};

pub(super) fn run_snapshot_tests<S, F>(factory: &F) -> Vec<CheckOutcome>
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "begin_and_commit_empty_snapshot",
        begin_and_commit_empty_snapshot(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "begin_and_abort_empty_snapshot",
        begin_and_abort_empty_snapshot(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "uncommitted_project_invisible",
        uncommitted_project_invisible(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "committed_project_visible",
        committed_project_visible(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "abort_discards_writes",
        abort_discards_writes(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "drop_discards_writes",
        drop_discards_writes(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "snapshot_reads_own_writes",
        snapshot_reads_own_writes(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Snapshot,
        "multi_table_commit_is_atomic",
        multi_table_commit_is_atomic(&factory()),
    ));

    results
}

// ── 1. begin + commit with no writes ─────────────────────────────────────────

fn begin_and_commit_empty_snapshot<S: BaselineStore>(s: &S) -> Result<(), String> {
    let snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())
}

// ── 2. begin + abort with no writes ──────────────────────────────────────────

fn begin_and_abort_empty_snapshot<S: BaselineStore>(s: &S) -> Result<(), String> {
    let snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).map_err(|e| e.to_string())
}

// ── 3. uncommitted insert is invisible to committed-state queries ────────────

fn uncommitted_project_invisible<S: BaselineStore>(s: &S) -> Result<(), String> {
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let id = s
        .insert_project(&mut snap, make_project("Harbor Pier"))
        .map_err(|e| e.to_string())?;

    match s.get_project(id) {
        Err(StorageError::ProjectNotFound { .. }) => {}
        other => return Err(format!("expected ProjectNotFound before commit, got {other:?}")),
    }
    let listed = s.list_projects().map_err(|e| e.to_string())?;
    expect_eq("projects listed before commit", listed.len(), 0)?;

    s.abort_snapshot(snap).map_err(|e| e.to_string())
}

// ── 4. committed insert is visible ───────────────────────────────────────────

fn committed_project_visible<S: BaselineStore>(s: &S) -> Result<(), String> {
    let id = seed_project(s, "Harbor Pier")?;
    let project = s.get_project(id).map_err(|e| e.to_string())?;
    expect_eq("name", project.name.as_str(), "Harbor Pier")?;
    expect_eq("estimated_cost", project.estimated_cost, 0.0)?;
    expect_eq("duration_days", project.duration_days, Some(175))?;
    Ok(())
}

// ── 5. abort discards writes ─────────────────────────────────────────────────

fn abort_discards_writes<S: BaselineStore>(s: &S) -> Result<(), String> {
    let project_id = seed_project(s, "Library Annex")?;

    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.insert_estimate_line(&mut snap, make_estimate_line(Some(project_id), "03-300", 1200.0))
        .map_err(|e| e.to_string())?;
    s.set_project_estimated_cost(&mut snap, project_id, 1200.0)
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).map_err(|e| e.to_string())?;

    let lines = s.list_estimate_lines(project_id).map_err(|e| e.to_string())?;
    expect_eq("estimate lines after abort", lines.len(), 0)?;
    let project = s.get_project(project_id).map_err(|e| e.to_string())?;
    expect_eq("estimated_cost after abort", project.estimated_cost, 0.0)
}

// ── 6. dropping an uncommitted snapshot discards writes ──────────────────────

fn drop_discards_writes<S: BaselineStore>(s: &S) -> Result<(), String> {
    let project_id = seed_project(s, "Library Annex")?;
    {
        let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
        s.insert_breakdown_element(&mut snap, make_element(project_id, "01-010", 10.0))
            .map_err(|e| e.to_string())?;
    }
    let elements = s
        .list_breakdown_elements(project_id)
        .map_err(|e| e.to_string())?;
    expect_eq("elements after drop", elements.len(), 0)
}

// ── 7. snapshot-scoped reads observe the snapshot's own writes ───────────────

fn snapshot_reads_own_writes<S: BaselineStore>(s: &S) -> Result<(), String> {
    let project_id = seed_project(s, "Clinic")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let line_id = s
        .insert_estimate_line(&mut snap, make_estimate_line(Some(project_id), "02-200", 50.0))
        .map_err(|e| e.to_string())?;
    s.insert_breakdown_element(&mut snap, make_element(project_id, "02-200", 50.0))
        .map_err(|e| e.to_string())?;

    let lines = s
        .list_estimate_lines_for_update(&mut snap, project_id)
        .map_err(|e| e.to_string())?;
    expect_eq("lines in snapshot", lines.len(), 1)?;
    let line = s
        .get_estimate_line_for_update(&mut snap, line_id)
        .map_err(|e| e.to_string())?;
    expect_eq("line code", line.cost_code.as_str(), "02-200")?;
    let elements = s
        .list_breakdown_elements_for_update(&mut snap, project_id)
        .map_err(|e| e.to_string())?;
    expect_eq("elements in snapshot", elements.len(), 1)?;

    s.abort_snapshot(snap).map_err(|e| e.to_string())
}

// ── 8. writes across several tables commit together ──────────────────────────

fn multi_table_commit_is_atomic<S: BaselineStore>(s: &S) -> Result<(), String> {
    let project_id = seed_project(s, "Depot")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.insert_estimate_line(&mut snap, make_estimate_line(Some(project_id), "04-400", 75.0))
        .map_err(|e| e.to_string())?;
    s.insert_breakdown_element(&mut snap, make_element(project_id, "04-400", 75.0))
        .map_err(|e| e.to_string())?;
    s.set_project_estimated_cost(&mut snap, project_id, 75.0)
        .map_err(|e| e.to_string())?;

    expect_eq(
        "elements before commit",
        s.list_breakdown_elements(project_id)
            .map_err(|e| e.to_string())?
            .len(),
        0,
    )?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    expect_eq(
        "lines after commit",
        s.list_estimate_lines(project_id)
            .map_err(|e| e.to_string())?
            .len(),
        1,
    )?;
    expect_eq(
        "elements after commit",
        s.list_breakdown_elements(project_id)
            .map_err(|e| e.to_string())?
            .len(),
        1,
    )?;
    let project = s.get_project(project_id).map_err(|e| e.to_string())?;
    expect_eq("estimated_cost after commit", project.estimated_cost, 75.0)
}
