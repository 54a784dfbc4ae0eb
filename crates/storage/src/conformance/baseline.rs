//! Derived baseline table conformance tests.
//!
//! Covers project-scoped replacement of breakdown elements and budget lines,
//! per-element replacement of resource details, code uniqueness, the
//! identifier reuse policy, and one-time linking of unassigned estimate lines.

use super::{expect_eq, make_element, make_estimate_line, seed_project, CheckGroup, CheckOutcome};
use crate::record::{NewBudgetLine, NewResourceDetail, ResourceType};
use crate::{BaselineStore, StorageError};

pub(super) fn run_baseline_tests<S, F>(factory: &F) -> Vec<CheckOutcome>
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "delete_elements_is_project_scoped",
        delete_elements_is_project_scoped(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "duplicate_code_rejected",
        duplicate_code_rejected(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "same_code_allowed_in_other_project",
        same_code_allowed_in_other_project(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "explicit_element_id_preserved",
        explicit_element_id_preserved(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "element_ids_not_reused_after_delete",
        element_ids_not_reused_after_delete(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "link_unassigned_is_idempotent",
        link_unassigned_is_idempotent(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "estimate_lines_listed_in_id_order",
        estimate_lines_listed_in_id_order(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "budget_lines_replaced_per_project",
        budget_lines_replaced_per_project(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "resource_details_replaced_per_element",
        resource_details_replaced_per_element(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Baseline,
        "project_status_and_cost_updates",
        project_status_and_cost_updates(&factory()),
    ));

    results
}

fn budget_line(project_id: i64, element_id: i64, amount: f64) -> NewBudgetLine {
    NewBudgetLine {
        project_id,
        element_id,
        category: "01-010".to_string(),
        amount,
    }
}

fn resource(element_id: i64, unit: &str) -> NewResourceDetail {
    NewResourceDetail {
        element_id,
        description: "crew".to_string(),
        resource_type: ResourceType::Labor,
        quantity: 8.0,
        unit: unit.to_string(),
        unit_cost: 65.0,
        total_cost: 520.0,
    }
}

// ── 1. deleting one project's elements leaves others alone ───────────────────

fn delete_elements_is_project_scoped<S: BaselineStore>(s: &S) -> Result<(), String> {
    let a = seed_project(s, "A")?;
    let b = seed_project(s, "B")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    for code in ["01", "02", "03"] {
        s.insert_breakdown_element(&mut snap, make_element(a, code, 1.0))
            .map_err(|e| e.to_string())?;
    }
    s.insert_breakdown_element(&mut snap, make_element(b, "01", 1.0))
        .map_err(|e| e.to_string())?;
    let deleted = s
        .delete_breakdown_elements(&mut snap, a)
        .map_err(|e| e.to_string())?;
    expect_eq("deleted count", deleted, 3)?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    expect_eq(
        "elements of A",
        s.list_breakdown_elements(a).map_err(|e| e.to_string())?.len(),
        0,
    )?;
    expect_eq(
        "elements of B",
        s.list_breakdown_elements(b).map_err(|e| e.to_string())?.len(),
        1,
    )
}

// ── 2. (project, code) is unique ─────────────────────────────────────────────

fn duplicate_code_rejected<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.insert_breakdown_element(&mut snap, make_element(p, "05-120", 1.0))
        .map_err(|e| e.to_string())?;
    match s.insert_breakdown_element(&mut snap, make_element(p, "05-120", 2.0)) {
        Err(StorageError::DuplicateCode { project_id, code }) => {
            expect_eq("project_id", project_id, p)?;
            expect_eq("code", code.as_str(), "05-120")
        }
        other => Err(format!("expected DuplicateCode, got {other:?}")),
    }
}

// ── 3. codes are only unique within a project ────────────────────────────────

fn same_code_allowed_in_other_project<S: BaselineStore>(s: &S) -> Result<(), String> {
    let a = seed_project(s, "A")?;
    let b = seed_project(s, "B")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.insert_breakdown_element(&mut snap, make_element(a, "05-120", 1.0))
        .map_err(|e| e.to_string())?;
    s.insert_breakdown_element(&mut snap, make_element(b, "05-120", 1.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())
}

// ── 4. explicit identifiers survive delete-then-insert ───────────────────────

fn explicit_element_id_preserved<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let original = s
        .insert_breakdown_element(&mut snap, make_element(p, "01-010", 100.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.delete_breakdown_elements(&mut snap, p)
        .map_err(|e| e.to_string())?;
    let mut again = make_element(p, "01-010", 250.0);
    again.id = Some(original);
    let reinserted = s
        .insert_breakdown_element(&mut snap, again)
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    expect_eq("reinserted id", reinserted, original)?;
    let element = s
        .get_breakdown_element(original)
        .map_err(|e| e.to_string())?;
    expect_eq("estimated_cost", element.estimated_cost, 250.0)
}

// ── 5. fresh identifiers never collide with deleted ones ─────────────────────

fn element_ids_not_reused_after_delete<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let first = s
        .insert_breakdown_element(&mut snap, make_element(p, "01", 1.0))
        .map_err(|e| e.to_string())?;
    let second = s
        .insert_breakdown_element(&mut snap, make_element(p, "02", 1.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.delete_breakdown_elements(&mut snap, p)
        .map_err(|e| e.to_string())?;
    let third = s
        .insert_breakdown_element(&mut snap, make_element(p, "03", 1.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    if third == first || third == second {
        return Err(format!(
            "identifier {third} reused (previous ids {first}, {second})"
        ));
    }
    Ok(())
}

// ── 6. linking claims only unassigned lines, once ────────────────────────────

fn link_unassigned_is_idempotent<S: BaselineStore>(s: &S) -> Result<(), String> {
    let a = seed_project(s, "A")?;
    let b = seed_project(s, "B")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.insert_estimate_line(&mut snap, make_estimate_line(None, "01", 10.0))
        .map_err(|e| e.to_string())?;
    s.insert_estimate_line(&mut snap, make_estimate_line(None, "02", 20.0))
        .map_err(|e| e.to_string())?;
    s.insert_estimate_line(&mut snap, make_estimate_line(Some(b), "03", 30.0))
        .map_err(|e| e.to_string())?;
    let linked = s
        .link_unassigned_estimate_lines(&mut snap, a)
        .map_err(|e| e.to_string())?;
    expect_eq("first link", linked, 2)?;
    let again = s
        .link_unassigned_estimate_lines(&mut snap, a)
        .map_err(|e| e.to_string())?;
    expect_eq("second link", again, 0)?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    expect_eq(
        "lines of A",
        s.list_estimate_lines(a).map_err(|e| e.to_string())?.len(),
        2,
    )?;
    expect_eq(
        "lines of B",
        s.list_estimate_lines(b).map_err(|e| e.to_string())?.len(),
        1,
    )
}

// ── 7. estimate lines come back in insertion (identifier) order ──────────────

fn estimate_lines_listed_in_id_order<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    for code in ["09", "01", "05", "01"] {
        s.insert_estimate_line(&mut snap, make_estimate_line(Some(p), code, 1.0))
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let lines = s.list_estimate_lines(p).map_err(|e| e.to_string())?;
    let codes: Vec<&str> = lines.iter().map(|l| l.cost_code.as_str()).collect();
    expect_eq("codes", codes, vec!["09", "01", "05", "01"])?;
    if !lines.windows(2).all(|w| w[0].id < w[1].id) {
        return Err("estimate lines not in ascending id order".to_string());
    }
    Ok(())
}

// ── 8. budget lines are replaced per project ─────────────────────────────────

fn budget_lines_replaced_per_project<S: BaselineStore>(s: &S) -> Result<(), String> {
    let a = seed_project(s, "A")?;
    let b = seed_project(s, "B")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let ea = s
        .insert_breakdown_element(&mut snap, make_element(a, "01", 1.0))
        .map_err(|e| e.to_string())?;
    let eb = s
        .insert_breakdown_element(&mut snap, make_element(b, "01", 1.0))
        .map_err(|e| e.to_string())?;
    s.insert_budget_line(&mut snap, budget_line(a, ea, 1.0))
        .map_err(|e| e.to_string())?;
    s.insert_budget_line(&mut snap, budget_line(b, eb, 1.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let deleted = s
        .delete_budget_lines(&mut snap, a)
        .map_err(|e| e.to_string())?;
    expect_eq("deleted", deleted, 1)?;
    s.insert_budget_line(&mut snap, budget_line(a, ea, 42.5))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let lines = s.list_budget_lines(a).map_err(|e| e.to_string())?;
    expect_eq("budget lines of A", lines.len(), 1)?;
    expect_eq("amount", lines[0].amount, 42.5)?;
    expect_eq(
        "budget lines of B",
        s.list_budget_lines(b).map_err(|e| e.to_string())?.len(),
        1,
    )
}

// ── 9. resource details are replaced per element ─────────────────────────────

fn resource_details_replaced_per_element<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let e1 = s
        .insert_breakdown_element(&mut snap, make_element(p, "01", 1.0))
        .map_err(|e| e.to_string())?;
    let e2 = s
        .insert_breakdown_element(&mut snap, make_element(p, "02", 1.0))
        .map_err(|e| e.to_string())?;
    s.insert_resource_detail(&mut snap, resource(e1, "HR"))
        .map_err(|e| e.to_string())?;
    s.insert_resource_detail(&mut snap, resource(e1, "HR"))
        .map_err(|e| e.to_string())?;
    s.insert_resource_detail(&mut snap, resource(e2, "HR"))
        .map_err(|e| e.to_string())?;
    let deleted = s
        .delete_resource_details(&mut snap, e1)
        .map_err(|e| e.to_string())?;
    expect_eq("deleted", deleted, 2)?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let details = s.list_resource_details(p).map_err(|e| e.to_string())?;
    expect_eq("remaining details", details.len(), 1)?;
    expect_eq("remaining element", details[0].element_id, e2)?;
    expect_eq("resource_type", details[0].resource_type, ResourceType::Labor)
}

// ── 10. status and aggregate cost updates persist ────────────────────────────

fn project_status_and_cost_updates<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.update_project_status(&mut snap, p, crate::record::ProjectStatus::Active)
        .map_err(|e| e.to_string())?;
    s.set_project_estimated_cost(&mut snap, p, 98_765.43)
        .map_err(|e| e.to_string())?;
    let in_snapshot = s
        .get_project_for_update(&mut snap, p)
        .map_err(|e| e.to_string())?;
    expect_eq(
        "status in snapshot",
        in_snapshot.status,
        crate::record::ProjectStatus::Active,
    )?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let project = s.get_project(p).map_err(|e| e.to_string())?;
    expect_eq("status", project.status, crate::record::ProjectStatus::Active)?;
    expect_eq("estimated_cost", project.estimated_cost, 98_765.43)
}
