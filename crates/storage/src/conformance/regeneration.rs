//! Regeneration cycle checks.
//!
//! A regeneration deletes a project's breakdown elements while budget lines,
//! resource details and execution facts still reference them, then recreates
//! the elements (keeping the identifier of every code that persists) and
//! rebuilds the budget and resource rows. Backends must allow the dangling
//! references in between and must never touch the facts.

use std::collections::HashMap;

use super::{
    expect_eq, make_actual_cost, make_element, make_progress, seed_project, CheckGroup,
    CheckOutcome,
};
use crate::record::{ElementId, NewBudgetLine, NewResourceDetail, ProjectId, ResourceType};
use crate::{BaselineStore, StorageError};

pub(super) fn run_regeneration_tests<S, F>(factory: &F) -> Vec<CheckOutcome>
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.push(CheckOutcome::record(
        CheckGroup::Regeneration,
        "referenced_elements_can_be_replaced",
        referenced_elements_can_be_replaced(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Regeneration,
        "replacement_repeats_identically",
        replacement_repeats_identically(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Regeneration,
        "vanished_code_leaves_facts_untouched",
        vanished_code_leaves_facts_untouched(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Regeneration,
        "budget_survives_element_only_replacement",
        budget_survives_element_only_replacement(&factory()),
    ));

    results
}

/// Replace the project's elements with `codes` inside one snapshot, reusing
/// the identifier of every code that already existed. When `with_budget` is
/// set, budget lines and resource details are rebuilt as well.
fn replace<S: BaselineStore>(
    s: &S,
    project_id: ProjectId,
    codes: &[(&str, f64)],
    with_budget: bool,
) -> Result<HashMap<String, ElementId>, StorageError> {
    let mut snap = s.begin_snapshot()?;
    let previous: HashMap<String, ElementId> = s
        .list_breakdown_elements_for_update(&mut snap, project_id)?
        .into_iter()
        .map(|e| (e.code, e.id))
        .collect();
    s.delete_breakdown_elements(&mut snap, project_id)?;

    let mut ids = HashMap::new();
    for (code, cost) in codes {
        let mut element = make_element(project_id, code, *cost);
        element.id = previous.get(*code).copied();
        let id = s.insert_breakdown_element(&mut snap, element)?;
        ids.insert(code.to_string(), id);
    }

    if with_budget {
        s.delete_budget_lines(&mut snap, project_id)?;
        for (code, cost) in codes {
            let element_id = ids[*code];
            s.insert_budget_line(
                &mut snap,
                NewBudgetLine {
                    project_id,
                    element_id,
                    category: code.to_string(),
                    amount: *cost,
                },
            )?;
            s.delete_resource_details(&mut snap, element_id)?;
            s.insert_resource_detail(
                &mut snap,
                NewResourceDetail {
                    element_id,
                    description: format!("supply for {code}"),
                    resource_type: ResourceType::Material,
                    quantity: 1.0,
                    unit: "EA".to_string(),
                    unit_cost: *cost,
                    total_cost: *cost,
                },
            )?;
        }
    }

    s.commit_snapshot(snap)?;
    Ok(ids)
}

fn record_facts<S: BaselineStore>(
    s: &S,
    project_id: ProjectId,
    element_id: ElementId,
) -> Result<(), StorageError> {
    let mut snap = s.begin_snapshot()?;
    s.insert_actual_cost(&mut snap, make_actual_cost(project_id, Some(element_id), 1200.0))?;
    s.insert_progress_update(&mut snap, make_progress(project_id, element_id, 40.0))?;
    s.commit_snapshot(snap)
}

// ── 1. elements referenced by every dependent table can be replaced ─────────

fn referenced_elements_can_be_replaced<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "Harbor Office")?;
    let first = replace(s, p, &[("01-010", 5000.0)], true).map_err(|e| format!("first: {e}"))?;
    let element = first["01-010"];
    record_facts(s, p, element).map_err(|e| e.to_string())?;

    let second =
        replace(s, p, &[("01-010", 5000.0)], true).map_err(|e| format!("second: {e}"))?;
    expect_eq("identifier kept", second["01-010"], element)?;

    let budget = s.list_budget_lines(p).map_err(|e| e.to_string())?;
    expect_eq("budget lines", budget.len(), 1)?;
    expect_eq("budget element", budget[0].element_id, element)?;
    let resources = s.list_resource_details(p).map_err(|e| e.to_string())?;
    expect_eq("resource details", resources.len(), 1)?;

    let costs = s.list_actual_costs(p).map_err(|e| e.to_string())?;
    expect_eq("actual cost element", costs[0].element_id, Some(element))?;
    let updates = s.list_progress_updates(p).map_err(|e| e.to_string())?;
    expect_eq("progress element", updates[0].element_id, element)
}

// ── 2. replaying the same cycle yields the same rows ─────────────────────────

fn replacement_repeats_identically<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "Riverside Clinic")?;
    let codes = [("01-010", 5000.0), ("03-300", 11200.0), ("31-000", 3600.0)];
    replace(s, p, &codes, true).map_err(|e| e.to_string())?;
    let first = s.list_breakdown_elements(p).map_err(|e| e.to_string())?;

    for run in 0..2 {
        replace(s, p, &codes, true).map_err(|e| format!("run {run}: {e}"))?;
    }

    let again = s.list_breakdown_elements(p).map_err(|e| e.to_string())?;
    expect_eq("elements", again, first)?;
    let budget = s.list_budget_lines(p).map_err(|e| e.to_string())?;
    expect_eq("budget lines", budget.len(), 3)?;
    let resources = s.list_resource_details(p).map_err(|e| e.to_string())?;
    expect_eq("resource details", resources.len(), 3)
}

// ── 3. a code that disappears leaves its facts pointing at the old id ────────

fn vanished_code_leaves_facts_untouched<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "Depot")?;
    let first = replace(s, p, &[("01-010", 100.0), ("02-200", 800.0)], true)
        .map_err(|e| e.to_string())?;
    let demolition = first["02-200"];
    record_facts(s, p, demolition).map_err(|e| e.to_string())?;

    let second = replace(s, p, &[("01-010", 100.0), ("31-000", 300.0)], true)
        .map_err(|e| e.to_string())?;
    expect_eq("kept code", second["01-010"], first["01-010"])?;
    if second["31-000"] <= demolition {
        return Err(format!(
            "new code reused or preceded a retired identifier: {} <= {demolition}",
            second["31-000"]
        ));
    }

    match s.get_breakdown_element(demolition) {
        Err(StorageError::ElementNotFound { .. }) => {}
        other => return Err(format!("expected ElementNotFound, got {other:?}")),
    }
    let costs = s.list_actual_costs(p).map_err(|e| e.to_string())?;
    expect_eq("facts kept", costs.len(), 1)?;
    expect_eq("fact element", costs[0].element_id, Some(demolition))?;
    let budget = s.list_budget_lines(p).map_err(|e| e.to_string())?;
    if budget.iter().any(|b| b.element_id == demolition) {
        return Err("budget still references the retired element".to_string());
    }
    Ok(())
}

// ── 4. element-only replacement keeps the previous budget lines ──────────────

fn budget_survives_element_only_replacement<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "Annex")?;
    let first = replace(s, p, &[("01-010", 100.0)], true).map_err(|e| e.to_string())?;
    replace(s, p, &[("01-010", 250.0)], false).map_err(|e| e.to_string())?;

    let elements = s.list_breakdown_elements(p).map_err(|e| e.to_string())?;
    expect_eq("element cost", elements[0].estimated_cost, 250.0)?;
    let budget = s.list_budget_lines(p).map_err(|e| e.to_string())?;
    expect_eq("budget lines", budget.len(), 1)?;
    expect_eq("budget element", budget[0].element_id, first["01-010"])?;
    expect_eq("budget amount", budget[0].amount, 100.0)
}
