//! Execution fact conformance tests.
//!
//! Actual costs and progress updates are append-only; backends must return
//! them per project in insertion order with every field intact.

use time::macros::{date, datetime};

use super::{
    expect_eq, make_actual_cost, make_element, make_progress, seed_project, CheckGroup,
    CheckOutcome,
};
use crate::BaselineStore;

pub(super) fn run_fact_tests<S, F>(factory: &F) -> Vec<CheckOutcome>
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.push(CheckOutcome::record(
        CheckGroup::Facts,
        "actual_cost_fields_round_trip",
        actual_cost_fields_round_trip(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Facts,
        "actual_cost_without_element",
        actual_cost_without_element(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Facts,
        "progress_fields_round_trip",
        progress_fields_round_trip(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Facts,
        "facts_listed_per_project_in_order",
        facts_listed_per_project_in_order(&factory()),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Facts,
        "facts_survive_element_replacement",
        facts_survive_element_replacement(&factory()),
    ));

    results
}

// ── 1. every actual cost field survives storage ──────────────────────────────

fn actual_cost_fields_round_trip<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let element = s
        .insert_breakdown_element(&mut snap, make_element(p, "01", 1.0))
        .map_err(|e| e.to_string())?;
    let mut cost = make_actual_cost(p, Some(element), 3_000.25);
    cost.transaction_date = date!(2024 - 12 - 31);
    cost.recorded_at = datetime!(2025-01-02 17:45:12 UTC);
    let id = s
        .insert_actual_cost(&mut snap, cost)
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let costs = s.list_actual_costs(p).map_err(|e| e.to_string())?;
    expect_eq("count", costs.len(), 1)?;
    let c = &costs[0];
    expect_eq("id", c.id, id)?;
    expect_eq("element_id", c.element_id, Some(element))?;
    expect_eq("amount", c.amount, 3_000.25)?;
    expect_eq("category", c.category.as_str(), "materials")?;
    expect_eq("transaction_date", c.transaction_date, date!(2024 - 12 - 31))?;
    expect_eq("recorded_at", c.recorded_at, datetime!(2025-01-02 17:45:12 UTC))
}

// ── 2. the element reference on an actual cost is optional ───────────────────

fn actual_cost_without_element<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.insert_actual_cost(&mut snap, make_actual_cost(p, None, 10.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;
    let costs = s.list_actual_costs(p).map_err(|e| e.to_string())?;
    expect_eq("element_id", costs[0].element_id, None)
}

// ── 3. every progress field survives storage ─────────────────────────────────

fn progress_fields_round_trip<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let element = s
        .insert_breakdown_element(&mut snap, make_element(p, "01", 1.0))
        .map_err(|e| e.to_string())?;
    let mut update = make_progress(p, element, 37.5);
    update.notes = Some("slab poured".to_string());
    s.insert_progress_update(&mut snap, update)
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let updates = s.list_progress_updates(p).map_err(|e| e.to_string())?;
    expect_eq("count", updates.len(), 1)?;
    let u = &updates[0];
    expect_eq("element_id", u.element_id, element)?;
    expect_eq("percent_complete", u.percent_complete, 37.5)?;
    expect_eq("update_date", u.update_date, date!(2025 - 03 - 01))?;
    expect_eq("notes", u.notes.as_deref(), Some("slab poured"))
}

// ── 4. facts are scoped by project and ordered by identifier ─────────────────

fn facts_listed_per_project_in_order<S: BaselineStore>(s: &S) -> Result<(), String> {
    let a = seed_project(s, "A")?;
    let b = seed_project(s, "B")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let ea = s
        .insert_breakdown_element(&mut snap, make_element(a, "01", 1.0))
        .map_err(|e| e.to_string())?;
    for amount in [5.0, 1.0, 3.0] {
        s.insert_actual_cost(&mut snap, make_actual_cost(a, Some(ea), amount))
            .map_err(|e| e.to_string())?;
    }
    s.insert_actual_cost(&mut snap, make_actual_cost(b, None, 99.0))
        .map_err(|e| e.to_string())?;
    for pct in [10.0, 20.0] {
        s.insert_progress_update(&mut snap, make_progress(a, ea, pct))
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let amounts: Vec<f64> = s
        .list_actual_costs(a)
        .map_err(|e| e.to_string())?
        .iter()
        .map(|c| c.amount)
        .collect();
    expect_eq("amounts of A", amounts, vec![5.0, 1.0, 3.0])?;
    let pcts: Vec<f64> = s
        .list_progress_updates(a)
        .map_err(|e| e.to_string())?
        .iter()
        .map(|u| u.percent_complete)
        .collect();
    expect_eq("progress of A", pcts, vec![10.0, 20.0])?;
    expect_eq(
        "progress of B",
        s.list_progress_updates(b).map_err(|e| e.to_string())?.len(),
        0,
    )
}

// ── 5. replacing elements never touches recorded facts ───────────────────────

fn facts_survive_element_replacement<S: BaselineStore>(s: &S) -> Result<(), String> {
    let p = seed_project(s, "A")?;
    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    let element = s
        .insert_breakdown_element(&mut snap, make_element(p, "01", 1.0))
        .map_err(|e| e.to_string())?;
    s.insert_actual_cost(&mut snap, make_actual_cost(p, Some(element), 12.0))
        .map_err(|e| e.to_string())?;
    s.insert_progress_update(&mut snap, make_progress(p, element, 50.0))
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().map_err(|e| e.to_string())?;
    s.delete_breakdown_elements(&mut snap, p)
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).map_err(|e| e.to_string())?;

    let costs = s.list_actual_costs(p).map_err(|e| e.to_string())?;
    expect_eq("actual costs kept", costs.len(), 1)?;
    expect_eq("actual element kept", costs[0].element_id, Some(element))?;
    let updates = s.list_progress_updates(p).map_err(|e| e.to_string())?;
    expect_eq("progress kept", updates.len(), 1)
}
