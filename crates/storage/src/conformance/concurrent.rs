use std::sync::Arc;
use std::thread;

use super::{
    expect_eq, make_actual_cost, make_element, make_project, seed_project, CheckGroup,
    CheckOutcome,
};
use crate::{BaselineStore, StorageError};

/// Number of concurrent writers spawned in each test.
const N: usize = 8;

pub(super) fn run_concurrent_tests<S, F>(factory: &F) -> Vec<CheckOutcome>
where
    S: BaselineStore,
    F: Fn() -> S,
{
    let mut results = Vec::new();

    results.push(CheckOutcome::record(
        CheckGroup::Concurrency,
        "parallel_writers_never_lose_commits",
        parallel_writers_never_lose_commits(Arc::new(factory())),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Concurrency,
        "parallel_fact_appends_are_all_counted",
        parallel_fact_appends_are_all_counted(Arc::new(factory())),
    ));
    results.push(CheckOutcome::record(
        CheckGroup::Concurrency,
        "element_replacement_per_project_all_commit",
        element_replacement_per_project_all_commit(Arc::new(factory())),
    ));

    results
}

/// Run `write` on `N` threads, each in its own snapshot. Every snapshot must
/// commit on the first attempt: backends serialize writers instead of
/// rejecting them.
fn run_writers<S, W>(storage: Arc<S>, write: W) -> Result<(), String>
where
    S: BaselineStore,
    W: Fn(&S, &mut S::Snapshot, usize) -> Result<(), StorageError> + Send + Sync + 'static,
{
    let write = Arc::new(write);
    let handles: Vec<_> = (0..N)
        .map(|i| {
            let s = Arc::clone(&storage);
            let w = Arc::clone(&write);
            thread::spawn(move || -> Result<(), StorageError> {
                let mut snap = s.begin_snapshot()?;
                w(&s, &mut snap, i)?;
                s.commit_snapshot(snap)
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| "writer thread panicked".to_string())?
            .map_err(|e| format!("writer failed: {e}"))?;
    }
    Ok(())
}

// ── Each of N writers creates one project; all N must be visible ─────────────

fn parallel_writers_never_lose_commits<S: BaselineStore>(storage: Arc<S>) -> Result<(), String> {
    run_writers(Arc::clone(&storage), |s, snap, i| {
        s.insert_project(snap, make_project(&format!("site-{i}")))
            .map(|_| ())
    })?;
    let projects = storage.list_projects().map_err(|e| e.to_string())?;
    expect_eq("project count", projects.len(), N)
}

// ── Each of N writers appends one actual cost to the same project ────────────

fn parallel_fact_appends_are_all_counted<S: BaselineStore>(storage: Arc<S>) -> Result<(), String> {
    let project_id = seed_project(storage.as_ref(), "shared")?;
    run_writers(Arc::clone(&storage), move |s, snap, i| {
        s.insert_actual_cost(snap, make_actual_cost(project_id, None, (i + 1) as f64))
            .map(|_| ())
    })?;
    let costs = storage
        .list_actual_costs(project_id)
        .map_err(|e| e.to_string())?;
    expect_eq("cost count", costs.len(), N)?;
    let total: f64 = costs.iter().map(|c| c.amount).sum();
    expect_eq("cost total", total, (1..=N).map(|i| i as f64).sum::<f64>())
}

// ── Each of N writers replaces the elements of its own project ───────────────

fn element_replacement_per_project_all_commit<S: BaselineStore>(
    storage: Arc<S>,
) -> Result<(), String> {
    let projects = (0..N)
        .map(|i| seed_project(storage.as_ref(), &format!("site-{i}")))
        .collect::<Result<Vec<_>, _>>()?;
    let targets = Arc::new(projects.clone());
    run_writers(Arc::clone(&storage), move |s, snap, i| {
        let project_id = targets[i];
        s.delete_breakdown_elements(snap, project_id)?;
        s.insert_breakdown_element(snap, make_element(project_id, "01-010", (i + 1) as f64))?;
        s.set_project_estimated_cost(snap, project_id, (i + 1) as f64)
    })?;
    for (i, project_id) in projects.into_iter().enumerate() {
        let elements = storage
            .list_breakdown_elements(project_id)
            .map_err(|e| e.to_string())?;
        expect_eq("elements per project", elements.len(), 1)?;
        let project = storage.get_project(project_id).map_err(|e| e.to_string())?;
        expect_eq("project cost", project.estimated_cost, (i + 1) as f64)?;
    }
    Ok(())
}
