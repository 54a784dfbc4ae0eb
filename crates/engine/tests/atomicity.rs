//! Regeneration under injected write failures must leave the store unchanged.

use std::sync::atomic::{AtomicI64, Ordering};

use keystone_engine::{BaselineEngine, EngineError, ProjectInput};
use keystone_storage::{
    ActualCostId, ActualCostRecord, BaselineStore, BreakdownElementRecord, BudgetLineId,
    BudgetLineRecord, ElementId, EstimateLineId, EstimateLineRecord, MemoryStore, NewActualCost,
    NewBreakdownElement, NewBudgetLine, NewEstimateLine, NewProgressUpdate, NewProject,
    NewResourceDetail, ProgressUpdateId, ProgressUpdateRecord, ProjectId, ProjectRecord,
    ProjectStatus, ResourceDetailId, ResourceDetailRecord, StorageError,
};

/// Wraps a `MemoryStore` and fails the derived-table insert that follows
/// `remaining` successful ones. A negative budget disarms it.
struct FailingStore {
    inner: MemoryStore,
    remaining: AtomicI64,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: AtomicI64::new(-1),
        }
    }

    fn fail_after(&self, inserts: i64) {
        self.remaining.store(inserts, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.remaining.store(-1, Ordering::SeqCst);
    }

    fn tick(&self) -> Result<(), StorageError> {
        match self.remaining.load(Ordering::SeqCst) {
            n if n < 0 => Ok(()),
            0 => Err(StorageError::Backend("injected failure".to_string())),
            n => {
                self.remaining.store(n - 1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

type Snap = <MemoryStore as BaselineStore>::Snapshot;

impl BaselineStore for FailingStore {
    type Snapshot = Snap;

    fn begin_snapshot(&self) -> Result<Snap, StorageError> {
        self.inner.begin_snapshot()
    }
    fn commit_snapshot(&self, snapshot: Snap) -> Result<(), StorageError> {
        self.inner.commit_snapshot(snapshot)
    }
    fn abort_snapshot(&self, snapshot: Snap) -> Result<(), StorageError> {
        self.inner.abort_snapshot(snapshot)
    }
    fn insert_project(&self, s: &mut Snap, p: NewProject) -> Result<ProjectId, StorageError> {
        self.inner.insert_project(s, p)
    }
    fn get_project_for_update(
        &self,
        s: &mut Snap,
        id: ProjectId,
    ) -> Result<ProjectRecord, StorageError> {
        self.inner.get_project_for_update(s, id)
    }
    fn update_project_status(
        &self,
        s: &mut Snap,
        id: ProjectId,
        st: ProjectStatus,
    ) -> Result<(), StorageError> {
        self.inner.update_project_status(s, id, st)
    }
    fn set_project_estimated_cost(
        &self,
        s: &mut Snap,
        id: ProjectId,
        c: f64,
    ) -> Result<(), StorageError> {
        self.tick()?;
        self.inner.set_project_estimated_cost(s, id, c)
    }
    fn insert_estimate_line(
        &self,
        s: &mut Snap,
        l: NewEstimateLine,
    ) -> Result<EstimateLineId, StorageError> {
        self.inner.insert_estimate_line(s, l)
    }
    fn link_unassigned_estimate_lines(
        &self,
        s: &mut Snap,
        id: ProjectId,
    ) -> Result<usize, StorageError> {
        self.inner.link_unassigned_estimate_lines(s, id)
    }
    fn list_estimate_lines_for_update(
        &self,
        s: &mut Snap,
        id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError> {
        self.inner.list_estimate_lines_for_update(s, id)
    }
    fn get_estimate_line_for_update(
        &self,
        s: &mut Snap,
        id: EstimateLineId,
    ) -> Result<EstimateLineRecord, StorageError> {
        self.inner.get_estimate_line_for_update(s, id)
    }
    fn list_breakdown_elements_for_update(
        &self,
        s: &mut Snap,
        id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError> {
        self.inner.list_breakdown_elements_for_update(s, id)
    }
    fn delete_breakdown_elements(
        &self,
        s: &mut Snap,
        id: ProjectId,
    ) -> Result<usize, StorageError> {
        self.inner.delete_breakdown_elements(s, id)
    }
    fn insert_breakdown_element(
        &self,
        s: &mut Snap,
        e: NewBreakdownElement,
    ) -> Result<ElementId, StorageError> {
        self.tick()?;
        self.inner.insert_breakdown_element(s, e)
    }
    fn delete_budget_lines(&self, s: &mut Snap, id: ProjectId) -> Result<usize, StorageError> {
        self.inner.delete_budget_lines(s, id)
    }
    fn insert_budget_line(
        &self,
        s: &mut Snap,
        l: NewBudgetLine,
    ) -> Result<BudgetLineId, StorageError> {
        self.tick()?;
        self.inner.insert_budget_line(s, l)
    }
    fn delete_resource_details(&self, s: &mut Snap, id: ElementId) -> Result<usize, StorageError> {
        self.inner.delete_resource_details(s, id)
    }
    fn insert_resource_detail(
        &self,
        s: &mut Snap,
        d: NewResourceDetail,
    ) -> Result<ResourceDetailId, StorageError> {
        self.tick()?;
        self.inner.insert_resource_detail(s, d)
    }
    fn insert_actual_cost(
        &self,
        s: &mut Snap,
        c: NewActualCost,
    ) -> Result<ActualCostId, StorageError> {
        self.inner.insert_actual_cost(s, c)
    }
    fn insert_progress_update(
        &self,
        s: &mut Snap,
        u: NewProgressUpdate,
    ) -> Result<ProgressUpdateId, StorageError> {
        self.inner.insert_progress_update(s, u)
    }
    fn get_project(&self, id: ProjectId) -> Result<ProjectRecord, StorageError> {
        self.inner.get_project(id)
    }
    fn list_projects(&self) -> Result<Vec<ProjectRecord>, StorageError> {
        self.inner.list_projects()
    }
    fn list_estimate_lines(&self, id: ProjectId) -> Result<Vec<EstimateLineRecord>, StorageError> {
        self.inner.list_estimate_lines(id)
    }
    fn get_breakdown_element(&self, id: ElementId) -> Result<BreakdownElementRecord, StorageError> {
        self.inner.get_breakdown_element(id)
    }
    fn list_breakdown_elements(
        &self,
        id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError> {
        self.inner.list_breakdown_elements(id)
    }
    fn list_budget_lines(&self, id: ProjectId) -> Result<Vec<BudgetLineRecord>, StorageError> {
        self.inner.list_budget_lines(id)
    }
    fn list_resource_details(
        &self,
        id: ProjectId,
    ) -> Result<Vec<ResourceDetailRecord>, StorageError> {
        self.inner.list_resource_details(id)
    }
    fn list_actual_costs(&self, id: ProjectId) -> Result<Vec<ActualCostRecord>, StorageError> {
        self.inner.list_actual_costs(id)
    }
    fn list_progress_updates(
        &self,
        id: ProjectId,
    ) -> Result<Vec<ProgressUpdateRecord>, StorageError> {
        self.inner.list_progress_updates(id)
    }
}

fn line(code: &str, total: f64) -> NewEstimateLine {
    NewEstimateLine {
        project_id: None,
        cost_code: code.to_string(),
        description: format!("work {code}"),
        quantity: 1.0,
        unit: "LS".to_string(),
        unit_cost: total,
        total_cost: total,
        phase: None,
    }
}

#[derive(Debug, PartialEq)]
struct Derived {
    project: ProjectRecord,
    elements: Vec<BreakdownElementRecord>,
    budget: Vec<BudgetLineRecord>,
    resources: Vec<ResourceDetailRecord>,
}

fn derived(store: &FailingStore, id: ProjectId) -> Derived {
    Derived {
        project: store.get_project(id).unwrap(),
        elements: store.list_breakdown_elements(id).unwrap(),
        budget: store.list_budget_lines(id).unwrap(),
        resources: store.list_resource_details(id).unwrap(),
    }
}

#[test]
fn failed_regeneration_leaves_store_unchanged() {
    let engine = BaselineEngine::new(FailingStore::new());
    let id = engine
        .create_project(ProjectInput {
            name: "Atomic".into(),
            start_date: None,
            end_date: None,
            status: None,
        })
        .unwrap()
        .value;
    engine
        .import_estimates(Some(id), vec![line("A", 100.0), line("B", 200.0)])
        .unwrap();
    engine.regenerate_baseline(id).unwrap();
    engine
        .import_estimates(Some(id), vec![line("C", 300.0), line("A", 50.0)])
        .unwrap();
    let before = derived(engine.store(), id);

    // 3 elements + 1 aggregate cost + 3 budget lines + 3 resources.
    let writes = 10;
    for n in 0..writes {
        engine.store().fail_after(n);
        let err = engine.regenerate_baseline(id).unwrap_err();
        assert!(
            matches!(err, EngineError::TransactionFailure { .. }),
            "failure after {n} writes gave {err:?}"
        );
        engine.store().disarm();
        assert_eq!(derived(engine.store(), id), before, "failure after {n} writes");
    }

    engine.store().fail_after(writes);
    engine.regenerate_baseline(id).unwrap();
    engine.store().disarm();
    let after = derived(engine.store(), id);
    assert_eq!(after.elements.len(), 3);
    assert_eq!(after.project.estimated_cost, 650.0);
}

#[test]
fn failed_budget_generation_keeps_previous_budget() {
    let engine = BaselineEngine::new(FailingStore::new());
    let id = engine
        .create_project(ProjectInput {
            name: "Budget".into(),
            start_date: None,
            end_date: None,
            status: None,
        })
        .unwrap()
        .value;
    engine
        .import_estimates(Some(id), vec![line("A", 100.0), line("B", 200.0)])
        .unwrap();
    engine.regenerate_baseline(id).unwrap();
    let before = engine.store().list_budget_lines(id).unwrap();

    engine.store().fail_after(1);
    let err = engine.generate_budget(id).unwrap_err();
    engine.store().disarm();

    assert!(err.to_string().contains("rolled back"));
    assert_eq!(engine.store().list_budget_lines(id).unwrap(), before);
}
