//! In-process `BaselineStore` backed by ordered maps.
//!
//! One snapshot at a time holds the write gate, from `begin_snapshot` until
//! it is committed, aborted or dropped. The snapshot works on a private copy
//! of the committed tables and commit swaps the copy in, so committed-state
//! queries never observe a half-applied snapshot.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::StorageError;
use crate::record::{
    ActualCostId, ActualCostRecord, BreakdownElementRecord, BudgetLineId, BudgetLineRecord,
    ElementId, EstimateLineId, EstimateLineRecord, NewActualCost, NewBreakdownElement,
    NewBudgetLine, NewEstimateLine, NewProgressUpdate, NewProject, NewResourceDetail,
    ProgressUpdateId, ProgressUpdateRecord, ProjectId, ProjectRecord, ProjectStatus,
    ResourceDetailId, ResourceDetailRecord,
};
use crate::traits::BaselineStore;

/// Last identifier handed out per table. Never decreases.
#[derive(Debug, Clone, Default)]
struct Sequences {
    project: i64,
    estimate_line: i64,
    element: i64,
    budget_line: i64,
    resource_detail: i64,
    actual_cost: i64,
    progress_update: i64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    seq: Sequences,
    projects: BTreeMap<ProjectId, ProjectRecord>,
    estimate_lines: BTreeMap<EstimateLineId, EstimateLineRecord>,
    elements: BTreeMap<ElementId, BreakdownElementRecord>,
    budget_lines: BTreeMap<BudgetLineId, BudgetLineRecord>,
    resource_details: BTreeMap<ResourceDetailId, ResourceDetailRecord>,
    actual_costs: BTreeMap<ActualCostId, ActualCostRecord>,
    progress_updates: BTreeMap<ProgressUpdateId, ProgressUpdateRecord>,
}

/// How long `begin_snapshot` waits for the write gate before giving up.
const WRITE_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct WriteGate {
    busy: Mutex<bool>,
    released: Condvar,
}

impl WriteGate {
    fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<WritePermit, StorageError> {
        let busy = self.busy.lock().map_err(|_| gate_poisoned())?;
        let (mut busy, wait) = self
            .released
            .wait_timeout_while(busy, timeout, |busy| *busy)
            .map_err(|_| gate_poisoned())?;
        if wait.timed_out() {
            return Err(StorageError::WriteLockTimeout {
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        *busy = true;
        Ok(WritePermit {
            gate: Arc::clone(self),
        })
    }
}

fn gate_poisoned() -> StorageError {
    StorageError::Backend("memory store write gate poisoned".to_string())
}

/// Ownership of the write gate. Released on drop.
#[derive(Debug)]
struct WritePermit {
    gate: Arc<WriteGate>,
}

impl Drop for WritePermit {
    fn drop(&mut self) {
        let mut busy = match self.gate.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *busy = false;
        self.gate.released.notify_one();
    }
}

/// An open transaction against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySnapshot {
    dirty: bool,
    tables: Tables,
    _permit: WritePermit,
}

impl MemorySnapshot {
    fn write(&mut self) -> &mut Tables {
        self.dirty = true;
        &mut self.tables
    }
}

/// Thread-safe in-memory backend. Intended for tests and embedding.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<Tables>,
    gate: Arc<WriteGate>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            gate: Arc::default(),
            lock_timeout: WRITE_LOCK_TIMEOUT,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how long `begin_snapshot` waits for another writer.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn committed(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

fn project_mut(
    tables: &mut Tables,
    project_id: ProjectId,
) -> Result<&mut ProjectRecord, StorageError> {
    tables
        .projects
        .get_mut(&project_id)
        .ok_or(StorageError::ProjectNotFound { project_id })
}

fn estimate_lines_of(tables: &Tables, project_id: ProjectId) -> Vec<EstimateLineRecord> {
    tables
        .estimate_lines
        .values()
        .filter(|l| l.project_id == Some(project_id))
        .cloned()
        .collect()
}

fn elements_of(tables: &Tables, project_id: ProjectId) -> Vec<BreakdownElementRecord> {
    tables
        .elements
        .values()
        .filter(|e| e.project_id == project_id)
        .cloned()
        .collect()
}

impl BaselineStore for MemoryStore {
    type Snapshot = MemorySnapshot;

    fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        let permit = self.gate.acquire(self.lock_timeout).map_err(|e| {
            tracing::debug!(error = %e, "memory snapshot not started");
            e
        })?;
        let tables = self.committed()?.clone();
        Ok(MemorySnapshot {
            dirty: false,
            tables,
            _permit: permit,
        })
    }

    fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        if snapshot.dirty {
            *self.committed()? = snapshot.tables;
        }
        Ok(())
    }

    fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    fn insert_project(
        &self,
        snapshot: &mut MemorySnapshot,
        project: NewProject,
    ) -> Result<ProjectId, StorageError> {
        let t = snapshot.write();
        t.seq.project += 1;
        let id = t.seq.project;
        t.projects.insert(
            id,
            ProjectRecord {
                id,
                name: project.name,
                start_date: project.start_date,
                end_date: project.end_date,
                duration_days: project.duration_days,
                status: project.status,
                estimated_cost: 0.0,
            },
        );
        Ok(id)
    }

    fn get_project_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
    ) -> Result<ProjectRecord, StorageError> {
        snapshot
            .tables
            .projects
            .get(&project_id)
            .cloned()
            .ok_or(StorageError::ProjectNotFound { project_id })
    }

    fn update_project_status(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), StorageError> {
        project_mut(snapshot.write(), project_id)?.status = status;
        Ok(())
    }

    fn set_project_estimated_cost(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
        estimated_cost: f64,
    ) -> Result<(), StorageError> {
        project_mut(snapshot.write(), project_id)?.estimated_cost = estimated_cost;
        Ok(())
    }

    fn insert_estimate_line(
        &self,
        snapshot: &mut MemorySnapshot,
        line: NewEstimateLine,
    ) -> Result<EstimateLineId, StorageError> {
        let t = snapshot.write();
        if let Some(project_id) = line.project_id {
            if !t.projects.contains_key(&project_id) {
                return Err(StorageError::ProjectNotFound { project_id });
            }
        }
        t.seq.estimate_line += 1;
        let id = t.seq.estimate_line;
        t.estimate_lines.insert(
            id,
            EstimateLineRecord {
                id,
                project_id: line.project_id,
                cost_code: line.cost_code,
                description: line.description,
                quantity: line.quantity,
                unit: line.unit,
                unit_cost: line.unit_cost,
                total_cost: line.total_cost,
                phase: line.phase,
            },
        );
        Ok(id)
    }

    fn link_unassigned_estimate_lines(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError> {
        let t = snapshot.write();
        if !t.projects.contains_key(&project_id) {
            return Err(StorageError::ProjectNotFound { project_id });
        }
        let mut linked = 0;
        for line in t.estimate_lines.values_mut() {
            if line.project_id.is_none() {
                line.project_id = Some(project_id);
                linked += 1;
            }
        }
        Ok(linked)
    }

    fn list_estimate_lines_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError> {
        Ok(estimate_lines_of(&snapshot.tables, project_id))
    }

    fn get_estimate_line_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        line_id: EstimateLineId,
    ) -> Result<EstimateLineRecord, StorageError> {
        snapshot
            .tables
            .estimate_lines
            .get(&line_id)
            .cloned()
            .ok_or(StorageError::EstimateLineNotFound { line_id })
    }

    fn list_breakdown_elements_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError> {
        Ok(elements_of(&snapshot.tables, project_id))
    }

    fn delete_breakdown_elements(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError> {
        let t = snapshot.write();
        let before = t.elements.len();
        t.elements.retain(|_, e| e.project_id != project_id);
        Ok(before - t.elements.len())
    }

    fn insert_breakdown_element(
        &self,
        snapshot: &mut MemorySnapshot,
        element: NewBreakdownElement,
    ) -> Result<ElementId, StorageError> {
        let t = snapshot.write();
        if !t.projects.contains_key(&element.project_id) {
            return Err(StorageError::ProjectNotFound {
                project_id: element.project_id,
            });
        }
        if t
            .elements
            .values()
            .any(|e| e.project_id == element.project_id && e.code == element.code)
        {
            return Err(StorageError::DuplicateCode {
                project_id: element.project_id,
                code: element.code,
            });
        }
        let id = match element.id {
            Some(id) => {
                if t.elements.contains_key(&id) {
                    return Err(StorageError::DuplicateElementId { element_id: id });
                }
                t.seq.element = t.seq.element.max(id);
                id
            }
            None => {
                t.seq.element += 1;
                t.seq.element
            }
        };
        t.elements.insert(
            id,
            BreakdownElementRecord {
                id,
                project_id: element.project_id,
                code: element.code,
                description: element.description,
                estimated_cost: element.estimated_cost,
                status: element.status,
                start_date: element.start_date,
                end_date: element.end_date,
                estimate_line_id: element.estimate_line_id,
            },
        );
        Ok(id)
    }

    fn delete_budget_lines(
        &self,
        snapshot: &mut MemorySnapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError> {
        let t = snapshot.write();
        let before = t.budget_lines.len();
        t.budget_lines.retain(|_, b| b.project_id != project_id);
        Ok(before - t.budget_lines.len())
    }

    fn insert_budget_line(
        &self,
        snapshot: &mut MemorySnapshot,
        line: NewBudgetLine,
    ) -> Result<BudgetLineId, StorageError> {
        let t = snapshot.write();
        if !t.elements.contains_key(&line.element_id) {
            return Err(StorageError::ElementNotFound {
                element_id: line.element_id,
            });
        }
        t.seq.budget_line += 1;
        let id = t.seq.budget_line;
        t.budget_lines.insert(
            id,
            BudgetLineRecord {
                id,
                project_id: line.project_id,
                element_id: line.element_id,
                category: line.category,
                amount: line.amount,
            },
        );
        Ok(id)
    }

    fn delete_resource_details(
        &self,
        snapshot: &mut MemorySnapshot,
        element_id: ElementId,
    ) -> Result<usize, StorageError> {
        let t = snapshot.write();
        let before = t.resource_details.len();
        t.resource_details.retain(|_, r| r.element_id != element_id);
        Ok(before - t.resource_details.len())
    }

    fn insert_resource_detail(
        &self,
        snapshot: &mut MemorySnapshot,
        detail: NewResourceDetail,
    ) -> Result<ResourceDetailId, StorageError> {
        let t = snapshot.write();
        if !t.elements.contains_key(&detail.element_id) {
            return Err(StorageError::ElementNotFound {
                element_id: detail.element_id,
            });
        }
        t.seq.resource_detail += 1;
        let id = t.seq.resource_detail;
        t.resource_details.insert(
            id,
            ResourceDetailRecord {
                id,
                element_id: detail.element_id,
                description: detail.description,
                resource_type: detail.resource_type,
                quantity: detail.quantity,
                unit: detail.unit,
                unit_cost: detail.unit_cost,
                total_cost: detail.total_cost,
            },
        );
        Ok(id)
    }

    fn insert_actual_cost(
        &self,
        snapshot: &mut MemorySnapshot,
        cost: NewActualCost,
    ) -> Result<ActualCostId, StorageError> {
        let t = snapshot.write();
        if !t.projects.contains_key(&cost.project_id) {
            return Err(StorageError::ProjectNotFound {
                project_id: cost.project_id,
            });
        }
        t.seq.actual_cost += 1;
        let id = t.seq.actual_cost;
        t.actual_costs.insert(
            id,
            ActualCostRecord {
                id,
                project_id: cost.project_id,
                element_id: cost.element_id,
                category: cost.category,
                description: cost.description,
                amount: cost.amount,
                transaction_date: cost.transaction_date,
                recorded_at: cost.recorded_at,
            },
        );
        Ok(id)
    }

    fn insert_progress_update(
        &self,
        snapshot: &mut MemorySnapshot,
        update: NewProgressUpdate,
    ) -> Result<ProgressUpdateId, StorageError> {
        let t = snapshot.write();
        if !t.projects.contains_key(&update.project_id) {
            return Err(StorageError::ProjectNotFound {
                project_id: update.project_id,
            });
        }
        t.seq.progress_update += 1;
        let id = t.seq.progress_update;
        t.progress_updates.insert(
            id,
            ProgressUpdateRecord {
                id,
                project_id: update.project_id,
                element_id: update.element_id,
                percent_complete: update.percent_complete,
                update_date: update.update_date,
                notes: update.notes,
            },
        );
        Ok(id)
    }

    fn get_project(&self, project_id: ProjectId) -> Result<ProjectRecord, StorageError> {
        self.committed()?
            .projects
            .get(&project_id)
            .cloned()
            .ok_or(StorageError::ProjectNotFound { project_id })
    }

    fn list_projects(&self) -> Result<Vec<ProjectRecord>, StorageError> {
        Ok(self.committed()?.projects.values().cloned().collect())
    }

    fn list_estimate_lines(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError> {
        Ok(estimate_lines_of(&*self.committed()?, project_id))
    }

    fn get_breakdown_element(
        &self,
        element_id: ElementId,
    ) -> Result<BreakdownElementRecord, StorageError> {
        self.committed()?
            .elements
            .get(&element_id)
            .cloned()
            .ok_or(StorageError::ElementNotFound { element_id })
    }

    fn list_breakdown_elements(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError> {
        Ok(elements_of(&*self.committed()?, project_id))
    }

    fn list_budget_lines(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<BudgetLineRecord>, StorageError> {
        Ok(self
            .committed()?
            .budget_lines
            .values()
            .filter(|b| b.project_id == project_id)
            .cloned()
            .collect())
    }

    fn list_resource_details(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ResourceDetailRecord>, StorageError> {
        let committed = self.committed()?;
        let t = &*committed;
        Ok(t.resource_details
            .values()
            .filter(|r| {
                t.elements
                    .get(&r.element_id)
                    .is_some_and(|e| e.project_id == project_id)
            })
            .cloned()
            .collect())
    }

    fn list_actual_costs(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ActualCostRecord>, StorageError> {
        Ok(self
            .committed()?
            .actual_costs
            .values()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect())
    }

    fn list_progress_updates(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProgressUpdateRecord>, StorageError> {
        Ok(self
            .committed()?
            .progress_updates
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::{run_conformance_suite, CheckGroup};

    #[test]
    fn memory_store_passes_conformance() {
        let report = run_conformance_suite(MemoryStore::new);
        assert!(report.is_conformant(), "{report}");
        assert!(report.count_in(CheckGroup::Regeneration) > 0);
    }

    fn depot(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            start_date: None,
            end_date: None,
            duration_days: None,
            status: ProjectStatus::Pending,
        }
    }

    #[test]
    fn second_writer_waits_for_the_first() {
        let store = Arc::new(MemoryStore::new());
        let mut first = store.begin_snapshot().unwrap();
        let north = store.insert_project(&mut first, depot("North")).unwrap();

        let waiter = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut second = store.begin_snapshot().unwrap();
                let seen = store.get_project_for_update(&mut second, north).is_ok();
                store.insert_project(&mut second, depot("South")).unwrap();
                store.commit_snapshot(second).unwrap();
                seen
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        store.commit_snapshot(first).unwrap();

        // The second snapshot began after the first committed, so it saw North.
        assert!(waiter.join().unwrap());
        assert_eq!(store.list_projects().unwrap().len(), 2);
    }

    #[test]
    fn begin_times_out_while_another_snapshot_is_open() {
        let store = MemoryStore::new().with_lock_timeout(Duration::from_millis(20));
        let _held = store.begin_snapshot().unwrap();
        match store.begin_snapshot() {
            Err(StorageError::WriteLockTimeout { waited_ms }) => assert_eq!(waited_ms, 20),
            other => panic!("expected WriteLockTimeout, got {other:?}"),
        }
    }

    #[test]
    fn dropping_a_snapshot_releases_the_gate() {
        let store = MemoryStore::new().with_lock_timeout(Duration::from_millis(20));
        let mut snap = store.begin_snapshot().unwrap();
        store.insert_project(&mut snap, depot("Gone")).unwrap();
        drop(snap);

        let snap = store.begin_snapshot().unwrap();
        store.commit_snapshot(snap).unwrap();
        assert!(store.list_projects().unwrap().is_empty());
    }
}
