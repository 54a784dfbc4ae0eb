use crate::error::StorageError;
use crate::record::{
    ActualCostId, ActualCostRecord, BreakdownElementRecord, BudgetLineId, BudgetLineRecord,
    ElementId, EstimateLineId, EstimateLineRecord, NewActualCost, NewBreakdownElement,
    NewBudgetLine, NewEstimateLine, NewProgressUpdate, NewProject, NewResourceDetail,
    ProgressUpdateId, ProgressUpdateRecord, ProjectId, ProjectRecord, ProjectStatus,
    ResourceDetailId, ResourceDetailRecord,
};

/// The storage trait for Keystone baseline backends.
///
/// A `BaselineStore` provides transactional storage for projects, estimate
/// lines, the derived baseline (breakdown elements, budget lines, resource
/// details) and the append-only execution facts (actual costs, progress
/// updates).
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot`
/// 2. Call mutating and `*_for_update` methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: commit and consume the transaction
///    OR `abort_snapshot(snapshot)`: roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, its writes MUST be
/// discarded.
///
/// Reads that take a snapshot observe that snapshot's own uncommitted
/// writes. Reads without a snapshot observe committed state only.
///
/// ## Identifiers
///
/// Identifiers are never reused within a table, including after deletion.
/// `insert_breakdown_element` honors an explicit `id` so regeneration can
/// keep an element's identity stable across a delete-then-insert cycle.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so one handle can be
/// shared by every component of the engine.
pub trait BaselineStore: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Projects (within snapshot) ────────────────────────────────────────────

    fn insert_project(
        &self,
        snapshot: &mut Self::Snapshot,
        project: NewProject,
    ) -> Result<ProjectId, StorageError>;

    /// Read a project inside the snapshot.
    ///
    /// Returns `Err(StorageError::ProjectNotFound)` if the project does not exist.
    fn get_project_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
    ) -> Result<ProjectRecord, StorageError>;

    fn update_project_status(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), StorageError>;

    /// Overwrite the project's aggregate estimated cost.
    fn set_project_estimated_cost(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
        estimated_cost: f64,
    ) -> Result<(), StorageError>;

    // ── Estimate lines (within snapshot) ──────────────────────────────────────

    fn insert_estimate_line(
        &self,
        snapshot: &mut Self::Snapshot,
        line: NewEstimateLine,
    ) -> Result<EstimateLineId, StorageError>;

    /// Assign every estimate line that has no project to `project_id`.
    ///
    /// Lines already linked to any project are left untouched. Returns the
    /// number of lines linked by this call.
    fn link_unassigned_estimate_lines(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError>;

    /// List a project's estimate lines in ascending identifier order.
    fn list_estimate_lines_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError>;

    /// Returns `Err(StorageError::EstimateLineNotFound)` if the line does not exist.
    fn get_estimate_line_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        line_id: EstimateLineId,
    ) -> Result<EstimateLineRecord, StorageError>;

    // ── Derived baseline (within snapshot) ────────────────────────────────────

    /// List a project's breakdown elements in ascending identifier order.
    fn list_breakdown_elements_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError>;

    /// Delete every breakdown element of the project. Returns the count deleted.
    fn delete_breakdown_elements(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError>;

    /// Insert a breakdown element.
    ///
    /// Returns `Err(StorageError::DuplicateCode)` if the project already has an
    /// element with the same code, and `Err(StorageError::DuplicateElementId)`
    /// if an explicit `id` is already taken.
    fn insert_breakdown_element(
        &self,
        snapshot: &mut Self::Snapshot,
        element: NewBreakdownElement,
    ) -> Result<ElementId, StorageError>;

    /// Delete every budget line of the project. Returns the count deleted.
    fn delete_budget_lines(
        &self,
        snapshot: &mut Self::Snapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError>;

    fn insert_budget_line(
        &self,
        snapshot: &mut Self::Snapshot,
        line: NewBudgetLine,
    ) -> Result<BudgetLineId, StorageError>;

    /// Delete every resource detail attached to the element. Returns the count deleted.
    fn delete_resource_details(
        &self,
        snapshot: &mut Self::Snapshot,
        element_id: ElementId,
    ) -> Result<usize, StorageError>;

    fn insert_resource_detail(
        &self,
        snapshot: &mut Self::Snapshot,
        detail: NewResourceDetail,
    ) -> Result<ResourceDetailId, StorageError>;

    // ── Execution facts (within snapshot, append-only) ────────────────────────

    fn insert_actual_cost(
        &self,
        snapshot: &mut Self::Snapshot,
        cost: NewActualCost,
    ) -> Result<ActualCostId, StorageError>;

    fn insert_progress_update(
        &self,
        snapshot: &mut Self::Snapshot,
        update: NewProgressUpdate,
    ) -> Result<ProgressUpdateId, StorageError>;

    // ── Query operations (committed state) ────────────────────────────────────

    /// Returns `Err(StorageError::ProjectNotFound)` if the project does not exist.
    fn get_project(&self, project_id: ProjectId) -> Result<ProjectRecord, StorageError>;

    fn list_projects(&self) -> Result<Vec<ProjectRecord>, StorageError>;

    fn list_estimate_lines(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError>;

    /// Returns `Err(StorageError::ElementNotFound)` if the element does not exist.
    fn get_breakdown_element(
        &self,
        element_id: ElementId,
    ) -> Result<BreakdownElementRecord, StorageError>;

    fn list_breakdown_elements(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError>;

    fn list_budget_lines(&self, project_id: ProjectId)
        -> Result<Vec<BudgetLineRecord>, StorageError>;

    /// Resource details attached to the project's current breakdown elements.
    fn list_resource_details(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ResourceDetailRecord>, StorageError>;

    fn list_actual_costs(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ActualCostRecord>, StorageError>;

    fn list_progress_updates(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProgressUpdateRecord>, StorageError>;
}
