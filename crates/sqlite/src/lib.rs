//! SQLite implementation of [`BaselineStore`].
//!
//! Each snapshot owns a dedicated connection holding an `IMMEDIATE`
//! transaction, so writers are serialized by the database write lock while
//! committed-state queries keep reading through a separate connection. The
//! database runs in WAL mode, which lets those reads proceed while a
//! snapshot is open and keeps uncommitted rows invisible to them.

mod codec;
mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use keystone_storage::{
    ActualCostId, ActualCostRecord, BaselineStore, BreakdownElementRecord, BudgetLineId,
    BudgetLineRecord, ElementId, EstimateLineId, EstimateLineRecord, NewActualCost,
    NewBreakdownElement, NewBudgetLine, NewEstimateLine, NewProgressUpdate, NewProject,
    NewResourceDetail, ProgressUpdateId, ProgressUpdateRecord, ProjectId, ProjectRecord,
    ProjectStatus, ResourceDetailId, ResourceDetailRecord, StorageError,
};

use codec::{
    date_col, encode_date, encode_opt_date, encode_timestamp, enum_col, opt_date_col, sql_err,
    timestamp_col,
};
pub use schema::SQLITE_SCHEMA_VERSION;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PROJECT_COLUMNS: &str =
    "id, name, start_date, end_date, duration_days, status, estimated_cost";
const ESTIMATE_COLUMNS: &str =
    "id, project_id, cost_code, description, quantity, unit, unit_cost, total_cost, phase";
const ELEMENT_COLUMNS: &str =
    "id, project_id, code, description, estimated_cost, status, start_date, end_date, estimate_line_id";

/// A baseline store persisted in a single SQLite database file.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    reader: Mutex<Connection>,
}

/// An open `BEGIN IMMEDIATE` transaction on its own connection.
///
/// Dropping it without commit rolls the transaction back.
#[derive(Debug)]
pub struct SqliteSnapshot {
    conn: Connection,
    open: bool,
}

impl Drop for SqliteSnapshot {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback of dropped snapshot failed");
            }
        }
    }
}

fn connect(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path).map_err(sql_err)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(sql_err)?;
    // Bundled SQLite enforces foreign keys by default. Regeneration deletes
    // elements that budget lines and execution facts still reference.
    conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=OFF;")
        .map_err(sql_err)?;
    Ok(conn)
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = connect(&path)?;
        schema::migrate(&conn)?;
        tracing::debug!(path = %path.display(), "sqlite store opened");
        Ok(Self {
            path,
            reader: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Backend("sqlite reader lock poisoned".to_string()))
    }
}

// ── Row decoding ─────────────────────────────────────────────────────────────

fn project_row(row: &Row<'_>) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: opt_date_col(row, 2, "projects.start_date")?,
        end_date: opt_date_col(row, 3, "projects.end_date")?,
        duration_days: row.get(4)?,
        status: enum_col(row, 5, "projects.status")?,
        estimated_cost: row.get(6)?,
    })
}

fn estimate_row(row: &Row<'_>) -> rusqlite::Result<EstimateLineRecord> {
    Ok(EstimateLineRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        cost_code: row.get(2)?,
        description: row.get(3)?,
        quantity: row.get(4)?,
        unit: row.get(5)?,
        unit_cost: row.get(6)?,
        total_cost: row.get(7)?,
        phase: row.get(8)?,
    })
}

fn element_row(row: &Row<'_>) -> rusqlite::Result<BreakdownElementRecord> {
    Ok(BreakdownElementRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        estimated_cost: row.get(4)?,
        status: enum_col(row, 5, "breakdown_elements.status")?,
        start_date: opt_date_col(row, 6, "breakdown_elements.start_date")?,
        end_date: opt_date_col(row, 7, "breakdown_elements.end_date")?,
        estimate_line_id: row.get(8)?,
    })
}

// ── Shared queries (usable on reader or snapshot connection) ─────────────────

fn fetch_project(conn: &Connection, project_id: ProjectId) -> Result<ProjectRecord, StorageError> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
        params![project_id],
        project_row,
    )
    .optional()
    .map_err(sql_err)?
    .ok_or(StorageError::ProjectNotFound { project_id })
}

fn fetch_estimate_lines(
    conn: &Connection,
    project_id: ProjectId,
) -> Result<Vec<EstimateLineRecord>, StorageError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ESTIMATE_COLUMNS} FROM estimate_lines WHERE project_id = ?1 ORDER BY id"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![project_id], estimate_row)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

fn fetch_elements(
    conn: &Connection,
    project_id: ProjectId,
) -> Result<Vec<BreakdownElementRecord>, StorageError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ELEMENT_COLUMNS} FROM breakdown_elements WHERE project_id = ?1 ORDER BY id"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![project_id], element_row)
        .map_err(sql_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
}

fn row_exists(conn: &Connection, sql: &str, id: i64) -> Result<bool, StorageError> {
    conn.query_row(sql, params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(sql_err)
}

fn require_project(conn: &Connection, project_id: ProjectId) -> Result<(), StorageError> {
    if row_exists(conn, "SELECT 1 FROM projects WHERE id = ?1", project_id)? {
        Ok(())
    } else {
        Err(StorageError::ProjectNotFound { project_id })
    }
}

fn require_element(conn: &Connection, element_id: ElementId) -> Result<(), StorageError> {
    if row_exists(conn, "SELECT 1 FROM breakdown_elements WHERE id = ?1", element_id)? {
        Ok(())
    } else {
        Err(StorageError::ElementNotFound { element_id })
    }
}

impl BaselineStore for SqliteStore {
    type Snapshot = SqliteSnapshot;

    fn begin_snapshot(&self) -> Result<SqliteSnapshot, StorageError> {
        let conn = connect(&self.path)?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if failure.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StorageError::WriteLockTimeout {
                    waited_ms: u64::try_from(BUSY_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
                }
            }
            other => sql_err(other),
        })?;
        Ok(SqliteSnapshot { conn, open: true })
    }

    fn commit_snapshot(&self, mut snapshot: SqliteSnapshot) -> Result<(), StorageError> {
        snapshot.conn.execute_batch("COMMIT").map_err(sql_err)?;
        snapshot.open = false;
        Ok(())
    }

    fn abort_snapshot(&self, mut snapshot: SqliteSnapshot) -> Result<(), StorageError> {
        snapshot.conn.execute_batch("ROLLBACK").map_err(sql_err)?;
        snapshot.open = false;
        Ok(())
    }

    fn insert_project(
        &self,
        snapshot: &mut SqliteSnapshot,
        project: NewProject,
    ) -> Result<ProjectId, StorageError> {
        snapshot
            .conn
            .execute(
                "INSERT INTO projects (name, start_date, end_date, duration_days, status, estimated_cost)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![
                    project.name,
                    encode_opt_date(project.start_date)?,
                    encode_opt_date(project.end_date)?,
                    project.duration_days,
                    project.status.as_str(),
                ],
            )
            .map_err(sql_err)?;
        Ok(snapshot.conn.last_insert_rowid())
    }

    fn get_project_for_update(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
    ) -> Result<ProjectRecord, StorageError> {
        fetch_project(&snapshot.conn, project_id)
    }

    fn update_project_status(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), StorageError> {
        let changed = snapshot
            .conn
            .execute(
                "UPDATE projects SET status = ?1 WHERE id = ?2",
                params![status.as_str(), project_id],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(StorageError::ProjectNotFound { project_id });
        }
        Ok(())
    }

    fn set_project_estimated_cost(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
        estimated_cost: f64,
    ) -> Result<(), StorageError> {
        let changed = snapshot
            .conn
            .execute(
                "UPDATE projects SET estimated_cost = ?1 WHERE id = ?2",
                params![estimated_cost, project_id],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(StorageError::ProjectNotFound { project_id });
        }
        Ok(())
    }

    fn insert_estimate_line(
        &self,
        snapshot: &mut SqliteSnapshot,
        line: NewEstimateLine,
    ) -> Result<EstimateLineId, StorageError> {
        if let Some(project_id) = line.project_id {
            require_project(&snapshot.conn, project_id)?;
        }
        snapshot
            .conn
            .execute(
                "INSERT INTO estimate_lines
                   (project_id, cost_code, description, quantity, unit, unit_cost, total_cost, phase)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    line.project_id,
                    line.cost_code,
                    line.description,
                    line.quantity,
                    line.unit,
                    line.unit_cost,
                    line.total_cost,
                    line.phase,
                ],
            )
            .map_err(sql_err)?;
        Ok(snapshot.conn.last_insert_rowid())
    }

    fn link_unassigned_estimate_lines(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError> {
        require_project(&snapshot.conn, project_id)?;
        snapshot
            .conn
            .execute(
                "UPDATE estimate_lines SET project_id = ?1 WHERE project_id IS NULL",
                params![project_id],
            )
            .map_err(sql_err)
    }

    fn list_estimate_lines_for_update(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError> {
        fetch_estimate_lines(&snapshot.conn, project_id)
    }

    fn get_estimate_line_for_update(
        &self,
        snapshot: &mut SqliteSnapshot,
        line_id: EstimateLineId,
    ) -> Result<EstimateLineRecord, StorageError> {
        snapshot
            .conn
            .query_row(
                &format!("SELECT {ESTIMATE_COLUMNS} FROM estimate_lines WHERE id = ?1"),
                params![line_id],
                estimate_row,
            )
            .optional()
            .map_err(sql_err)?
            .ok_or(StorageError::EstimateLineNotFound { line_id })
    }

    fn list_breakdown_elements_for_update(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError> {
        fetch_elements(&snapshot.conn, project_id)
    }

    fn delete_breakdown_elements(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError> {
        snapshot
            .conn
            .execute(
                "DELETE FROM breakdown_elements WHERE project_id = ?1",
                params![project_id],
            )
            .map_err(sql_err)
    }

    fn insert_breakdown_element(
        &self,
        snapshot: &mut SqliteSnapshot,
        element: NewBreakdownElement,
    ) -> Result<ElementId, StorageError> {
        let conn = &snapshot.conn;
        require_project(conn, element.project_id)?;
        let code_taken = conn
            .query_row(
                "SELECT 1 FROM breakdown_elements WHERE project_id = ?1 AND code = ?2",
                params![element.project_id, element.code],
                |_| Ok(()),
            )
            .optional()
            .map_err(sql_err)?
            .is_some();
        if code_taken {
            return Err(StorageError::DuplicateCode {
                project_id: element.project_id,
                code: element.code,
            });
        }
        if let Some(id) = element.id {
            if row_exists(conn, "SELECT 1 FROM breakdown_elements WHERE id = ?1", id)? {
                return Err(StorageError::DuplicateElementId { element_id: id });
            }
        }
        conn.execute(
            "INSERT INTO breakdown_elements
               (id, project_id, code, description, estimated_cost, status, start_date, end_date, estimate_line_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                element.id,
                element.project_id,
                element.code,
                element.description,
                element.estimated_cost,
                element.status.as_str(),
                encode_opt_date(element.start_date)?,
                encode_opt_date(element.end_date)?,
                element.estimate_line_id,
            ],
        )
        .map_err(sql_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_budget_lines(
        &self,
        snapshot: &mut SqliteSnapshot,
        project_id: ProjectId,
    ) -> Result<usize, StorageError> {
        snapshot
            .conn
            .execute(
                "DELETE FROM budget_lines WHERE project_id = ?1",
                params![project_id],
            )
            .map_err(sql_err)
    }

    fn insert_budget_line(
        &self,
        snapshot: &mut SqliteSnapshot,
        line: NewBudgetLine,
    ) -> Result<BudgetLineId, StorageError> {
        require_element(&snapshot.conn, line.element_id)?;
        snapshot
            .conn
            .execute(
                "INSERT INTO budget_lines (project_id, element_id, category, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                params![line.project_id, line.element_id, line.category, line.amount],
            )
            .map_err(sql_err)?;
        Ok(snapshot.conn.last_insert_rowid())
    }

    fn delete_resource_details(
        &self,
        snapshot: &mut SqliteSnapshot,
        element_id: ElementId,
    ) -> Result<usize, StorageError> {
        snapshot
            .conn
            .execute(
                "DELETE FROM resource_details WHERE element_id = ?1",
                params![element_id],
            )
            .map_err(sql_err)
    }

    fn insert_resource_detail(
        &self,
        snapshot: &mut SqliteSnapshot,
        detail: NewResourceDetail,
    ) -> Result<ResourceDetailId, StorageError> {
        require_element(&snapshot.conn, detail.element_id)?;
        snapshot
            .conn
            .execute(
                "INSERT INTO resource_details
                   (element_id, description, resource_type, quantity, unit, unit_cost, total_cost)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    detail.element_id,
                    detail.description,
                    detail.resource_type.as_str(),
                    detail.quantity,
                    detail.unit,
                    detail.unit_cost,
                    detail.total_cost,
                ],
            )
            .map_err(sql_err)?;
        Ok(snapshot.conn.last_insert_rowid())
    }

    fn insert_actual_cost(
        &self,
        snapshot: &mut SqliteSnapshot,
        cost: NewActualCost,
    ) -> Result<ActualCostId, StorageError> {
        require_project(&snapshot.conn, cost.project_id)?;
        snapshot
            .conn
            .execute(
                "INSERT INTO actual_costs
                   (project_id, element_id, category, description, amount, transaction_date, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    cost.project_id,
                    cost.element_id,
                    cost.category,
                    cost.description,
                    cost.amount,
                    encode_date(cost.transaction_date)?,
                    encode_timestamp(cost.recorded_at)?,
                ],
            )
            .map_err(sql_err)?;
        Ok(snapshot.conn.last_insert_rowid())
    }

    fn insert_progress_update(
        &self,
        snapshot: &mut SqliteSnapshot,
        update: NewProgressUpdate,
    ) -> Result<ProgressUpdateId, StorageError> {
        require_project(&snapshot.conn, update.project_id)?;
        snapshot
            .conn
            .execute(
                "INSERT INTO progress_updates
                   (project_id, element_id, percent_complete, update_date, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    update.project_id,
                    update.element_id,
                    update.percent_complete,
                    encode_date(update.update_date)?,
                    update.notes,
                ],
            )
            .map_err(sql_err)?;
        Ok(snapshot.conn.last_insert_rowid())
    }

    fn get_project(&self, project_id: ProjectId) -> Result<ProjectRecord, StorageError> {
        fetch_project(&*self.reader()?, project_id)
    }

    fn list_projects(&self) -> Result<Vec<ProjectRecord>, StorageError> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"))
            .map_err(sql_err)?;
        let rows = stmt.query_map([], project_row).map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }

    fn list_estimate_lines(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<EstimateLineRecord>, StorageError> {
        fetch_estimate_lines(&*self.reader()?, project_id)
    }

    fn get_breakdown_element(
        &self,
        element_id: ElementId,
    ) -> Result<BreakdownElementRecord, StorageError> {
        self.reader()?
            .query_row(
                &format!("SELECT {ELEMENT_COLUMNS} FROM breakdown_elements WHERE id = ?1"),
                params![element_id],
                element_row,
            )
            .optional()
            .map_err(sql_err)?
            .ok_or(StorageError::ElementNotFound { element_id })
    }

    fn list_breakdown_elements(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<BreakdownElementRecord>, StorageError> {
        fetch_elements(&*self.reader()?, project_id)
    }

    fn list_budget_lines(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<BudgetLineRecord>, StorageError> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, element_id, category, amount
                 FROM budget_lines WHERE project_id = ?1 ORDER BY id",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(BudgetLineRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    element_id: row.get(2)?,
                    category: row.get(3)?,
                    amount: row.get(4)?,
                })
            })
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }

    fn list_resource_details(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ResourceDetailRecord>, StorageError> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.element_id, r.description, r.resource_type,
                        r.quantity, r.unit, r.unit_cost, r.total_cost
                 FROM resource_details r
                 JOIN breakdown_elements e ON e.id = r.element_id
                 WHERE e.project_id = ?1
                 ORDER BY r.id",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(ResourceDetailRecord {
                    id: row.get(0)?,
                    element_id: row.get(1)?,
                    description: row.get(2)?,
                    resource_type: enum_col(row, 3, "resource_details.resource_type")?,
                    quantity: row.get(4)?,
                    unit: row.get(5)?,
                    unit_cost: row.get(6)?,
                    total_cost: row.get(7)?,
                })
            })
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }

    fn list_actual_costs(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ActualCostRecord>, StorageError> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, element_id, category, description, amount,
                        transaction_date, recorded_at
                 FROM actual_costs WHERE project_id = ?1 ORDER BY id",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(ActualCostRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    element_id: row.get(2)?,
                    category: row.get(3)?,
                    description: row.get(4)?,
                    amount: row.get(5)?,
                    transaction_date: date_col(row, 6, "actual_costs.transaction_date")?,
                    recorded_at: timestamp_col(row, 7, "actual_costs.recorded_at")?,
                })
            })
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }

    fn list_progress_updates(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProgressUpdateRecord>, StorageError> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, element_id, percent_complete, update_date, notes
                 FROM progress_updates WHERE project_id = ?1 ORDER BY id",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(ProgressUpdateRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    element_id: row.get(2)?,
                    percent_complete: row.get(3)?,
                    update_date: date_col(row, 4, "progress_updates.update_date")?,
                    notes: row.get(5)?,
                })
            })
            .map_err(sql_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err)
    }
}
