use rusqlite::Connection;

use crate::codec::sql_err;
use keystone_storage::StorageError;

pub const SQLITE_SCHEMA_VERSION: i64 = 1;

// Foreign keys are declared for documentation only. Every connection turns
// enforcement off (see `connect`): regeneration replaces breakdown elements
// while budget lines, resource details and execution facts keep pointing at
// them.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  start_date TEXT,
  end_date TEXT,
  duration_days INTEGER,
  status TEXT NOT NULL,
  estimated_cost REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS estimate_lines (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  project_id INTEGER REFERENCES projects(id),
  cost_code TEXT NOT NULL,
  description TEXT NOT NULL,
  quantity REAL NOT NULL,
  unit TEXT NOT NULL,
  unit_cost REAL NOT NULL,
  total_cost REAL NOT NULL,
  phase TEXT
);
CREATE INDEX IF NOT EXISTS idx_estimate_lines_project ON estimate_lines(project_id);

CREATE TABLE IF NOT EXISTS breakdown_elements (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  project_id INTEGER NOT NULL REFERENCES projects(id),
  code TEXT NOT NULL,
  description TEXT NOT NULL,
  estimated_cost REAL NOT NULL,
  status TEXT NOT NULL,
  start_date TEXT,
  end_date TEXT,
  estimate_line_id INTEGER REFERENCES estimate_lines(id),
  UNIQUE (project_id, code)
);

CREATE TABLE IF NOT EXISTS budget_lines (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  project_id INTEGER NOT NULL REFERENCES projects(id),
  element_id INTEGER NOT NULL REFERENCES breakdown_elements(id),
  category TEXT NOT NULL,
  amount REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_budget_lines_project ON budget_lines(project_id);

CREATE TABLE IF NOT EXISTS resource_details (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  element_id INTEGER NOT NULL REFERENCES breakdown_elements(id),
  description TEXT NOT NULL,
  resource_type TEXT NOT NULL,
  quantity REAL NOT NULL,
  unit TEXT NOT NULL,
  unit_cost REAL NOT NULL,
  total_cost REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resource_details_element ON resource_details(element_id);

CREATE TABLE IF NOT EXISTS actual_costs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  project_id INTEGER NOT NULL REFERENCES projects(id),
  element_id INTEGER REFERENCES breakdown_elements(id),
  category TEXT NOT NULL,
  description TEXT NOT NULL,
  amount REAL NOT NULL CHECK (amount > 0),
  transaction_date TEXT NOT NULL,
  recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_actual_costs_project ON actual_costs(project_id);

CREATE TABLE IF NOT EXISTS progress_updates (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  project_id INTEGER NOT NULL REFERENCES projects(id),
  element_id INTEGER NOT NULL REFERENCES breakdown_elements(id),
  percent_complete REAL NOT NULL CHECK (percent_complete >= 0 AND percent_complete <= 100),
  update_date TEXT NOT NULL,
  notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_progress_updates_project ON progress_updates(project_id);
";

/// Create missing tables and stamp the schema version.
///
/// Refuses to touch a database written by a newer schema.
pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let found: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(sql_err)?;
    if found > SQLITE_SCHEMA_VERSION {
        return Err(StorageError::Backend(format!(
            "database schema version {found} is newer than supported version {SQLITE_SCHEMA_VERSION}"
        )));
    }
    conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(sql_err)?;
    conn.execute_batch(SCHEMA).map_err(sql_err)?;
    conn.execute_batch(&format!("PRAGMA user_version={SQLITE_SCHEMA_VERSION};"))
        .map_err(sql_err)?;
    tracing::debug!(from = found, to = SQLITE_SCHEMA_VERSION, "sqlite schema migrated");
    Ok(())
}
