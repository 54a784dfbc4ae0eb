use std::cell::RefCell;

use keystone_sqlite::{SqliteStore, SQLITE_SCHEMA_VERSION};
use keystone_storage::conformance::{run_conformance_suite, CheckGroup};
use keystone_storage::{BaselineStore, NewProject, ProjectStatus};
use tempfile::TempDir;

fn new_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        start_date: None,
        end_date: None,
        duration_days: None,
        status: ProjectStatus::Planning,
    }
}

#[test]
fn sqlite_store_passes_conformance() {
    // Each store gets its own database file; the directories must outlive the run.
    let dirs: RefCell<Vec<TempDir>> = RefCell::new(Vec::new());
    let report = run_conformance_suite(|| {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("keystone.db")).expect("open store");
        dirs.borrow_mut().push(dir);
        store
    });
    assert!(report.is_conformant(), "{report}");
    assert!(report.count_in(CheckGroup::Regeneration) > 0);
}

#[test]
fn committed_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystone.db");

    let id = {
        let store = SqliteStore::open(&path).unwrap();
        let mut snap = store.begin_snapshot().unwrap();
        let id = store.insert_project(&mut snap, new_project("Harbor Bridge")).unwrap();
        store.commit_snapshot(snap).unwrap();
        id
    };

    let reopened = SqliteStore::open(&path).unwrap();
    let project = reopened.get_project(id).unwrap();
    assert_eq!(project.name, "Harbor Bridge");
    assert_eq!(project.status, ProjectStatus::Planning);
}

#[test]
fn dropped_snapshot_leaves_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("keystone.db")).unwrap();
    {
        let mut snap = store.begin_snapshot().unwrap();
        store.insert_project(&mut snap, new_project("Abandoned")).unwrap();
    }
    assert!(store.list_projects().unwrap().is_empty());

    // The write lock was released by the rollback.
    let mut snap = store.begin_snapshot().unwrap();
    store.insert_project(&mut snap, new_project("Kept")).unwrap();
    store.commit_snapshot(snap).unwrap();
    assert_eq!(store.list_projects().unwrap().len(), 1);
}

#[test]
fn schema_version_is_stamped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystone.db");
    SqliteStore::open(&path).unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, SQLITE_SCHEMA_VERSION);
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystone.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(&format!("PRAGMA user_version={};", SQLITE_SCHEMA_VERSION + 1))
            .unwrap();
    }
    let err = SqliteStore::open(&path).unwrap_err();
    assert!(err.to_string().contains("newer"), "{err}");
}
