use keystone_storage::BaselineStore;

use crate::error::EngineError;

/// Run `work` inside one snapshot: commit on `Ok`, roll back on `Err`.
///
/// Storage failures raised by `work` or by the commit itself surface as
/// `TransactionFailure`; domain errors (`NotFound`, `PreconditionFailed`,
/// `InvalidInput`) pass through unchanged after the rollback.
pub(crate) fn run_in_snapshot<S, T, F>(
    store: &S,
    operation: &'static str,
    work: F,
) -> Result<T, EngineError>
where
    S: BaselineStore,
    F: FnOnce(&mut S::Snapshot) -> Result<T, EngineError>,
{
    let mut snapshot = store
        .begin_snapshot()
        .map_err(|source| EngineError::TransactionFailure { operation, source })?;

    match work(&mut snapshot) {
        Ok(value) => {
            store
                .commit_snapshot(snapshot)
                .map_err(|source| {
                    tracing::warn!(operation, error = %source, "commit failed");
                    EngineError::TransactionFailure { operation, source }
                })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = store.abort_snapshot(snapshot) {
                tracing::warn!(operation, error = %abort_err, "abort failed");
            }
            Err(match err {
                EngineError::Storage(source) => {
                    tracing::warn!(operation, error = %source, "rolled back after storage failure");
                    EngineError::TransactionFailure { operation, source }
                }
                other => {
                    tracing::debug!(operation, error = %other, "rolled back");
                    other
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_storage::{MemoryStore, NewProject, ProjectStatus, StorageError};

    fn project(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            start_date: None,
            end_date: None,
            duration_days: None,
            status: ProjectStatus::Pending,
        }
    }

    #[test]
    fn ok_commits() {
        let store = MemoryStore::new();
        let id = run_in_snapshot(&store, "test", |snap| {
            Ok(store.insert_project(snap, project("a"))?)
        })
        .unwrap();
        assert!(store.get_project(id).is_ok());
    }

    #[test]
    fn err_rolls_back_and_keeps_domain_error() {
        let store = MemoryStore::new();
        let err = run_in_snapshot(&store, "test", |snap| {
            store.insert_project(snap, project("a"))?;
            Err::<(), _>(EngineError::PreconditionFailed("stop".into()))
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::PreconditionFailed(_)));
        assert!(store.list_projects().unwrap().is_empty());
    }

    #[test]
    fn storage_error_becomes_transaction_failure() {
        let store = MemoryStore::new();
        let err = run_in_snapshot(&store, "regenerate", |_snap| {
            Err::<(), _>(EngineError::from(StorageError::Backend("boom".into())))
        })
        .unwrap_err();
        match err {
            EngineError::TransactionFailure { operation, .. } => {
                assert_eq!(operation, "regenerate")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
