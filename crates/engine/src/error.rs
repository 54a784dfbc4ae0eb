use keystone_storage::StorageError;

/// Errors returned by engine operations.
///
/// Every variant carries a human-readable message through `Display`; callers
/// never need to inspect the source chain to explain a failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The project, element or estimate line does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Upstream derived data is missing (e.g. budget without breakdown).
    #[error("{0}")]
    PreconditionFailed(String),

    /// A write inside an operation failed; nothing it did was kept.
    #[error("{operation} failed and was rolled back: {source}")]
    TransactionFailure {
        operation: &'static str,
        source: StorageError,
    },

    /// Caller-supplied values were rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A read outside any transaction failed, or engine state is unusable.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl EngineError {
    /// Stable machine-readable name for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::PreconditionFailed(_) => "precondition_failed",
            EngineError::TransactionFailure { .. } => "transaction_failure",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ProjectNotFound { project_id } => EngineError::NotFound {
                entity: "project",
                id: project_id,
            },
            StorageError::ElementNotFound { element_id } => EngineError::NotFound {
                entity: "breakdown element",
                id: element_id,
            },
            StorageError::EstimateLineNotFound { line_id } => EngineError::NotFound {
                entity: "estimate line",
                id: line_id,
            },
            other => EngineError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_become_not_found() {
        let err = EngineError::from(StorageError::ProjectNotFound { project_id: 9 });
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "project 9 not found");
    }

    #[test]
    fn backend_errors_stay_storage() {
        let err = EngineError::from(StorageError::Backend("disk full".into()));
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("disk full"));
    }
}
