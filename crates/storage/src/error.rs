/// All errors that can be returned by a BaselineStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No project row with the given identifier.
    #[error("project not found: {project_id}")]
    ProjectNotFound { project_id: i64 },

    /// No breakdown element row with the given identifier.
    #[error("breakdown element not found: {element_id}")]
    ElementNotFound { element_id: i64 },

    /// No estimate line row with the given identifier.
    #[error("estimate line not found: {line_id}")]
    EstimateLineNotFound { line_id: i64 },

    /// A breakdown element with this code already exists in the project.
    #[error("duplicate breakdown code '{code}' in project {project_id}")]
    DuplicateCode { project_id: i64, code: String },

    /// An explicit element identifier collided with an existing row.
    #[error("breakdown element id {element_id} already in use")]
    DuplicateElementId { element_id: i64 },

    /// Another snapshot held the write lock for longer than the backend is
    /// willing to wait.
    #[error("timed out after {waited_ms} ms waiting for the write lock")]
    WriteLockTimeout { waited_ms: u64 },

    /// A persisted value could not be decoded into its domain type.
    #[error("invalid stored value for {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    /// A backend-specific storage error (DB connection, I/O, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
