//! Storage contract for the Keystone baseline engine.
//!
//! Backends implement [`BaselineStore`]; the engine only ever talks to the
//! trait. [`MemoryStore`] ships here for tests and embedding, and
//! [`conformance`] lets any backend prove it honors the contract.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStore};
pub use record::{
    ActualCostId, ActualCostRecord, BreakdownElementRecord, BudgetLineId, BudgetLineRecord,
    ElementId, ElementStatus, EstimateLineId, EstimateLineRecord, NewActualCost,
    NewBreakdownElement, NewBudgetLine, NewEstimateLine, NewProgressUpdate, NewProject,
    NewResourceDetail, ParseEnumError, ProgressUpdateId, ProgressUpdateRecord, ProjectId,
    ProjectRecord, ProjectStatus, ResourceDetailId, ResourceDetailRecord, ResourceType,
};
pub use traits::BaselineStore;
