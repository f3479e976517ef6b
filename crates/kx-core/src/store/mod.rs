//! Storage abstractions for the pipeline's two stateful components.
//!
//! The gate store holds the suppression cache and per-service counters; the
//! incident repository holds durable incident records. Both are traits so
//! the decision logic stays independent of the backing engine; the
//! in-memory implementations in [`memory`] are the defaults.

pub mod error;
pub mod gate;
pub mod incidents;
pub mod memory;
pub mod pagination;

pub use error::StoreError;
pub use gate::{GateDecision, GateStats, GateStore};
pub use incidents::{IncidentFilter, IncidentRepository};
pub use memory::{InMemoryGateStore, InMemoryIncidentRepository};
pub use pagination::{PaginatedResult, Pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
