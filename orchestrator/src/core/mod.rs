//! Core business logic modules
//!
//! Partitioning, retry policy and query construction are pure functions.
//! The pool worker and the execution registry hold the async state.

pub mod backoff;
pub mod classifier;
pub mod execution;
pub mod partition;
pub mod pool;
pub mod query;

pub use backoff::backoff_delay;
pub use classifier::{retry_decision, ErrorLog, ErrorReport, RetryDecision, Severity};
pub use execution::{Execution, ExecutionMetrics, ExecutionRegistry, ExecutionSnapshot, ExecutionUpdate, SweepReport};
pub use partition::partition;
pub use query::build_query;
