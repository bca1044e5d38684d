//! Bulk dispatch
//! - ops.rs: operation kinds and batch options
//! - results.rs: per-operation results
//! - provider.rs: worker pool and batch submission
//! - worker.rs: per-kind execution

pub mod ops;
pub mod provider;
pub mod results;
mod worker;

pub use ops::*;
pub use provider::KvBulkProvider;
pub use results::*;
