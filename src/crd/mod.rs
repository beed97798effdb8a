//! Custom Resource Definitions owned by the operator
//!
//! - Storage: cluster-scoped operator configuration and status

pub mod storage;

pub use storage::*;
