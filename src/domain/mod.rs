//! Domain module
//!
//! Port traits through which the operator reaches the cluster, the process
//! environment and manifest assets.

pub mod ports;

pub use ports::*;
