//! Snapshot CRD upgrade gate
//!
//! - `classifier`: decides whether installed VolumeSnapshot CRDs allow an upgrade
//! - `controller`: reports the verdict as a condition on the Storage resource

pub mod classifier;
pub mod controller;

pub use classifier::*;
pub use controller::*;
