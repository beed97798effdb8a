//! CSI driver operator bootstrapping
//!
//! Per-driver deployment configuration derived from the environment.

pub mod config;
pub mod drivers;

pub use config::*;
pub use drivers::*;
