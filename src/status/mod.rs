//! Status condition handling

pub mod conditions;

pub use conditions::*;
