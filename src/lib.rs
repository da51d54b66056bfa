//! Forge Controller Library
//!
//! Reconciles `Repository` and `Key` custom resources against a hosted git
//! forge. Tests are included in the module files and under `tests/`.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod forge;
pub mod observability;
pub mod runtime;
pub mod store;

// Re-export CRD types for convenience
pub use crd::*;
