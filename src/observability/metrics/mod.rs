//! # Metrics Module
//!
//! Prometheus metrics for monitoring the controller, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text encoding
//! - `controller_metrics` - Reconciliation counts, errors, durations and requeues
//! - `forge_metrics` - Forge API request counts and latencies

pub mod controller_metrics;
pub mod forge_metrics;
pub mod registry;

pub use controller_metrics::*;
pub use forge_metrics::*;
pub use registry::*;
