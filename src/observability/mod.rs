//! # Observability
//!
//! Prometheus metrics for the controller and the forge client.

pub mod metrics;
