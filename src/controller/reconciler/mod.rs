//! # Reconcilers
//!
//! Level-triggered reconcile passes for Repository and Key resources.
//!
//! Each pass re-reads the resource and the remote forge state, takes at most one
//! step toward the desired state and returns the next [`Action`]. Nothing is
//! carried between passes except what is written to the store.

pub mod finalizer;
pub mod key;
pub mod repository;
pub mod status;
mod types;

pub use key::reconcile_key;
pub use repository::reconcile_repository;
pub use types::{Reconciler, ReconcilerError};

use crate::observability;
use kube_runtime::controller::Action;
use std::future::Future;
use std::time::Instant;
use tracing::Instrument;

/// Run one pass inside a span, recording count and duration for `kind`
async fn instrumented<F>(
    kind: &'static str,
    namespace: &str,
    name: &str,
    pass: F,
) -> Result<Action, ReconcilerError>
where
    F: Future<Output = Result<Action, ReconcilerError>>,
{
    let span = tracing::info_span!("reconcile", kind, namespace, name);
    observability::metrics::increment_reconciliations(kind);
    let started = Instant::now();
    let result = pass.instrument(span).await;
    observability::metrics::observe_reconciliation_duration(
        kind,
        started.elapsed().as_secs_f64(),
    );
    result
}
