//! # Error Policy
//!
//! Turns a failed reconcile pass into the next [`Action`].
//!
//! Transient failures requeue after the fixed interval. Terminal failures
//! (a Secret whose public key disagrees with its Key) wait for the resource to
//! change, since retrying cannot fix them.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::{Key, Repository};
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, warn};

/// Next action after `error` failed a pass over `kind` `namespace/name`
pub fn error_action(
    kind: &str,
    namespace: &str,
    name: &str,
    error: &ReconcilerError,
    config: &ControllerConfig,
) -> Action {
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.kind = kind,
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    observability::metrics::increment_reconciliation_errors(kind);

    if error.is_terminal() {
        error!("Reconciliation of {} {}/{} needs manual correction: {}", kind, namespace, name, error);
        return Action::await_change();
    }

    warn!(
        "Reconciliation of {} {}/{} failed, retrying in {}s: {}",
        kind,
        namespace,
        name,
        config.requeue_interval_secs,
        error
    );
    observability::metrics::increment_requeues_total("error");
    Action::requeue(config.requeue_interval())
}

pub fn handle_repository_error(
    repository: Arc<Repository>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    error_action(
        "Repository",
        repository.namespace().as_deref().unwrap_or_default(),
        &repository.name_any(),
        error,
        &ctx.config,
    )
}

pub fn handle_key_error(key: Arc<Key>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action {
    error_action(
        "Key",
        key.namespace().as_deref().unwrap_or_default(),
        &key.name_any(),
        error,
        &ctx.config,
    )
}
