//! # Key Reconciler
//!
//! Drives a Key through: Secret materialization, waiting for its Repository,
//! finalizer attachment, remote key creation and drift repair, and deletion.
//!
//! ```text
//! Secret missing        -> generate keypair, record public key, create Secret
//! Secret mismatched     -> terminal error, wait for manual correction
//! Repository missing    -> requeue
//! Repository not Synced -> phase Waiting, requeue
//! no finalizer          -> attach finalizer, phase Creating, requeue
//! otherwise             -> create / verify / replace the remote key
//! deletion requested    -> DeleteKey if allowed, delete a cross-namespace Secret,
//!                          release finalizer
//! ```

pub mod keygen;
mod remote;
mod secret;

pub use keygen::{Identity, IdentityGenerator, KeyGenError, RsaIdentityGenerator};
pub use secret::{build_secret, verify_public_key, SecretRef};

use super::finalizer::{add_finalizer, has_finalizer, remove_finalizer};
use super::status::{update_status, RetryPolicy};
use super::types::{Reconciler, ReconcilerError};
use crate::constants::KEY_FINALIZER;
use crate::crd::{Key, Phase};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::info;

/// Reconcile one Key; the passed object only identifies it, the latest version is re-read
pub async fn reconcile_key(key: Arc<Key>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let namespace = key
        .namespace()
        .ok_or(ReconcilerError::MissingMetadata("namespace"))?;
    let name = key.name_any();
    super::instrumented("Key", &namespace, &name, reconcile(&ctx, &namespace, &name)).await
}

async fn reconcile(ctx: &Reconciler, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
    let retry = RetryPolicy::from_config(&ctx.config);
    let Some(key) = ctx.keys.get(namespace, name).await? else {
        return Ok(Action::await_change());
    };

    if key.meta().deletion_timestamp.is_some() {
        if has_finalizer(&key, KEY_FINALIZER) {
            return finalize(ctx, &key, namespace).await;
        }
        return Ok(Action::await_change());
    }

    let secret_ref = SecretRef::for_key(&key, namespace);
    let Some(current_secret) = ctx
        .secrets
        .get(&secret_ref.namespace, &secret_ref.name)
        .await?
    else {
        return secret::materialize_secret(ctx, &key, namespace, &secret_ref).await;
    };
    verify_public_key(&key, &current_secret, &secret_ref)?;

    let repository_ref = &key.spec.repository_ref;
    let Some(repository) = ctx.repositories.get(namespace, repository_ref).await? else {
        info!(repository = %repository_ref, "referenced repository does not exist");
        return Ok(ctx.requeue("repository_missing"));
    };

    if repository.phase() != Some(Phase::Synced) {
        let outcome = update_status::<Key, _>(ctx.keys.as_ref(), namespace, name, retry, |s| {
            s.phase = Some(Phase::Waiting);
        })
        .await?;
        if outcome.is_gone() {
            return Ok(Action::await_change());
        }
        info!(repository = %repository_ref, "referenced repository not yet synced");
        return Ok(ctx.requeue("repository_not_synced"));
    }

    if !has_finalizer(&key, KEY_FINALIZER) {
        info!("adding finalizer");
        let added =
            add_finalizer::<Key>(ctx.keys.as_ref(), namespace, name, KEY_FINALIZER, retry).await?;
        if added.is_gone() {
            return Ok(Action::await_change());
        }
        update_status::<Key, _>(ctx.keys.as_ref(), namespace, name, retry, |s| {
            s.phase = Some(Phase::Creating);
        })
        .await?;
        return Ok(ctx.requeue("finalizer_attached"));
    }

    remote::sync_remote_key(ctx, &key, namespace, &repository).await
}

/// Remove the remote key (when allowed), delete a Secret living outside the
/// Key's namespace, and release the finalizer
async fn finalize(ctx: &Reconciler, key: &Key, namespace: &str) -> Result<Action, ReconcilerError> {
    let name = key.name_any();
    let retry = RetryPolicy::from_config(&ctx.config);
    info!("handling deletion");

    let outcome = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
        s.phase = Some(Phase::Deleting);
    })
    .await?;
    if outcome.is_gone() {
        return Ok(Action::await_change());
    }

    let status = key.status.clone().unwrap_or_default();
    if status.tracks_remote_key() {
        let (org, repo, id) = (
            status.remote_organization.as_str(),
            status.remote_repository.as_str(),
            status.remote_key_id,
        );
        match ctx.forge.get_key(org, repo, id).await? {
            None => info!(remote_key_id = id, "remote key already absent from {org}/{repo}"),
            Some(_) if ctx.config.destructive_delete => {
                info!(remote_key_id = id, "deleting remote key from {org}/{repo}");
                ctx.forge.delete_key(org, repo, id).await?;
            }
            Some(_) => info!(
                remote_key_id = id,
                "destructive delete disabled, leaving remote key in {org}/{repo}"
            ),
        }
    }

    let secret_ref = SecretRef::for_key(key, namespace);
    if secret_ref.namespace != namespace {
        info!(secret = %secret_ref, "deleting secret outside the Key namespace");
        ctx.secrets
            .delete(&secret_ref.namespace, &secret_ref.name)
            .await?;
    }

    remove_finalizer::<Key>(ctx.keys.as_ref(), namespace, &name, KEY_FINALIZER, retry).await?;
    info!("finalizer removed");
    Ok(Action::await_change())
}
