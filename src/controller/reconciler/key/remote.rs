//! # Remote Keys
//!
//! Create, verify and replace the deploy key registered on the forge.
//!
//! Once a remote key exists, the organization and repository recorded in the
//! Key status locate it, even if `repositoryRef` has changed since. A key
//! found anywhere other than the referenced repository is treated like a key
//! with the wrong content: it is deleted, and the next pass creates a new one.

use crate::controller::reconciler::status::{update_status, RetryPolicy};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{Key, Phase, Repository};
use crate::forge::NewKey;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::info;

/// Organization and repository holding the tracked remote key
///
/// Falls back to the referenced Repository when the status does not name a
/// complete location. `None` when neither is known.
pub(crate) async fn tracked_location(
    ctx: &Reconciler,
    key: &Key,
    namespace: &str,
) -> Result<Option<(String, String)>, ReconcilerError> {
    if let Some(status) = key.status.as_ref().filter(|s| s.tracks_remote_key()) {
        return Ok(Some((
            status.remote_organization.clone(),
            status.remote_repository.clone(),
        )));
    }
    let repository = ctx
        .repositories
        .get(namespace, &key.spec.repository_ref)
        .await?;
    Ok(repository.map(|repo| (repo.spec.organization.clone(), repo.name_any())))
}

/// Bring the remote key in line with the Key, given its Synced Repository
pub(crate) async fn sync_remote_key(
    ctx: &Reconciler,
    key: &Key,
    namespace: &str,
    repository: &Repository,
) -> Result<Action, ReconcilerError> {
    let name = key.name_any();
    let retry = RetryPolicy::from_config(&ctx.config);
    let status = key.status.clone().unwrap_or_default();
    let desired_org = repository.spec.organization.clone();
    let desired_repo = repository.name_any();

    if status.remote_key_id == 0 {
        info!("no remote key tracked, creating one in {desired_org}/{desired_repo}");
        return create_remote_key(ctx, key, namespace, &desired_org, &desired_repo).await;
    }

    let (org, repo) = if status.tracks_remote_key() {
        (
            status.remote_organization.clone(),
            status.remote_repository.clone(),
        )
    } else {
        (desired_org.clone(), desired_repo.clone())
    };

    let Some(remote) = ctx.forge.get_key(&org, &repo, status.remote_key_id).await? else {
        info!(
            remote_key_id = status.remote_key_id,
            "tracked remote key not found in {org}/{repo}, creating a new one"
        );
        return create_remote_key(ctx, key, namespace, &desired_org, &desired_repo).await;
    };

    let relocated = org != desired_org || repo != desired_repo;
    if relocated || !remote.matches(&status.public_key, key.spec.read_only) {
        info!(
            remote_key_id = status.remote_key_id,
            relocated, "remote key drifted from the Key, deleting it from {org}/{repo}"
        );
        let outcome = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
            s.phase = Some(Phase::Deleting);
        })
        .await?;
        if outcome.is_gone() {
            return Ok(Action::await_change());
        }
        ctx.forge
            .delete_key(&org, &repo, status.remote_key_id)
            .await?;
        return Ok(ctx.requeue("remote_key_deleted"));
    }

    let outcome = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
        s.phase = Some(Phase::Synced);
    })
    .await?;
    if outcome.is_gone() {
        return Ok(Action::await_change());
    }
    Ok(ctx.resync())
}

async fn create_remote_key(
    ctx: &Reconciler,
    key: &Key,
    namespace: &str,
    org: &str,
    repo: &str,
) -> Result<Action, ReconcilerError> {
    let name = key.name_any();
    let retry = RetryPolicy::from_config(&ctx.config);
    let public_key = key
        .status
        .as_ref()
        .map(|s| s.public_key.trim().to_string())
        .unwrap_or_default();

    let creating = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
        s.phase = Some(Phase::Creating);
    })
    .await?;
    if creating.is_gone() {
        return Ok(Action::await_change());
    }

    let id = ctx
        .forge
        .create_key(
            org,
            repo,
            &NewKey {
                title: name.clone(),
                key: public_key,
                read_only: key.spec.read_only,
            },
        )
        .await?;
    info!(remote_key_id = id, "registered deploy key in {org}/{repo}");

    let url = ctx.forge.key_settings_url(org, repo);
    let synced = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
        s.phase = Some(Phase::Synced);
        s.url.clone_from(&url);
        s.remote_key_id = id;
        s.remote_organization = org.to_string();
        s.remote_repository = repo.to_string();
    })
    .await?;
    if synced.is_gone() {
        return Ok(Action::await_change());
    }
    Ok(ctx.requeue("remote_key_created"))
}
