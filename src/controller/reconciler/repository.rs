//! # Repository Reconciler
//!
//! ```text
//! no finalizer        -> attach finalizer, phase Creating, requeue
//! remote missing      -> CreateRepo, requeue
//! remote drifted      -> phase Updating, UpdateRepo, requeue
//! remote matches      -> copy url and counts, phase Synced, resync later
//! deletion requested  -> phase Deleting, DeleteRepo if allowed, release finalizer
//! ```

use super::finalizer::{add_finalizer, has_finalizer, remove_finalizer};
use super::status::{update_status, RetryPolicy};
use super::types::{Reconciler, ReconcilerError};
use crate::constants::REPOSITORY_FINALIZER;
use crate::crd::{Phase, Repository};
use crate::forge::RepositoryFields;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::info;

/// Reconcile one Repository; the passed object only identifies it, the latest version is re-read
pub async fn reconcile_repository(
    repository: Arc<Repository>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = repository
        .namespace()
        .ok_or(ReconcilerError::MissingMetadata("namespace"))?;
    let name = repository.name_any();
    super::instrumented(
        "Repository",
        &namespace,
        &name,
        reconcile(&ctx, &namespace, &name),
    )
    .await
}

async fn reconcile(ctx: &Reconciler, namespace: &str, name: &str) -> Result<Action, ReconcilerError> {
    let retry = RetryPolicy::from_config(&ctx.config);
    let Some(repository) = ctx.repositories.get(namespace, name).await? else {
        return Ok(Action::await_change());
    };

    if repository.meta().deletion_timestamp.is_some() {
        if has_finalizer(&repository, REPOSITORY_FINALIZER) {
            return finalize(ctx, &repository, namespace).await;
        }
        return Ok(Action::await_change());
    }

    if !has_finalizer(&repository, REPOSITORY_FINALIZER) {
        info!("adding finalizer");
        let added = add_finalizer::<Repository>(
            ctx.repositories.as_ref(),
            namespace,
            name,
            REPOSITORY_FINALIZER,
            retry,
        )
        .await?;
        if added.is_gone() {
            return Ok(Action::await_change());
        }
        set_phase(ctx, namespace, name, Phase::Creating).await?;
        return Ok(ctx.requeue("finalizer_attached"));
    }

    let org = repository.spec.organization.as_str();
    let fields = RepositoryFields::from_repository(&repository);

    let Some(remote) = ctx.forge.get_repo(org, &fields.name).await? else {
        info!("remote repository {org}/{name} not found, creating it");
        ctx.forge.create_repo(org, &fields).await?;
        set_phase(ctx, namespace, name, Phase::Creating).await?;
        return Ok(ctx.requeue("remote_repository_created"));
    };

    if remote.drifted_from(&fields) {
        info!("remote repository {org}/{name} drifted from spec, updating it");
        set_phase(ctx, namespace, name, Phase::Updating).await?;
        ctx.forge.update_repo(org, &fields).await?;
        return Ok(ctx.requeue("remote_repository_updated"));
    }

    let outcome = update_status::<Repository, _>(
        ctx.repositories.as_ref(),
        namespace,
        name,
        retry,
        |status| {
            status.phase = Some(Phase::Synced);
            status.url.clone_from(&remote.html_url);
            status.fork_count = remote.forks_count;
            status.stargazers_count = remote.stargazers_count;
            status.watchers_count = remote.watchers_count;
        },
    )
    .await?;
    if outcome.is_gone() {
        return Ok(Action::await_change());
    }
    Ok(ctx.resync())
}

async fn set_phase(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
    phase: Phase,
) -> Result<(), ReconcilerError> {
    let retry = RetryPolicy::from_config(&ctx.config);
    update_status::<Repository, _>(ctx.repositories.as_ref(), namespace, name, retry, |status| {
        status.phase = Some(phase);
    })
    .await?;
    Ok(())
}

/// Remove the remote repository (when allowed) and release the finalizer
async fn finalize(
    ctx: &Reconciler,
    repository: &Repository,
    namespace: &str,
) -> Result<Action, ReconcilerError> {
    let name = repository.name_any();
    let org = repository.spec.organization.as_str();
    info!("handling deletion");
    set_phase(ctx, namespace, &name, Phase::Deleting).await?;

    match ctx.forge.get_repo(org, &name).await? {
        None => info!("remote repository {org}/{name} already absent"),
        Some(_) if ctx.config.destructive_delete => {
            info!("deleting remote repository {org}/{name}");
            ctx.forge.delete_repo(org, &name).await?;
        }
        Some(_) => info!("destructive delete disabled, leaving remote repository {org}/{name}"),
    }

    remove_finalizer::<Repository>(
        ctx.repositories.as_ref(),
        namespace,
        &name,
        REPOSITORY_FINALIZER,
        RetryPolicy::from_config(&ctx.config),
    )
    .await?;
    info!("finalizer removed");
    Ok(Action::await_change())
}
