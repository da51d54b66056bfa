//! # Key Secrets
//!
//! Materializes the Secret holding a Key's keypair and checks that an existing
//! Secret still matches the public key recorded in the Key status.

use super::keygen::Identity;
use super::remote::tracked_location;
use crate::constants::{SECRET_PRIVATE_KEY, SECRET_PUBLIC_KEY};
use crate::controller::reconciler::status::{update_status, RetryPolicy};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{Key, KeyStatus, Phase};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// Namespace and name of the Secret belonging to a Key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl SecretRef {
    /// Template overrides win, otherwise the Secret mirrors the Key's own namespace and name
    pub fn for_key(key: &Key, key_namespace: &str) -> Self {
        let template = &key.spec.secret_template;
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        Self {
            namespace: non_empty(&template.target_namespace)
                .unwrap_or_else(|| key_namespace.to_string()),
            name: non_empty(&template.name_override).unwrap_or_else(|| key.name_any()),
        }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Secret carrying both halves of `identity`, shaped by the Key's template.
///
/// Owner references cannot cross namespaces, so a Secret outside the Key's
/// namespace gets none and is deleted by the Key finalizer instead.
pub fn build_secret(key: &Key, secret_ref: &SecretRef, identity: &Identity) -> Secret {
    let template = &key.spec.secret_template;
    let non_empty = |map: &BTreeMap<String, String>| (!map.is_empty()).then(|| map.clone());

    let owner_references = if key.namespace().as_deref() == Some(secret_ref.namespace.as_str()) {
        key.controller_owner_ref(&()).map(|mut owner| {
            owner.block_owner_deletion = Some(true);
            vec![owner]
        })
    } else {
        None
    };

    Secret {
        metadata: ObjectMeta {
            name: Some(secret_ref.name.clone()),
            namespace: Some(secret_ref.namespace.clone()),
            labels: non_empty(&template.labels),
            annotations: non_empty(&template.annotations),
            owner_references,
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([
            (
                SECRET_PRIVATE_KEY.to_string(),
                ByteString(identity.private_key_pem.as_bytes().to_vec()),
            ),
            (
                SECRET_PUBLIC_KEY.to_string(),
                ByteString(identity.public_key.as_bytes().to_vec()),
            ),
        ])),
        ..Secret::default()
    }
}

/// Compare the Secret's `identity.pub` with `status.publicKey`, both trimmed
///
/// # Errors
///
/// [`ReconcilerError::PublicKeyConflict`] on any mismatch, including a Secret
/// without the public key entry.
pub fn verify_public_key(
    key: &Key,
    secret: &Secret,
    secret_ref: &SecretRef,
) -> Result<(), ReconcilerError> {
    let recorded = key
        .status
        .as_ref()
        .map(|status| status.public_key.trim())
        .unwrap_or_default();
    let stored = secret
        .data
        .as_ref()
        .and_then(|data| data.get(SECRET_PUBLIC_KEY))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).trim().to_string());

    match stored {
        Some(stored) if stored == recorded => Ok(()),
        _ => Err(ReconcilerError::PublicKeyConflict {
            secret: secret_ref.to_string(),
            key: key.name_any(),
        }),
    }
}

/// Generate a fresh keypair and write it into a new Secret
///
/// A remote key still tracked from an earlier Secret is deleted first. The new
/// public key is recorded in the Key status before the Secret is created.
pub(crate) async fn materialize_secret(
    ctx: &Reconciler,
    key: &Key,
    namespace: &str,
    secret_ref: &SecretRef,
) -> Result<Action, ReconcilerError> {
    let name = key.name_any();
    let retry = RetryPolicy::from_config(&ctx.config);
    let status = key.status.clone().unwrap_or_default();

    if status.remote_key_id != 0 {
        let deleting = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
            s.phase = Some(Phase::Deleting);
        })
        .await?;
        if deleting.is_gone() {
            return Ok(Action::await_change());
        }
        match tracked_location(ctx, key, namespace).await? {
            Some((org, repo)) => {
                info!(
                    secret = %secret_ref,
                    remote_key_id = status.remote_key_id,
                    "secret missing, deleting orphaned remote key {org}/{repo}"
                );
                ctx.forge
                    .delete_key(&org, &repo, status.remote_key_id)
                    .await?;
            }
            None => warn!(
                remote_key_id = status.remote_key_id,
                "orphaned remote key has no known location, leaving it"
            ),
        }
    }

    info!(secret = %secret_ref, "secret missing, generating new deploy key");
    let identity = ctx.identities.generate().await?;

    let recorded = update_status::<Key, _>(ctx.keys.as_ref(), namespace, &name, retry, |s| {
        *s = KeyStatus {
            phase: Some(Phase::Creating),
            public_key: identity.public_key.clone(),
            ..KeyStatus::default()
        };
    })
    .await?;
    if recorded.is_gone() {
        return Ok(Action::await_change());
    }

    ctx.secrets
        .create(&build_secret(key, secret_ref, &identity))
        .await?;
    info!(secret = %secret_ref, "created secret");

    wait_for_secret(ctx, secret_ref).await?;
    Ok(ctx.requeue("secret_created"))
}

/// Poll until a freshly created Secret is readable
async fn wait_for_secret(ctx: &Reconciler, secret_ref: &SecretRef) -> Result<(), ReconcilerError> {
    let attempts = ctx.config.secret_visibility_attempts;
    for attempt in 1..=attempts {
        tokio::time::sleep(ctx.config.secret_visibility_interval()).await;
        if ctx
            .secrets
            .get(&secret_ref.namespace, &secret_ref.name)
            .await?
            .is_some()
        {
            info!(secret = %secret_ref, attempt, "secret readable after creation");
            return Ok(());
        }
    }
    warn!(secret = %secret_ref, attempts, "secret not readable after creation");
    Err(ReconcilerError::SecretNotVisible {
        secret: secret_ref.to_string(),
        attempts,
    })
}
