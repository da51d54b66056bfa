//! # Reconciler Types
//!
//! Shared reconciler context and the reconciler error type.

use super::key::keygen::{IdentityGenerator, KeyGenError, RsaIdentityGenerator};
use crate::config::ControllerConfig;
use crate::crd::{Key, Repository};
use crate::forge::{ForgeClient, ForgeError};
use crate::observability;
use crate::store::{Store, StoreError};
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("forge operation failed: {0}")]
    Forge(#[from] ForgeError),
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] KeyGenError),
    /// The Secret holds a different public key than the Key status records.
    /// Not repaired automatically: the Secret or the Key has to be corrected by hand.
    #[error(
        "Secret {secret} does not match status.publicKey of Key {key}; \
         remove the conflicting Secret or recreate the Key under a different name"
    )]
    PublicKeyConflict { secret: String, key: String },
    #[error("Secret {secret} was not readable after {attempts} attempts")]
    SecretNotVisible { secret: String, attempts: u32 },
    #[error("resource is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

impl ReconcilerError {
    /// Errors that retrying cannot fix; the controller waits for a change instead
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcilerError::PublicKeyConflict { .. })
    }
}

/// Context shared by the Repository and Key reconcilers
pub struct Reconciler {
    pub repositories: Arc<dyn Store<Repository>>,
    pub keys: Arc<dyn Store<Key>>,
    pub secrets: Arc<dyn Store<Secret>>,
    pub forge: Arc<dyn ForgeClient>,
    pub identities: Arc<dyn IdentityGenerator>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Build a context over one store serving all three resource kinds,
    /// generating RSA keys of `config.key_bits`
    pub fn new<S>(store: Arc<S>, forge: Arc<dyn ForgeClient>, config: ControllerConfig) -> Self
    where
        S: Store<Repository> + Store<Key> + Store<Secret> + 'static,
    {
        let identities = Arc::new(RsaIdentityGenerator::new(config.key_bits));
        Self {
            repositories: Arc::<S>::clone(&store),
            keys: Arc::<S>::clone(&store),
            secrets: store,
            forge,
            identities,
            config,
        }
    }

    /// Replace the keypair generator
    #[must_use]
    pub fn with_identity_generator(mut self, identities: Arc<dyn IdentityGenerator>) -> Self {
        self.identities = identities;
        self
    }

    /// Fixed-interval requeue for wait states
    pub(crate) fn requeue(&self, reason: &str) -> Action {
        observability::metrics::increment_requeues_total(reason);
        Action::requeue(self.config.requeue_interval())
    }

    /// Long requeue once a resource is synced
    pub(crate) fn resync(&self) -> Action {
        observability::metrics::increment_requeues_total("resync");
        Action::requeue(self.config.resync_interval())
    }
}
