//! # Key Generation
//!
//! RSA deploy keypairs: PKCS#1 PEM private key and OpenSSH public key line.
//! Generation is CPU heavy and runs on the blocking thread pool.

use async_trait::async_trait;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use ssh_key::public::{KeyData, RsaPublicKey};
use ssh_key::PublicKey;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum KeyGenError {
    #[error("RSA key generation failed: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("PKCS#1 encoding failed: {0}")]
    Pkcs1(#[from] rsa::pkcs1::Error),
    #[error("OpenSSH encoding failed: {0}")]
    OpenSsh(#[from] ssh_key::Error),
    #[error("key generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A generated keypair
pub struct Identity {
    /// PKCS#1 PEM encoded private key
    pub private_key_pem: Zeroizing<String>,
    /// OpenSSH `ssh-rsa AAAA...` line, without comment
    pub public_key: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Source of deploy keypairs
#[async_trait]
pub trait IdentityGenerator: Send + Sync {
    async fn generate(&self) -> Result<Identity, KeyGenError>;
}

/// RSA keypairs of a fixed modulus size
#[derive(Debug, Clone, Copy)]
pub struct RsaIdentityGenerator {
    bits: usize,
}

impl RsaIdentityGenerator {
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }
}

fn generate_rsa(bits: usize) -> Result<Identity, KeyGenError> {
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)?;
    let private_key_pem = private_key.to_pkcs1_pem(LineEnding::LF)?;

    let public_key = PublicKey::new(
        KeyData::Rsa(RsaPublicKey::try_from(&private_key.to_public_key())?),
        "",
    );
    Ok(Identity {
        private_key_pem,
        public_key: public_key.to_openssh()?,
    })
}

#[async_trait]
impl IdentityGenerator for RsaIdentityGenerator {
    async fn generate(&self) -> Result<Identity, KeyGenError> {
        let bits = self.bits;
        tokio::task::spawn_blocking(move || generate_rsa(bits)).await?
    }
}
