//! # Reconciler Configuration
//!
//! Timing, retry and safety settings for the Repository and Key reconcilers.

use super::env_var_or_default;
use std::time::Duration;

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Requeue interval for every wait state and transient error (seconds)
    pub requeue_interval_secs: u64,
    /// Requeue interval once a resource is synced without drift (seconds)
    pub resync_interval_secs: u64,
    /// Whether deleting a resource also deletes the remote object.
    /// Off by default: finalizers are cleared without touching the forge.
    pub destructive_delete: bool,
    /// RSA modulus size for generated deploy keys
    pub key_bits: usize,
    /// Read-back attempts after creating a Secret
    pub secret_visibility_attempts: u32,
    /// Pause before each Secret read-back attempt (milliseconds)
    pub secret_visibility_interval_ms: u64,
    /// Attempts for conflict-retrying status and metadata writes
    pub status_update_attempts: u32,
    /// Pause between conflict retries (milliseconds)
    pub status_update_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            requeue_interval_secs: DEFAULT_REQUEUE_INTERVAL_SECS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            destructive_delete: false,
            key_bits: DEFAULT_KEY_BITS,
            secret_visibility_attempts: DEFAULT_SECRET_VISIBILITY_ATTEMPTS,
            secret_visibility_interval_ms: DEFAULT_SECRET_VISIBILITY_INTERVAL_MS,
            status_update_attempts: DEFAULT_STATUS_UPDATE_ATTEMPTS,
            status_update_interval_ms: DEFAULT_STATUS_UPDATE_INTERVAL_MS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            requeue_interval_secs: env_var_or_default(
                "REQUEUE_INTERVAL_SECS",
                DEFAULT_REQUEUE_INTERVAL_SECS,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            destructive_delete: env_var_or_default("DESTRUCTIVE_DELETE", false),
            key_bits: env_var_or_default("KEY_BITS", DEFAULT_KEY_BITS),
            secret_visibility_attempts: env_var_or_default(
                "SECRET_VISIBILITY_ATTEMPTS",
                DEFAULT_SECRET_VISIBILITY_ATTEMPTS,
            ),
            secret_visibility_interval_ms: env_var_or_default(
                "SECRET_VISIBILITY_INTERVAL_MS",
                DEFAULT_SECRET_VISIBILITY_INTERVAL_MS,
            ),
            status_update_attempts: env_var_or_default(
                "STATUS_UPDATE_ATTEMPTS",
                DEFAULT_STATUS_UPDATE_ATTEMPTS,
            ),
            status_update_interval_ms: env_var_or_default(
                "STATUS_UPDATE_INTERVAL_MS",
                DEFAULT_STATUS_UPDATE_INTERVAL_MS,
            ),
        }
    }

    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn secret_visibility_interval(&self) -> Duration {
        Duration::from_millis(self.secret_visibility_interval_ms)
    }

    pub fn status_update_interval(&self) -> Duration {
        Duration::from_millis(self.status_update_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_behavior() {
        let config = ControllerConfig::default();
        assert_eq!(config.requeue_interval(), Duration::from_secs(2));
        assert_eq!(config.resync_interval(), Duration::from_secs(1800));
        assert!(!config.destructive_delete);
        assert_eq!(config.key_bits, 4096);
        assert_eq!(config.secret_visibility_attempts, 10);
        assert_eq!(config.secret_visibility_interval(), Duration::from_millis(10));
        assert_eq!(config.status_update_attempts, 5);
    }
}
