//! # Constants
//!
//! Default values and fixed names shared across the controller.

/// Finalizer attached to Repository resources before any remote repository exists
pub const REPOSITORY_FINALIZER: &str = "repository.finalizers.forge.microscaler.io";

/// Finalizer attached to Key resources before any remote deploy key exists
pub const KEY_FINALIZER: &str = "key.finalizers.forge.microscaler.io";

/// Field manager name used for server-side writes
pub const FIELD_MANAGER: &str = "forge-controller";

/// Secret data entry holding the PEM encoded private key
pub const SECRET_PRIVATE_KEY: &str = "identity";

/// Secret data entry holding the OpenSSH public key line
pub const SECRET_PUBLIC_KEY: &str = "identity.pub";

/// Fixed requeue interval for every wait state (seconds)
pub const DEFAULT_REQUEUE_INTERVAL_SECS: u64 = 2;

/// Requeue interval once a resource is fully synced (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30 * 60;

/// RSA modulus size for generated deploy keys
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Attempts made to read a freshly created Secret back through the store
pub const DEFAULT_SECRET_VISIBILITY_ATTEMPTS: u32 = 10;

/// Pause before each Secret read-back attempt (milliseconds)
pub const DEFAULT_SECRET_VISIBILITY_INTERVAL_MS: u64 = 10;

/// Attempts made by the conflict-retrying update helpers
pub const DEFAULT_STATUS_UPDATE_ATTEMPTS: u32 = 5;

/// Pause between conflict retries (milliseconds)
pub const DEFAULT_STATUS_UPDATE_INTERVAL_MS: u64 = 10;

/// GitHub REST API base URL
pub const DEFAULT_FORGE_API_URL: &str = "https://api.github.com";

/// GitHub web base URL, used for status links
pub const DEFAULT_FORGE_WEB_URL: &str = "https://github.com";

/// Per-request timeout for forge API calls (seconds)
pub const DEFAULT_FORGE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// GitHub REST API version header value
pub const FORGE_API_VERSION: &str = "2022-11-28";

/// Default metrics and probe server port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
