//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables.
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Environment variables are populated from a ConfigMap using `envFrom` in the deployment.

mod controller;
mod forge;
mod server;

pub use controller::ControllerConfig;
pub use forge::ForgeConfig;
pub use server::ServerConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ForgeConfig, ServerConfig) {
    (
        ControllerConfig::from_env(),
        ForgeConfig::from_env(),
        ServerConfig::from_env(),
    )
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_default_falls_back_on_missing() {
        let value: u64 = env_var_or_default("FORGE_CONTROLLER_TEST_UNSET_VARIABLE", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        std::env::set_var("FORGE_CONTROLLER_TEST_GARBAGE", "not-a-number");
        let value: u32 = env_var_or_default("FORGE_CONTROLLER_TEST_GARBAGE", 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_env_var_or_default_parses_bool() {
        std::env::set_var("FORGE_CONTROLLER_TEST_BOOL", " true ");
        assert!(env_var_or_default("FORGE_CONTROLLER_TEST_BOOL", false));
    }
}
