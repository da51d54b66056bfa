//! # Command Line
//!
//! Flags for the controller binary. Each flag overrides the matching
//! environment variable.

use crate::config::{ControllerConfig, ServerConfig};
use clap::Parser;

#[derive(Debug, Default, Parser)]
#[command(
    name = "forge-controller",
    version,
    about = "Keeps Repository and Key resources in sync with a hosted git forge"
)]
pub struct Cli {
    /// Port for /metrics, /healthz and /readyz [env: METRICS_PORT]
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Delete remote repositories and deploy keys when their resources are deleted;
    /// `--destructive-delete=false` turns it off [env: DESTRUCTIVE_DELETE]
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub destructive_delete: Option<bool>,

    /// Requeue interval for wait states and transient errors, in seconds [env: REQUEUE_INTERVAL_SECS]
    #[arg(long)]
    pub requeue_interval_secs: Option<u64>,
}

impl Cli {
    /// Apply the flags that were given on top of environment configuration
    pub fn apply(&self, controller: &mut ControllerConfig, server: &mut ServerConfig) {
        if let Some(port) = self.metrics_port {
            server.metrics_port = port;
        }
        if let Some(destructive) = self.destructive_delete {
            controller.destructive_delete = destructive;
        }
        if let Some(secs) = self.requeue_interval_secs {
            controller.requeue_interval_secs = secs;
        }
    }
}
