//! # Forge Controller
//!
//! A Kubernetes controller that keeps `Repository` and `Key` resources in sync
//! with a hosted git forge (GitHub).
//!
//! ## Overview
//!
//! 1. **Repositories** - Creates the remote repository, keeps its settings in
//!    line with the resource and mirrors fork/star/watcher counts into status
//! 2. **Deploy keys** - Generates an RSA keypair into a Secret, waits for the
//!    referenced Repository to sync, then registers the public key as a deploy key
//! 3. **Deletion** - Finalizers hold resources until the remote object has been
//!    handled; remote deletes only happen with `--destructive-delete`
//!
//! See the [README.md](../README.md) for deployment and configuration.

use anyhow::Result;
use clap::Parser;
use forge_controller::cli::Cli;
use forge_controller::config::load_config;
use forge_controller::runtime::initialization::initialize;
use forge_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut controller_config, forge_config, mut server_config) = load_config();
    cli.apply(&mut controller_config, &mut server_config);

    let init_result = initialize(controller_config, forge_config, server_config).await?;

    run_watch_loop(init_result.client, init_result.reconciler).await?;

    init_result
        .server_state
        .is_ready
        .store(false, std::sync::atomic::Ordering::Relaxed);
    Ok(())
}
