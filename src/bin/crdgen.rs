//! Prints the Repository and Key CustomResourceDefinitions as a YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/forge.microscaler.io.yaml
//! ```

use anyhow::{Context, Result};
use forge_controller::crd::{Key, Repository};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let repository = serde_yaml::to_string(&Repository::crd())
        .context("Failed to serialize Repository CRD")?;
    let key = serde_yaml::to_string(&Key::crd()).context("Failed to serialize Key CRD")?;
    print!("---\n{repository}---\n{key}");
    Ok(())
}
