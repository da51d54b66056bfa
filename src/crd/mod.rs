//! # Custom Resource Definitions
//!
//! CRD types for the Forge Controller.
//!
//! - `Repository`: a repository on the forge, owned by the cluster
//! - `Key`: a deploy key for a `Repository`, materialized into a Kubernetes Secret

mod key;
mod repository;
mod status;

pub use key::{Key, KeySpec, KeyStatus, SecretTemplate};
pub use repository::{Repository, RepositorySettings, RepositorySpec, RepositoryStatus};
pub use status::{Phase, StatusObject};
