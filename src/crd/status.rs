//! # Status Types
//!
//! Phase values shared by both resource kinds, and the accessor trait used by
//! the conflict-retrying status writer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reconciliation phase reported in `status.phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Phase {
    /// The remote object is being created
    Creating,
    /// Waiting on a dependency (e.g. the referenced Repository)
    Waiting,
    /// Remote settings are being brought back in line with the resource
    Updating,
    /// Local and remote state agree
    Synced,
    /// The remote object is being removed
    Deleting,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Creating => "Creating",
            Phase::Waiting => "Waiting",
            Phase::Updating => "Updating",
            Phase::Synced => "Synced",
            Phase::Deleting => "Deleting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to a resource's status subresource
///
/// Implemented by every CRD the reconcilers write status for, so the
/// retry-on-conflict writer can be generic over the resource kind.
pub trait StatusObject {
    type Status: Clone + Default + PartialEq + Send + Sync;

    /// Current status, if the object has one
    fn current_status(&self) -> Option<&Self::Status>;

    /// Mutable status, created empty when absent
    fn status_entry(&mut self) -> &mut Self::Status;
}
