//! # Forge Client
//!
//! Remote repository and deploy key operations against a hosted git forge.
//!
//! The reconcilers only see [`ForgeClient`]. [`GitHubClient`] implements it over
//! the GitHub REST v3 API. Lookups return `None` for a missing object and
//! deletes treat a missing object as success, so every call is safe to repeat.

mod github;

pub use self::github::GitHubClient;

use crate::crd::Repository;
use async_trait::async_trait;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a [`ForgeClient`]
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("no forge token configured (set GITHUB_AUTH_TOKEN)")]
    MissingToken,
    #[error("forge token is not a valid header value: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
    #[error("forge request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The forge answered with a non-success status
    #[error("forge API returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ForgeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::Api { status: 404, .. })
    }
}

/// Desired settings of a remote repository, as sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryFields {
    pub name: String,
    pub description: String,
    pub homepage: String,
    pub private: bool,
    pub has_issues: bool,
    pub has_projects: bool,
    pub has_wiki: bool,
    pub is_template: bool,
}

impl RepositoryFields {
    /// Desired remote settings for a Repository resource; the remote name is the resource name
    pub fn from_repository(repository: &Repository) -> Self {
        let spec = &repository.spec;
        Self {
            name: repository.name_any(),
            description: spec.description.clone(),
            homepage: spec.homepage.clone(),
            private: spec.settings.private,
            has_issues: spec.settings.issues,
            has_projects: spec.settings.projects,
            has_wiki: spec.settings.wiki,
            is_template: spec.settings.template,
        }
    }
}

/// Remote repository as reported by the forge
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteRepository {
    pub name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub has_issues: bool,
    #[serde(default)]
    pub has_projects: bool,
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub forks_count: i64,
    #[serde(default)]
    pub stargazers_count: i64,
    #[serde(default)]
    pub watchers_count: i64,
}

impl RemoteRepository {
    /// Whether any managed setting differs from the desired fields.
    /// A missing description or homepage equals an empty one.
    pub fn drifted_from(&self, desired: &RepositoryFields) -> bool {
        self.description.as_deref().unwrap_or_default() != desired.description
            || self.homepage.as_deref().unwrap_or_default() != desired.homepage
            || self.private != desired.private
            || self.has_issues != desired.has_issues
            || self.has_projects != desired.has_projects
            || self.has_wiki != desired.has_wiki
            || self.is_template != desired.is_template
    }
}

/// Deploy key as reported by the forge
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteKey {
    pub id: i64,
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub read_only: bool,
}

impl RemoteKey {
    /// Whether the remote key carries the given public key and access mode
    pub fn matches(&self, public_key: &str, read_only: bool) -> bool {
        self.key.trim() == public_key.trim() && self.read_only == read_only
    }
}

/// Deploy key registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewKey {
    pub title: String,
    pub key: String,
    pub read_only: bool,
}

/// Remote repository and deploy key operations
#[async_trait]
pub trait ForgeClient: Send + Sync {
    async fn get_repo(&self, org: &str, name: &str)
        -> Result<Option<RemoteRepository>, ForgeError>;

    async fn create_repo(&self, org: &str, fields: &RepositoryFields) -> Result<(), ForgeError>;

    async fn update_repo(&self, org: &str, fields: &RepositoryFields) -> Result<(), ForgeError>;

    /// Delete a repository; a missing repository is not an error
    async fn delete_repo(&self, org: &str, name: &str) -> Result<(), ForgeError>;

    async fn get_key(&self, org: &str, repo: &str, id: i64)
        -> Result<Option<RemoteKey>, ForgeError>;

    /// Register a deploy key, returning its id
    async fn create_key(&self, org: &str, repo: &str, key: &NewKey) -> Result<i64, ForgeError>;

    /// Delete a deploy key; a missing key is not an error
    async fn delete_key(&self, org: &str, repo: &str, id: i64) -> Result<(), ForgeError>;

    /// Link to the deploy key settings page of a repository
    fn key_settings_url(&self, org: &str, repo: &str) -> String;
}
