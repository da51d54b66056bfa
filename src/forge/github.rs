//! # GitHub Client
//!
//! [`ForgeClient`] over the GitHub REST v3 API, using reqwest with rustls.
//!
//! Repositories owned by the authenticated user are created through
//! `POST /user/repos`; everything else goes through `POST /orgs/{org}/repos`.
//! The login is fetched once and cached.

use super::{ForgeClient, ForgeError, NewKey, RemoteKey, RemoteRepository, RepositoryFields};
use crate::config::ForgeConfig;
use crate::constants::FORGE_API_VERSION;
use crate::observability;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CreatedKey {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

/// GitHub REST API client
#[derive(Debug)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    web_url: String,
    login: OnceCell<String>,
}

impl GitHubClient {
    /// Build a client from configuration; a token is required
    pub fn new(config: &ForgeConfig) -> Result<Self, ForgeError> {
        let token = config.token.as_deref().ok_or(ForgeError::MissingToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(FORGE_API_VERSION),
        );
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("forge-controller/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            login: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Send a request, recording metrics, and turn non-success statuses into [`ForgeError::Api`]
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ForgeError> {
        let started = Instant::now();
        let result = request.send().await;
        let outcome = match &result {
            Ok(response) if response.status().is_success() => "success",
            Ok(response) if response.status() == StatusCode::NOT_FOUND => "not_found",
            _ => "error",
        };
        observability::metrics::observe_forge_request(
            operation,
            outcome,
            started.elapsed().as_secs_f64(),
        );

        let response = result?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&body)
            .map(|parsed| parsed.message)
            .unwrap_or(body);
        debug!(operation, status = status.as_u16(), %message, "forge request rejected");
        Err(ForgeError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn authenticated_login(&self) -> Result<&str, ForgeError> {
        let login = self
            .login
            .get_or_try_init(|| async {
                let user: AuthenticatedUser = self
                    .send("get_user", self.http.get(self.url("/user")))
                    .await?
                    .json()
                    .await?;
                Ok::<_, ForgeError>(user.login)
            })
            .await?;
        Ok(login.as_str())
    }
}

#[async_trait]
impl ForgeClient for GitHubClient {
    async fn get_repo(
        &self,
        org: &str,
        name: &str,
    ) -> Result<Option<RemoteRepository>, ForgeError> {
        let request = self.http.get(self.url(&format!("/repos/{org}/{name}")));
        match self.send("get_repo", request).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_repo(&self, org: &str, fields: &RepositoryFields) -> Result<(), ForgeError> {
        let path = if self.authenticated_login().await?.eq_ignore_ascii_case(org) {
            "/user/repos".to_string()
        } else {
            format!("/orgs/{org}/repos")
        };
        self.send("create_repo", self.http.post(self.url(&path)).json(fields))
            .await?;
        Ok(())
    }

    async fn update_repo(&self, org: &str, fields: &RepositoryFields) -> Result<(), ForgeError> {
        let request = self
            .http
            .patch(self.url(&format!("/repos/{org}/{}", fields.name)))
            .json(fields);
        self.send("update_repo", request).await?;
        Ok(())
    }

    async fn delete_repo(&self, org: &str, name: &str) -> Result<(), ForgeError> {
        let request = self.http.delete(self.url(&format!("/repos/{org}/{name}")));
        match self.send("delete_repo", request).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other.map(drop),
        }
    }

    async fn get_key(
        &self,
        org: &str,
        repo: &str,
        id: i64,
    ) -> Result<Option<RemoteKey>, ForgeError> {
        let request = self
            .http
            .get(self.url(&format!("/repos/{org}/{repo}/keys/{id}")));
        match self.send("get_key", request).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_key(&self, org: &str, repo: &str, key: &NewKey) -> Result<i64, ForgeError> {
        let request = self
            .http
            .post(self.url(&format!("/repos/{org}/{repo}/keys")))
            .json(key);
        let created: CreatedKey = self.send("create_key", request).await?.json().await?;
        Ok(created.id)
    }

    async fn delete_key(&self, org: &str, repo: &str, id: i64) -> Result<(), ForgeError> {
        let request = self
            .http
            .delete(self.url(&format!("/repos/{org}/{repo}/keys/{id}")));
        match self.send("delete_key", request).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other.map(drop),
        }
    }

    fn key_settings_url(&self, org: &str, repo: &str) -> String {
        format!("{}/{org}/{repo}/settings/keys", self.web_url)
    }
}
