//! Nexus directory API client.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /users` with a list of [`DirectoryUser`]
//! - `DELETE /users` with a list of `{"id": ...}`
//! - `POST /sync-start`, answering `{"started_at": ...}`
//! - `POST /sync-completed` with `{"started_at": ...}`

use async_trait::async_trait;
use communaute_core::DirectoryClient;
use communaute_domain::{
    CommunauteError, DirectoryUser, DirectoryUserRef, NexusConfig, Result as DomainResult,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct SyncStartResponse {
    started_at: String,
}

#[derive(Debug, Serialize)]
struct SyncCompletedRequest<'a> {
    started_at: &'a str,
}

#[derive(Clone)]
pub struct NexusClient {
    http: HttpClient,
    base_url: Url,
}

impl NexusClient {
    pub fn new(base_url: &str, api_token: Option<&str>) -> DomainResult<Self> {
        let mut builder = HttpClient::builder();
        if let Some(token) = api_token.filter(|token| !token.is_empty()) {
            builder = builder.bearer_token(token);
        }
        Self::with_http(base_url, builder.build()?)
    }

    pub fn with_http(base_url: &str, http: HttpClient) -> DomainResult<Self> {
        // A trailing slash keeps `join` from replacing the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            CommunauteError::Config(format!("invalid Nexus API base URL '{base_url}': {e}"))
        })?;
        Ok(Self { http, base_url })
    }

    /// `None` when directory sync is disabled by configuration.
    pub fn from_config(config: &NexusConfig) -> DomainResult<Option<Self>> {
        match config.api_base_url.as_deref().filter(|_| config.sync_enabled()) {
            Some(base_url) => Self::new(base_url, config.api_token.as_deref()).map(Some),
            None => Ok(None),
        }
    }

    fn endpoint(&self, path: &str) -> DomainResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| CommunauteError::Config(format!("invalid Nexus endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl DirectoryClient for NexusClient {
    #[instrument(skip(self, users), fields(count = users.len()))]
    async fn send_users(&self, users: &[DirectoryUser]) -> DomainResult<()> {
        let request = self.http.request(Method::POST, self.endpoint("users")?).json(users);
        self.http.send_checked(request).await?;
        debug!("users sent to Nexus");
        Ok(())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_users(&self, ids: &[i64]) -> DomainResult<()> {
        let body: Vec<DirectoryUserRef> = ids.iter().copied().map(DirectoryUserRef::from).collect();
        let request = self.http.request(Method::DELETE, self.endpoint("users")?).json(&body);
        self.http.send_checked(request).await?;
        debug!("users deleted from Nexus");
        Ok(())
    }

    async fn start_full_sync(&self) -> DomainResult<String> {
        let request = self.http.request(Method::POST, self.endpoint("sync-start")?);
        let response: SyncStartResponse = self.http.send_json(request).await?;
        Ok(response.started_at)
    }

    async fn complete_full_sync(&self, started_at: &str) -> DomainResult<()> {
        let request = self
            .http
            .request(Method::POST, self.endpoint("sync-completed")?)
            .json(&SyncCompletedRequest { started_at });
        self.http.send_checked(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path() {
        let client = NexusClient::new("https://nexus.example.org/api/v1", Some("token")).unwrap();
        assert_eq!(
            client.endpoint("users").unwrap().as_str(),
            "https://nexus.example.org/api/v1/users"
        );

        let trailing = NexusClient::new("https://nexus.example.org/api/v1/", None).unwrap();
        assert_eq!(
            trailing.endpoint("sync-start").unwrap().as_str(),
            "https://nexus.example.org/api/v1/sync-start"
        );
    }

    #[test]
    fn disabled_without_base_url() {
        assert!(NexusClient::from_config(&NexusConfig::default()).unwrap().is_none());
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        assert!(matches!(NexusClient::new("not a url", None), Err(CommunauteError::Config(_))));
    }
}
