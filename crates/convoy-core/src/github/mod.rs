//! Hosted-repository REST client.
//!
//! [`HubClient`] issues authenticated JSON calls against the GitHub-style
//! API. Callers open a [`HubSession`] for a bounded piece of work; the client
//! enforces single entry (one session at a time) and refuses use after
//! [`HubClient::close`], both as explicit usage errors rather than silent
//! connection corruption.

mod response;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::info;

use crate::domain::error::{ConvoyError, Result};
use response::Classified;

const API_ROOT: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Top-level API resource a call is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// `repos/{owner}`: repositories of the configured owner.
    Repos,
    /// `orgs/{owner}`: the owner as an organization.
    Orgs,
    /// `users/{owner}`: the owner as a user account.
    Users,
    /// `user`: the currently authenticated user (no owner segment).
    User,
}

/// Client for one hosted-API owner (user or organization).
pub struct HubClient {
    owner: String,
    token: Option<String>,
    http: reqwest::Client,
    engaged: AtomicBool,
    closed: AtomicBool,
}

impl HubClient {
    pub fn new(owner: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("convoy-core/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HubClient {
            owner: owner.to_string(),
            token,
            http,
            engaged: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Open a session for a bounded piece of work.
    ///
    /// Fails with [`ConvoyError::ClientBusy`] if another session is still
    /// open, and with [`ConvoyError::ClientClosed`] after [`close`](Self::close).
    pub fn session(&self) -> Result<HubSession<'_>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConvoyError::ClientClosed);
        }
        if self
            .engaged
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ConvoyError::ClientBusy);
        }
        Ok(HubSession { client: self })
    }

    /// Permanently tear down the client. Any later `session()` call errors.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn url_for(&self, resource: Resource, sub_path: &str) -> String {
        match resource {
            Resource::Repos => format!("{API_ROOT}/repos/{}{sub_path}", self.owner),
            Resource::Orgs => format!("{API_ROOT}/orgs/{}{sub_path}", self.owner),
            Resource::Users => format!("{API_ROOT}/users/{}{sub_path}", self.owner),
            Resource::User => format!("{API_ROOT}/user{sub_path}"),
        }
    }
}

/// A single-entry view over a [`HubClient`]; released on drop.
pub struct HubSession<'a> {
    client: &'a HubClient,
}

impl Drop for HubSession<'_> {
    fn drop(&mut self) {
        self.client.engaged.store(false, Ordering::SeqCst);
    }
}

impl HubSession<'_> {
    pub async fn get(&self, resource: Resource, sub_path: &str) -> Result<Option<Value>> {
        self.call(Method::GET, resource, sub_path, None).await
    }

    pub async fn post(
        &self,
        resource: Resource,
        sub_path: &str,
        body: &Value,
    ) -> Result<Option<Value>> {
        self.call(Method::POST, resource, sub_path, Some(body)).await
    }

    pub async fn put(
        &self,
        resource: Resource,
        sub_path: &str,
        body: &Value,
    ) -> Result<Option<Value>> {
        self.call(Method::PUT, resource, sub_path, Some(body)).await
    }

    pub async fn delete(&self, resource: Resource, sub_path: &str) -> Result<Option<Value>> {
        self.call(Method::DELETE, resource, sub_path, None).await
    }

    /// Issue one HTTP call and classify the response.
    ///
    /// Returns `Ok(None)` only for the benign "no commits between branches"
    /// pull-request rejection; every other non-success response is an error.
    async fn call(
        &self,
        method: Method,
        resource: Resource,
        sub_path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.client.url_for(resource, sub_path);

        let mut request = self
            .client
            .http
            .request(method, &url)
            .header("Accept", "application/vnd.github+json")
            .header("Content-Type", "application/json");
        if let Some(token) = &self.client.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let payload: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        match response::classify(status, payload)? {
            Classified::Success(value) => Ok(Some(value)),
            Classified::NoOpMerge { message } => {
                info!("PR ignored: '{message}'");
                Ok(None)
            }
        }
    }
}
