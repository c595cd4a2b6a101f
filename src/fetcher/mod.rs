//! Fetching target payloads over HTTP.
//!
//! A fetch is a single attempt bounded by a timeout. Anything other than a
//! 2xx response is a failure; retries happen naturally on the next poll.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::header::USER_AGENT;
use thiserror::Error;
use url::Url;

use crate::config::DEFAULT_USER_AGENT;

/// Reasons a fetch can fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("unexpected status code: {0}")]
    Status(u16),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Retrieves the payload of a target.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its body.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Round-robin over a fixed list of user agents.
#[derive(Debug)]
pub struct UserAgentRotation {
    agents: Vec<String>,
    next: AtomicUsize,
}

impl UserAgentRotation {
    /// Creates a rotation, ignoring blank entries. Falls back to the default
    /// agent when nothing is left.
    pub fn new(agents: Vec<String>) -> Self {
        let mut agents: Vec<String> =
            agents.into_iter().filter(|agent| !agent.trim().is_empty()).collect();
        if agents.is_empty() {
            agents.push(DEFAULT_USER_AGENT.to_string());
        }
        Self { agents, next: AtomicUsize::new(0) }
    }

    /// Returns the next agent.
    pub fn next_agent(&self) -> &str {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[index]
    }
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    user_agents: UserAgentRotation,
}

impl HttpFetcher {
    /// Creates a fetcher with a per-request timeout.
    pub fn new(timeout: Duration, user_agents: Vec<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, timeout, user_agents: UserAgentRotation::new(user_agents) })
    }

    fn map_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let user_agent = self.user_agents.next_agent();
        tracing::trace!(%url, user_agent, "Fetching target.");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() { FetchError::Timeout(self.timeout) } else { FetchError::Body(e.to_string()) }
        })
    }
}
