//! HTTP fetcher implementation
//!
//! This module handles page retrieval for the crawler:
//! - Building HTTP clients with the configured user agent and timeout
//! - One session per worker, never shared
//! - Error classification into timeout / status / network / session
//!
//! The fetcher never retries; a failed fetch is reported to the caller, which
//! decides whether the record is skipped.

use crate::config::UserAgentConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// A successfully retrieved page
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// A stateful retrieval session
///
/// Sessions are owned by exactly one worker; `&mut self` makes that explicit.
#[async_trait]
pub trait Fetcher: Send {
    async fn fetch(&mut self, url: &str) -> Result<RawPage, FetchError>;
}

/// Opens sessions for the worker pool
pub trait SessionFactory: Send + Sync {
    type Session: Fetcher + 'static;

    fn open(&self) -> Result<Self::Session, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Deadline for a whole request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP session backed by its own reqwest client
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpSession {
    async fn fetch(&mut self, url: &str) -> Result<RawPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, &e))?;

        Ok(RawPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Opens [`HttpSession`]s sharing one user agent and timeout
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    user_agent: UserAgentConfig,
    timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new(user_agent: UserAgentConfig, timeout: Duration) -> Self {
        Self {
            user_agent,
            timeout,
        }
    }
}

impl SessionFactory for HttpSessionFactory {
    type Session = HttpSession;

    fn open(&self) -> Result<HttpSession, FetchError> {
        let client = build_http_client(&self.user_agent, self.timeout)
            .map_err(|e| FetchError::Session(e.to_string()))?;
        Ok(HttpSession::new(client))
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &str, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = err.status() {
        FetchError::HttpStatus {
            url: url.to_string(),
            code: status.as_u16(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
