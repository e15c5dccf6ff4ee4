//! Liveness checks for a single URL.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client, Url};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Transport a probe is made over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::Https => "https://",
            Scheme::Http => "http://",
        }
    }

    /// Candidate URL for a bare hostname.
    pub fn url_for(self, host: &str) -> String {
        format!("{}{}", self.prefix(), host)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Https => f.write_str("https"),
            Scheme::Http => f.write_str("http"),
        }
    }
}

/// What a single probe saw.
///
/// Only [`ProbeOutcome::is_live`] feeds the pipeline; the other variants exist
/// for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Live(u16),
    StatusRejected(u16),
    Timeout,
    Transport,
    InvalidUrl,
}

impl ProbeOutcome {
    /// Live iff the status is in [200, 400).
    pub fn from_status(status: u16) -> Self {
        if (200..400).contains(&status) {
            ProbeOutcome::Live(status)
        } else {
            ProbeOutcome::StatusRejected(status)
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, ProbeOutcome::Live(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Live(status) => write!(f, "live ({status})"),
            ProbeOutcome::StatusRejected(status) => write!(f, "rejected ({status})"),
            ProbeOutcome::Timeout => f.write_str("timeout"),
            ProbeOutcome::Transport => f.write_str("transport error"),
            ProbeOutcome::InvalidUrl => f.write_str("invalid url"),
        }
    }
}

/// Something that can classify a candidate URL.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Issues one GET per URL over a client shared by every worker.
///
/// The client never reuses connections, skips certificate verification and
/// does not follow redirects, so a 3xx is judged on its own status.
///
/// The client timeout bounds the whole exchange, body included.
#[derive(Debug, Clone)]
pub struct LivenessChecker {
    client: Client,
}

impl LivenessChecker {
    pub fn new(request_timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(true)
            .redirect(redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: Url) -> ProbeOutcome {
        let response = self
            .client
            .get(url)
            .header(header::CONNECTION, "close")
            .send()
            .await;

        match response {
            Ok(mut response) => {
                let status = response.status().as_u16();
                // Drain so the connection shuts down cleanly; the status alone decides.
                while let Ok(Some(_)) = response.chunk().await {}
                ProbeOutcome::from_status(status)
            }
            Err(e) if e.is_timeout() => ProbeOutcome::Timeout,
            Err(e) if e.is_builder() => ProbeOutcome::InvalidUrl,
            Err(_) => ProbeOutcome::Transport,
        }
    }
}

#[async_trait]
impl Probe for LivenessChecker {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let outcome = match Url::parse(url) {
            Ok(parsed) => self.get(parsed).await,
            Err(_) => ProbeOutcome::InvalidUrl,
        };

        debug!(url, %outcome, "probe finished");
        outcome
    }
}
