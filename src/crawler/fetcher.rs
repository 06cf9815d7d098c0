//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Classifying failures as transient or terminal
//! - Retrying transient failures with exponential backoff
//! - Determining the content type, sniffing it when the header is absent

use crate::config::UserAgentConfig;
use crate::crawler::politeness::PolitenessGate;
use crate::crawler::retry::RetryPolicy;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 5;

/// Classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection reset or other transport fault
    Network,
    /// The per-attempt timeout elapsed
    Timeout,
    /// Host name could not be resolved
    Dns,
    /// Connection refused or otherwise not established
    Connect,
    /// TLS handshake or certificate failure
    Tls,
    /// Redirect loop or too many hops
    Redirect,
    /// The server answered with a non-2xx status
    HttpStatus,
    /// robots.txt disallows the URL
    Robots,
    /// The response body could not be read
    Body,
}

impl FailureKind {
    /// Returns true if a later attempt could succeed
    ///
    /// HTTP status failures are transient only for 5xx and 429.
    pub fn is_transient(&self, status_code: u16) -> bool {
        match self {
            Self::Network | Self::Timeout | Self::Body => true,
            Self::HttpStatus => status_code == 429 || (500..600).contains(&status_code),
            Self::Dns | Self::Connect | Self::Tls | Self::Redirect | Self::Robots => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Redirect => "redirect",
            Self::HttpStatus => "http-status",
            Self::Robots => "robots",
            Self::Body => "body",
        };
        f.write_str(name)
    }
}

/// Result of fetching one URL, after any retries
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A 2xx response with its body
    Success {
        /// Final URL after redirects
        final_url: Url,
        status_code: u16,
        content_type: String,
        body: String,
        /// Duration of the final attempt
        response_time: Duration,
    },

    /// The fetch failed; `status_code` is 0 when no response was received
    Failure {
        status_code: u16,
        kind: FailureKind,
        message: String,
        response_time: Duration,
        /// Body of an error response, empty otherwise
        body: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success { status_code, .. } | Self::Failure { status_code, .. } => *status_code,
        }
    }

    /// Outcome for a URL that robots.txt forbids; nothing was sent
    pub fn disallowed() -> Self {
        Self::Failure {
            status_code: 0,
            kind: FailureKind::Robots,
            message: "disallowed by robots.txt".to_string(),
            response_time: Duration::ZERO,
            body: String::new(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Success { .. } => false,
            Self::Failure {
                kind, status_code, ..
            } => kind.is_transient(*status_code),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The timeout applies to each attempt. Up to [`MAX_REDIRECTS`] redirects
/// are followed.
///
/// # Example
///
/// ```no_run
/// use crawl_engine::config::UserAgentConfig;
/// use crawl_engine::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs GET requests with the session's retry policy
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Success |
    /// | HTTP 5xx, 429 | Retry with backoff |
    /// | Other HTTP status | Terminal failure |
    /// | Timeout, connection reset, body read error | Retry with backoff |
    /// | DNS, connection refused, TLS, redirect error | Terminal failure |
    ///
    /// Every attempt first takes a slot from `gate`, so a retry waits for
    /// the larger of its backoff and the host's politeness delay.
    ///
    /// Returns `None` if `cancel` fires before the first attempt. A
    /// cancellation after that returns the last failure instead of retrying.
    pub async fn fetch(
        &self,
        url: &Url,
        gate: &PolitenessGate,
        cancel: &CancellationToken,
    ) -> Option<FetchOutcome> {
        let mut attempt = 1;
        let mut last = None;
        loop {
            if !gate.wait_turn(url, cancel).await {
                return last;
            }

            let outcome = self.attempt(url).await;
            if !outcome.is_retryable() || !self.retry.should_retry(attempt) {
                return Some(outcome);
            }

            let delay = self.retry.backoff.delay(attempt - 1);
            if let FetchOutcome::Failure { kind, message, .. } = &outcome {
                warn!(
                    url = %url,
                    attempt,
                    kind = %kind,
                    error = %message,
                    "transient fetch failure, retrying in {:?}",
                    delay
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => return Some(outcome),
                _ = tokio::time::sleep(delay) => {}
            }
            last = Some(outcome);
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &Url) -> FetchOutcome {
        let started = Instant::now();

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify_error(&e);
                debug!(url = %url, kind = %kind, error = %e, "request failed");
                return FetchOutcome::Failure {
                    status_code: 0,
                    kind,
                    message: error_message(&e),
                    response_time: started.elapsed(),
                    body: String::new(),
                };
            }
        };

        let status = response.status();
        let final_url = response.url().clone();
        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::Failure {
                    status_code: status.as_u16(),
                    kind: FailureKind::Body,
                    message: format!("failed to read body: {}", e),
                    response_time: started.elapsed(),
                    body: String::new(),
                };
            }
        };
        let response_time = started.elapsed();

        if !status.is_success() {
            return FetchOutcome::Failure {
                status_code: status.as_u16(),
                kind: FailureKind::HttpStatus,
                message: format!("HTTP {}", status),
                response_time,
                body,
            };
        }

        let content_type = header_type.unwrap_or_else(|| sniff_content_type(&body).to_string());
        FetchOutcome::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            response_time,
        }
    }
}

/// Maps a reqwest error to a failure kind by inspecting its cause chain
fn classify_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }
    if err.is_redirect() {
        return FailureKind::Redirect;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return FailureKind::Connect,
                io::ErrorKind::TimedOut => return FailureKind::Timeout,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => return FailureKind::Network,
                _ => {}
            }
        }

        let text = cause.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
        {
            return FailureKind::Dns;
        }
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return FailureKind::Tls;
        }

        source = cause.source();
    }

    if err.is_connect() {
        FailureKind::Connect
    } else if err.is_body() || err.is_decode() {
        FailureKind::Body
    } else {
        FailureKind::Network
    }
}

/// The innermost cause of an error, which names the actual problem
fn error_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message = cause.to_string();
        source = cause.source();
    }
    message
}

/// Returns true if the content type denotes an HTML document
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Guesses a content type for a response that did not declare one
pub fn sniff_content_type(body: &str) -> &'static str {
    let head: String = body
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();

    if head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || head.contains("<head")
        || head.contains("<body")
    {
        "text/html"
    } else if body.contains('\0') || body.contains('\u{FFFD}') {
        "application/octet-stream"
    } else {
        "text/plain"
    }
}
