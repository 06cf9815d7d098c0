//! Request routing for the crawler API
//!
//! The router maps `(method, path, body)` to a coordinator call and a JSON
//! response, independent of any particular HTTP server. Routes:
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | POST | `/api/crawler/start` | `{message, sessionId}` |
//! | GET | `/api/crawler/status/{id}` | `CrawlSession` |
//! | GET | `/api/crawler/results/{id}` | `[CrawlResult]` |
//! | POST | `/api/crawler/stop/{id}` | `{message, sessionId}` |
//! | GET | `/api/crawler/sessions` | `[CrawlSession]` |

mod types;

pub use types::{CrawlResponse, StartCrawlRequest};

use crate::crawler::Coordinator;
use crate::state::SessionId;
use crate::CrawlError;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const PREFIX: &str = "/api/crawler/";

/// Status code and JSON body of an API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, format!("Failed to encode response: {}", e)),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &CrawlResponse::message(message))
    }
}

impl From<CrawlError> for ApiResponse {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::SessionNotFound(id) => Self::error(404, format!("Session not found: {}", id)),
            CrawlError::Url(e) => Self::error(400, format!("Invalid URL provided: {}", e)),
            other => Self::error(500, other.to_string()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Start,
    Sessions,
    Status(&'a str),
    Results(&'a str),
    Stop(&'a str),
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let rest = path.strip_prefix(PREFIX)?.trim_end_matches('/');
        match rest.split_once('/') {
            None if rest == "start" => Some(Self::Start),
            None if rest == "sessions" => Some(Self::Sessions),
            Some(("status", id)) if !id.contains('/') => Some(Self::Status(id)),
            Some(("results", id)) if !id.contains('/') => Some(Self::Results(id)),
            Some(("stop", id)) if !id.contains('/') => Some(Self::Stop(id)),
            _ => None,
        }
    }

    fn method(&self) -> &'static str {
        match self {
            Self::Start | Self::Stop(_) => "POST",
            Self::Sessions | Self::Status(_) | Self::Results(_) => "GET",
        }
    }
}

fn parse_id(raw: &str) -> Result<SessionId, ApiResponse> {
    raw.parse()
        .map_err(|_| ApiResponse::error(400, format!("Invalid session id: {}", raw)))
}

/// Dispatches API requests to a shared coordinator
pub struct ApiRouter {
    coordinator: Arc<Coordinator>,
}

impl ApiRouter {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Handles one request; never fails, errors become 4xx/5xx responses
    pub async fn handle(&self, method: &str, path: &str, body: &[u8]) -> ApiResponse {
        let route = match Route::parse(path) {
            Some(route) => route,
            None => return ApiResponse::error(404, format!("No route for {}", path)),
        };
        if !method.eq_ignore_ascii_case(route.method()) {
            return ApiResponse::error(405, "Invalid request method");
        }

        tracing::debug!("{} {}", method, path);
        match self.dispatch(route, body).await {
            Ok(response) => response,
            Err(response) => response,
        }
    }

    async fn dispatch(&self, route: Route<'_>, body: &[u8]) -> Result<ApiResponse, ApiResponse> {
        let coordinator = &self.coordinator;
        match route {
            Route::Start => {
                let request: StartCrawlRequest = serde_json::from_slice(body)
                    .map_err(|_| ApiResponse::error(400, "Invalid request body"))?;
                let id = coordinator.start(&request.url).await?;
                Ok(ApiResponse::json(
                    200,
                    &CrawlResponse::for_session("Crawl started successfully!", id),
                ))
            }
            Route::Sessions => Ok(ApiResponse::json(200, &coordinator.sessions()?)),
            Route::Status(raw) => {
                let session = coordinator.status(parse_id(raw)?)?;
                Ok(ApiResponse::json(200, &session))
            }
            Route::Results(raw) => {
                let results = coordinator.results(parse_id(raw)?)?;
                Ok(ApiResponse::json(200, &results))
            }
            Route::Stop(raw) => {
                let session = coordinator.stop(parse_id(raw)?)?;
                let message = if session.status.is_terminal() {
                    format!("Crawl already {}", session.status)
                } else {
                    "Crawl stopping".to_string()
                };
                Ok(ApiResponse::json(200, &CrawlResponse::for_session(message, session.id)))
            }
        }
    }
}
