use crate::state::SessionId;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/crawler/start`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartCrawlRequest {
    pub url: String,
}

/// Acknowledgement or error message returned by the API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_id: Option<SessionId>,
}

impl CrawlResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
        }
    }

    pub fn for_session(message: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            message: message.into(),
            session_id: Some(session_id),
        }
    }
}
