//! Robots.txt handling module
//!
//! Fetches, parses and caches robots.txt per host for a crawl session.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::{RobotsPolicy, MAX_CRAWL_DELAY};

use tracing::debug;
use url::Url;

/// Fetches the robots.txt governing `url`
///
/// Any failure (network error, non-2xx status, unreadable body) yields an
/// allow-all policy.
pub async fn fetch_robots(client: &reqwest::Client, url: &Url) -> RobotsPolicy {
    let robots_url = match url.join("/robots.txt") {
        Ok(robots_url) => robots_url,
        Err(_) => return RobotsPolicy::allow_all(),
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url = %robots_url, error = %e, "robots.txt unreachable, allowing all");
            return RobotsPolicy::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!(url = %robots_url, status = %response.status(), "no robots.txt, allowing all");
        return RobotsPolicy::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            debug!(url = %robots_url, bytes = body.len(), "fetched robots.txt");
            RobotsPolicy::from_content(&body)
        }
        Err(e) => {
            debug!(url = %robots_url, error = %e, "robots.txt body unreadable, allowing all");
            RobotsPolicy::allow_all()
        }
    }
}
