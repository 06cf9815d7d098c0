use crate::config::ScopeConfig;
use crate::url::domain::{extract_host, host_key};
use url::Url;

/// Decides which discovered URLs belong to a crawl session
///
/// A URL is in scope when it is an http(s) URL, contains none of the exclude
/// patterns, and either targets the root URL's server or (when same-host
/// crawling is off) matches one of the allowed domain patterns. With
/// same-host crawling off and no allowed patterns, every host is in scope.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    root_key: Option<String>,
    same_host_only: bool,
    allowed_domains: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl CrawlScope {
    /// Builds the scope for a session rooted at `root`
    pub fn new(config: &ScopeConfig, root: &Url) -> Self {
        Self {
            root_key: host_key(root),
            same_host_only: config.same_host_only,
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            exclude_patterns: config.exclude_patterns.clone(),
        }
    }

    /// Returns true if the URL may be queued in this session
    pub fn allows(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let url_str = url.as_str();
        if self
            .exclude_patterns
            .iter()
            .any(|pattern| url_str.contains(pattern.as_str()))
        {
            return false;
        }

        if self.root_key.is_some() && host_key(url) == self.root_key {
            return true;
        }

        let host = match extract_host(url) {
            Some(host) => host,
            None => return false,
        };

        if self
            .allowed_domains
            .iter()
            .any(|pattern| matches_wildcard(pattern, &host))
        {
            return true;
        }

        !self.same_host_only && self.allowed_domains.is_empty()
    }
}

/// Checks if a domain matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain of it.
///
/// ```
/// use crawl_engine::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
