use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use crawl_engine::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Builds the key that identifies one server: host plus effective port
///
/// Politeness and same-host scoping are tracked per key, so two servers on
/// one machine (common in tests) are kept apart while `http://a/` and
/// `http://a:80/` share one.
pub fn host_key(url: &Url) -> Option<String> {
    let host = extract_host(url)?;
    Some(match url.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
