//! Robots.txt rule evaluation backed by the robotstxt crate

use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Longest Crawl-delay honoured; larger advertised values are clamped
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Parsed robots.txt rules for one host
///
/// Allow/disallow matching is delegated to `robotstxt`; the crate has no
/// Crawl-delay support, so that directive is extracted here.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Raw body; `None` allows everything
    body: Option<String>,
}

impl RobotsPolicy {
    /// Builds a policy from a robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            body: Some(content.to_string()),
        }
    }

    /// A permissive policy, used when robots.txt is missing or unreachable
    pub fn allow_all() -> Self {
        Self { body: None }
    }

    /// Returns true if `agent` may fetch `url`
    pub fn allows(&self, url: &Url, agent: &str) -> bool {
        match self.body.as_deref() {
            None | Some("") => true,
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, agent, url.as_str())
            }
        }
    }

    /// The Crawl-delay that applies to `agent`
    ///
    /// A group naming the agent wins over the `*` group. Groups are runs of
    /// `User-agent` lines followed by their rules.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let body = self.body.as_deref()?;
        let agent = agent.to_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if in_rules {
                    group.clear();
                    in_rules = false;
                }
                group.push(value.to_lowercase());
                continue;
            }

            in_rules = true;
            if key != "crawl-delay" {
                continue;
            }
            let Some(delay) = parse_delay(value) else {
                continue;
            };
            if group.iter().any(|ua| ua != "*" && agent.starts_with(ua.as_str())) {
                specific = Some(delay);
            } else if group.iter().any(|ua| ua == "*") {
                wildcard = Some(delay);
            }
        }

        specific.or(wildcard)
    }
}

fn parse_delay(value: &str) -> Option<Duration> {
    let secs: f64 = value.parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    // Values too large for a Duration are clamped like any other long delay.
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_CRAWL_DELAY);
    Some(delay.min(MAX_CRAWL_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://example.com/").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_allow_all() {
        let robots = RobotsPolicy::allow_all();
        assert!(robots.allows(&url("/admin"), "crawl-engine"));
        assert_eq!(robots.crawl_delay("crawl-engine"), None);
    }

    #[test]
    fn test_disallow_prefix() {
        let robots = RobotsPolicy::from_content("User-agent: *\nDisallow: /private");
        assert!(robots.allows(&url("/"), "crawl-engine"));
        assert!(!robots.allows(&url("/private"), "crawl-engine"));
        assert!(!robots.allows(&url("/private/page"), "crawl-engine"));
    }

    #[test]
    fn test_allow_overrides_longer_match() {
        let robots = RobotsPolicy::from_content(
            "User-agent: *\nDisallow: /docs\nAllow: /docs/public",
        );
        assert!(!robots.allows(&url("/docs/internal"), "crawl-engine"));
        assert!(robots.allows(&url("/docs/public/a"), "crawl-engine"));
    }

    #[test]
    fn test_agent_specific_group() {
        let robots =
            RobotsPolicy::from_content("User-agent: crawl-engine\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(!robots.allows(&url("/page"), "crawl-engine"));
        assert!(robots.allows(&url("/page"), "otherbot"));
    }

    #[test]
    fn test_empty_body_allows() {
        let robots = RobotsPolicy::from_content("");
        assert!(robots.allows(&url("/anything"), "crawl-engine"));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_group() {
        let robots = RobotsPolicy::from_content(
            "User-agent: *\nCrawl-delay: 10\n\nUser-agent: crawl-engine\nCrawl-delay: 2",
        );
        assert_eq!(robots.crawl_delay("crawl-engine"), Some(Duration::from_secs(2)));
        assert_eq!(robots.crawl_delay("otherbot"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_crawl_delay_shared_group() {
        let robots =
            RobotsPolicy::from_content("User-agent: a-bot\nUser-agent: crawl-engine\nCrawl-delay: 1.5");
        assert_eq!(
            robots.crawl_delay("Crawl-Engine"),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(robots.crawl_delay("zbot"), None);
    }

    #[test]
    fn test_crawl_delay_is_clamped() {
        for value in ["1e30", "inf", "86400"] {
            let robots = RobotsPolicy::from_content(&format!("User-agent: *\nCrawl-delay: {}", value));
            assert_eq!(robots.crawl_delay("crawl-engine"), Some(MAX_CRAWL_DELAY), "{}", value);
        }
    }

    #[test]
    fn test_crawl_delay_rejects_negative_and_nan() {
        for value in ["-3", "NaN"] {
            let robots = RobotsPolicy::from_content(&format!("User-agent: *\nCrawl-delay: {}", value));
            assert_eq!(robots.crawl_delay("crawl-engine"), None, "{}", value);
        }
    }

    #[test]
    fn test_crawl_delay_ignores_garbage() {
        let robots = RobotsPolicy::from_content("User-agent: *\nCrawl-delay: soon # later");
        assert_eq!(robots.crawl_delay("crawl-engine"), None);
    }
}
