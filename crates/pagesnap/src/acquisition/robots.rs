//! robots.txt parsing and the allow/deny policy check.
//!
//! Supports user-agent groups, `Allow`/`Disallow` with `*` and `$`
//! wildcards and longest-match precedence (ties go to `Allow`). Other
//! directives are skipped.

use super::http_client::HttpClient;
use crate::error::FetchError;
use async_trait::async_trait;
use tracing::debug;

/// A single path rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsRule {
    pub pattern: String,
    pub allow: bool,
}

/// Rules that apply to one user agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    pub rules: Vec<RobotsRule>,
}

impl RobotsRules {
    /// Whether `path` (path plus optional query) may be fetched.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for rule in &self.rules {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            let len = rule.pattern.len();
            best = match best {
                Some((best_len, best_allow))
                    if best_len > len || (best_len == len && best_allow) =>
                {
                    Some((best_len, best_allow))
                }
                _ => Some((len, rule.allow)),
            };
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

#[derive(Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<RobotsRule>,
}

/// Parse robots.txt and keep the rules that apply to `user_agent`.
///
/// The group whose agent token is the longest case-insensitive substring
/// of `user_agent` wins; groups naming the same token are merged. With no
/// specific match, the `*` group applies.
pub fn parse_robots(body: &str, user_agent: &str) -> RobotsRules {
    let mut groups: Vec<Group> = Vec::new();
    let mut current: Option<Group> = None;
    let mut last_was_agent = false;

    for raw in body.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !last_was_agent {
                    if let Some(g) = current.take() {
                        groups.push(g);
                    }
                    current = Some(Group::default());
                }
                if let Some(g) = current.as_mut() {
                    g.agents.push(value.to_ascii_lowercase());
                }
                last_was_agent = true;
            }
            "allow" | "disallow" => {
                last_was_agent = false;
                // Empty Disallow means "allow everything" and adds no rule.
                if value.is_empty() {
                    continue;
                }
                if let Some(g) = current.as_mut() {
                    g.rules.push(RobotsRule {
                        pattern: value.to_string(),
                        allow: key == "allow",
                    });
                }
            }
            // Crawl-delay, Sitemap and unknown directives end an agent run.
            _ => {
                last_was_agent = false;
            }
        }
    }
    if let Some(g) = current.take() {
        groups.push(g);
    }

    let ua = user_agent.to_ascii_lowercase();
    let best_token = groups
        .iter()
        .flat_map(|g| g.agents.iter())
        .filter(|a| a.as_str() != "*" && !a.is_empty() && ua.contains(a.as_str()))
        .max_by_key(|a| a.len())
        .cloned();
    let token = best_token.unwrap_or_else(|| "*".to_string());

    let mut out = RobotsRules::default();
    for g in groups.into_iter().filter(|g| g.agents.contains(&token)) {
        out.rules.extend(g.rules);
    }
    out
}

/// Glob match with `*` (any run) and trailing `$` (end anchor).
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let parts: Vec<&str> = pattern.split('*').collect();
    let Some(mut rest) = path.strip_prefix(parts[0]) else {
        return false;
    };
    if parts.len() == 1 {
        return !anchored || rest.is_empty();
    }
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate().skip(1) {
        if i == last && anchored {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

/// Location of robots.txt for a page URL.
pub fn robots_url_for(target: &url::Url) -> Option<String> {
    let host = target.host_str()?;
    let port = target.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("{}://{host}{port}/robots.txt", target.scheme()))
}

/// Answers whether a target URL may be fetched.
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    /// `Err` means the policy could not be determined.
    async fn is_allowed(
        &self,
        robots_url: &str,
        target_url: &str,
        user_agent: &str,
    ) -> Result<bool, FetchError>;
}

/// Fetches robots.txt over HTTP and evaluates it.
pub struct RobotsChecker {
    client: HttpClient,
    timeout_ms: u64,
}

impl RobotsChecker {
    pub fn new(client: HttpClient, timeout_ms: u64) -> Self {
        Self { client, timeout_ms }
    }
}

#[async_trait]
impl RobotsPolicy for RobotsChecker {
    async fn is_allowed(
        &self,
        robots_url: &str,
        target_url: &str,
        user_agent: &str,
    ) -> Result<bool, FetchError> {
        let resp = self.client.get(robots_url, self.timeout_ms).await?;
        match resp.status {
            200..=299 => {
                let rules = parse_robots(&resp.body, user_agent);
                let target = url::Url::parse(target_url)
                    .map_err(|e| FetchError::Network(format!("invalid target URL: {e}")))?;
                let path = match target.query() {
                    Some(q) => format!("{}?{q}", target.path()),
                    None => target.path().to_string(),
                };
                let allowed = rules.is_allowed(&path);
                debug!(robots = %robots_url, path = %path, allowed, "robots.txt evaluated");
                Ok(allowed)
            }
            // No robots.txt (or access denied to it) places no restriction.
            400..=499 => Ok(true),
            status => Err(FetchError::Status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
# comment
User-agent: *
Disallow: /private/
Allow: /private/public-page
Disallow: /*.pdf$

User-agent: pagesnap
User-agent: otherbot
Disallow: /no-snap
Crawl-delay: 2

Sitemap: https://example.com/sitemap.xml
";

    #[test]
    fn test_wildcard_group_applies_by_default() {
        let rules = parse_robots(ROBOTS, "Mozilla/5.0 Chrome/131");
        assert!(!rules.is_allowed("/private/secret"));
        assert!(rules.is_allowed("/private/public-page"));
        assert!(!rules.is_allowed("/docs/file.pdf"));
        assert!(rules.is_allowed("/docs/file.pdf?download=1"));
        assert!(rules.is_allowed("/no-snap"));
        assert_eq!(rules.rules.len(), 3);
    }

    #[test]
    fn test_specific_group_replaces_wildcard() {
        let rules = parse_robots(ROBOTS, "Mozilla/5.0 (compatible; PageSnap/0.1)");
        assert!(!rules.is_allowed("/no-snap"));
        assert!(rules.is_allowed("/private/secret"));
        assert_eq!(rules.rules.len(), 1);
    }

    #[test]
    fn test_crawl_delay_starts_a_new_group() {
        let body = "User-agent: pagesnap
Crawl-delay: 5
User-agent: *
Disallow: /
";
        let rules = parse_robots(body, "pagesnap/0.1");
        assert!(rules.is_allowed("/anything"));
        let rules = parse_robots(body, "otherbot");
        assert!(!rules.is_allowed("/anything"));
    }

    #[test]
    fn test_longest_match_and_tie_goes_to_allow() {
        let body = "User-agent: *\nDisallow: /a\nAllow: /a\nDisallow: /b/c\nAllow: /b\n";
        let rules = parse_robots(body, "x");
        assert!(rules.is_allowed("/a/page"));
        assert!(!rules.is_allowed("/b/c/d"));
        assert!(rules.is_allowed("/b/x"));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let rules = parse_robots("User-agent: *\nDisallow:\n", "x");
        assert!(rules.rules.is_empty());
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("/", "/x"));
        assert!(pattern_matches("/*/edit", "/post/1/edit"));
        assert!(pattern_matches("/page$", "/page"));
        assert!(!pattern_matches("/page$", "/page2"));
        assert!(pattern_matches("*.gif$", "/img/a.gif"));
        assert!(!pattern_matches("/x", "/y"));
    }

    #[test]
    fn test_robots_url_for() {
        let u = url::Url::parse("http://localhost:8080/a/b?c=d").unwrap();
        assert_eq!(
            robots_url_for(&u).as_deref(),
            Some("http://localhost:8080/robots.txt")
        );
    }
}
