//! robots.txt parsing and the per-origin policy cache.
//!
//! The cache is owned by one [`crate::FetchClient`] instance rather than
//! living in process-global state, so tests can inject a preloaded policy
//! and concurrent collectors sharing a client contend only on the mutex.

use std::collections::HashMap;

use tokio::sync::Mutex;

/// One `User-agent:` group with its ordered allow/disallow rules.
#[derive(Debug, Clone)]
struct RuleGroup {
    agents: Vec<String>,
    /// `(allow, path_prefix)` in file order.
    rules: Vec<(bool, String)>,
}

/// Parsed robots.txt for one origin.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<RuleGroup>,
}

impl RobotsPolicy {
    /// Parse robots.txt text. Unknown directives are ignored; a file with no
    /// recognizable groups allows everything.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut current: Option<RuleGroup> = None;
        // Consecutive User-agent lines share one group until a rule appears.
        let mut agents_open = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if agents_open {
                        if let Some(group) = current.as_mut() {
                            group.agents.push(value.to_ascii_lowercase());
                        }
                    } else {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(RuleGroup {
                            agents: vec![value.to_ascii_lowercase()],
                            rules: Vec::new(),
                        });
                        agents_open = true;
                    }
                }
                "disallow" | "allow" => {
                    agents_open = false;
                    if let Some(group) = current.as_mut() {
                        // An empty Disallow value means "allow everything";
                        // recording no rule gets the same default.
                        if !value.is_empty() {
                            group.rules.push((field == "allow", value.to_string()));
                        }
                    }
                }
                _ => {
                    agents_open = false;
                }
            }
        }
        if let Some(group) = current.take() {
            groups.push(group);
        }

        Self { groups }
    }

    /// Whether `user_agent` may fetch `path` under this policy.
    ///
    /// The most specific matching group wins (exact token over `*`); within a
    /// group the longest matching path prefix decides; no match means allowed.
    #[must_use]
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let ua = user_agent.to_ascii_lowercase();

        let specific = self
            .groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())));
        let group = specific
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        let Some(group) = group else {
            return true;
        };

        let mut best: Option<(usize, bool)> = None;
        for (allow, prefix) in &group.rules {
            if path.starts_with(prefix.as_str())
                && best.is_none_or(|(len, _)| prefix.len() > len)
            {
                best = Some((prefix.len(), *allow));
            }
        }

        best.map_or(true, |(_, allow)| allow)
    }
}

/// Per-origin robots.txt cache. `None` records an origin whose robots.txt
/// could not be fetched: treated as allowed, but not re-fetched.
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Option<RobotsPolicy>>>,
}

impl RobotsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached policy for `origin`. Outer `None` = not cached yet.
    pub async fn get(&self, origin: &str) -> Option<Option<RobotsPolicy>> {
        self.entries.lock().await.get(origin).cloned()
    }

    pub async fn insert(&self, origin: String, policy: Option<RobotsPolicy>) {
        self.entries.lock().await.insert(origin, policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# sample
User-agent: *
Disallow: /private/
Allow: /private/press/

User-agent: stagesignal
Disallow: /embargoed/
";

    #[test]
    fn wildcard_group_applies_to_unknown_agents() {
        let policy = RobotsPolicy::parse(SAMPLE);
        assert!(!policy.is_allowed("somebot/1.0", "/private/data"));
        assert!(policy.is_allowed("somebot/1.0", "/public/page"));
    }

    #[test]
    fn longest_prefix_wins() {
        let policy = RobotsPolicy::parse(SAMPLE);
        assert!(policy.is_allowed("somebot/1.0", "/private/press/release"));
    }

    #[test]
    fn specific_agent_group_preferred_over_wildcard() {
        let policy = RobotsPolicy::parse(SAMPLE);
        // The named group has no /private/ rule, so it falls to allowed.
        assert!(policy.is_allowed("stagesignal/0.1", "/private/data"));
        assert!(!policy.is_allowed("stagesignal/0.1", "/embargoed/doc"));
    }

    #[test]
    fn empty_file_allows_everything() {
        let policy = RobotsPolicy::parse("");
        assert!(policy.is_allowed("anybot", "/anything"));
    }

    #[test]
    fn empty_disallow_means_allow_all() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow:\n");
        assert!(policy.is_allowed("anybot", "/anything"));
    }

    #[test]
    fn disallow_root_blocks_all_paths() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /\n");
        assert!(!policy.is_allowed("anybot", "/"));
        assert!(!policy.is_allowed("anybot", "/any/path"));
    }

    #[tokio::test]
    async fn cache_roundtrip() {
        let cache = RobotsCache::new();
        assert!(cache.get("https://example.com").await.is_none());
        cache
            .insert("https://example.com".to_string(), None)
            .await;
        assert!(matches!(cache.get("https://example.com").await, Some(None)));
    }
}
