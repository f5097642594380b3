//! Robots.txt rules backed by the robotstxt crate

use robotstxt::DefaultMatcher;

/// Robots.txt rules for one host
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    policy: Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// Evaluate `content` with the robots matcher
    Rules,
    /// No robots.txt (missing file, network error): everything allowed
    AllowAll,
    /// Access to robots.txt itself was refused: nothing allowed
    DisallowAll,
}

impl ParsedRobots {
    /// Wraps the raw robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            policy: Policy::Rules,
        }
    }

    /// Permissive rules used when robots.txt is absent or unreachable
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            policy: Policy::AllowAll,
        }
    }

    /// Restrictive rules used when robots.txt answers 401 or 403
    pub fn disallow_all() -> Self {
        Self {
            content: String::new(),
            policy: Policy::DisallowAll,
        }
    }

    /// Checks if `url` (absolute) may be fetched by the given product token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.policy {
            Policy::AllowAll => true,
            Policy::DisallowAll => false,
            Policy::Rules if self.content.trim().is_empty() => true,
            Policy::Rules => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("https://example.com/admin", "HarvestBot"));
    }

    #[test]
    fn test_disallow_all() {
        let robots = ParsedRobots::disallow_all();
        assert!(!robots.is_allowed("https://example.com/", "HarvestBot"));
    }

    #[test]
    fn test_disallow_prefix() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private");
        assert!(robots.is_allowed("https://example.com/docs", "HarvestBot"));
        assert!(!robots.is_allowed("https://example.com/private/notes", "HarvestBot"));
    }

    #[test]
    fn test_agent_specific_group() {
        let content = "User-agent: HarvestBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("https://example.com/page", "HarvestBot"));
        assert!(robots.is_allowed("https://example.com/page", "OtherBot"));
    }

    #[test]
    fn test_garbage_content_allows() {
        let robots = ParsedRobots::from_content("<html>not robots</html>");
        assert!(robots.is_allowed("https://example.com/page", "HarvestBot"));
    }

    #[test]
    fn test_empty_content_allows() {
        let robots = ParsedRobots::from_content("  \n");
        assert!(robots.is_allowed("https://example.com/page", "HarvestBot"));
    }
}
