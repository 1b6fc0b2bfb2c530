//! Path selection for the envelope.

use dashmap::DashMap;

/// Exact paths or `prefix/*` wildcards, with a per-path decision cache.
///
/// The cache only grows; its size is bounded by the number of distinct
/// paths the router accepts.
#[derive(Debug, Default)]
pub struct PathPatterns {
    patterns: Vec<String>,
    cache: DashMap<String, bool>,
}

impl PathPatterns {
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            cache: DashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        if let Some(hit) = self.cache.get(path) {
            return *hit;
        }
        let decision = self.patterns.iter().any(|p| pattern_matches(p, path));
        self.cache.insert(path.to_string(), decision);
        decision
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix("/*") {
        // Plain prefix test: "/api/tasks/*" also covers "/api/tasksXYZ".
        Some(prefix) => path.starts_with(prefix),
        None => pattern == path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_wildcard() {
        let patterns = PathPatterns::new(["/api/login", "/api/tasks/*"]);
        assert!(patterns.matches("/api/login"));
        assert!(!patterns.matches("/api/login/extra"));
        assert!(patterns.matches("/api/tasks/1"));
        assert!(patterns.matches("/api/tasks"));
        assert!(patterns.matches("/api/tasksXYZ"));
        assert!(!patterns.matches("/api/users"));
    }

    #[test]
    fn test_decisions_are_cached() {
        let patterns = PathPatterns::new(["/a/*"]);
        assert!(patterns.matches("/a/1"));
        assert!(!patterns.matches("/b"));
        assert!(patterns.matches("/a/1"));
        assert_eq!(patterns.cached_paths(), 2);
    }

    #[test]
    fn test_empty_never_matches() {
        let patterns = PathPatterns::new(Vec::<String>::new());
        assert!(patterns.is_empty());
        assert!(!patterns.matches("/"));
        assert_eq!(patterns.cached_paths(), 0);
    }
}
