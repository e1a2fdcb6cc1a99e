//! URL path patterns
//!
//! A pattern is a `/`-separated list of segments matched as a prefix of the
//! request path. `*` matches exactly one segment. The bare pattern `/`
//! matches only the root path, otherwise every page would match it.

use crate::error::{CacheError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if pattern.contains(['?', '#']) || pattern.chars().any(char::is_whitespace) {
            return Err(invalid("only the path component may be matched"));
        }

        let segments = path_segments(pattern)
            .map(|segment| match segment {
                "*" => Ok(Segment::Wildcard),
                s if s.contains('*') => Err(invalid("'*' must be a whole segment")),
                s => Ok(Segment::Literal(s.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = path_segments(path).collect();

        if self.segments.is_empty() {
            return path.is_empty();
        }
        if path.len() < self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(path)
            .all(|(segment, part)| match segment {
                Segment::Wildcard => true,
                Segment::Literal(literal) => literal == part,
            })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// An ordered set of patterns; matches when any member does
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<PathPattern>,
}

impl PatternSet {
    pub fn parse<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// The first pattern matching `path`
    pub fn find(&self, path: &str) -> Option<&PathPattern> {
        self.patterns.iter().find(|p| p.matches(path))
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Lowercased extension of the last path segment, if any
pub fn extension_of(path: &str) -> Option<String> {
    let last = path_segments(path).last()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching_by_segment() {
        let pattern = PathPattern::parse("/api/tickets").unwrap();

        assert!(pattern.matches("/api/tickets"));
        assert!(pattern.matches("/api/tickets/42"));
        assert!(pattern.matches("/api/tickets/"));
        assert!(!pattern.matches("/api/ticketsx"));
        assert!(!pattern.matches("/api"));
    }

    #[test]
    fn test_wildcard_segment() {
        let pattern = PathPattern::parse("/api/tickets/*/comments").unwrap();

        assert!(pattern.matches("/api/tickets/42/comments"));
        assert!(pattern.matches("/api/tickets/42/comments/7"));
        assert!(!pattern.matches("/api/tickets/42"));
        assert!(!pattern.matches("/api/tickets/42/history"));
    }

    #[test]
    fn test_root_pattern_matches_only_root() {
        let pattern = PathPattern::parse("/").unwrap();

        assert!(pattern.matches("/"));
        assert!(pattern.matches(""));
        assert!(!pattern.matches("/tickets"));
    }

    #[test]
    fn test_rejects_invalid_patterns() {
        assert!(PathPattern::parse("api/tickets").is_err());
        assert!(PathPattern::parse("/api/tickets?status=open").is_err());
        assert!(PathPattern::parse("/api/tick*").is_err());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("/logo.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("/_next/static/chunk.js").as_deref(), Some("js"));
        assert_eq!(extension_of("/tickets/42"), None);
        assert_eq!(extension_of("/"), None);
        assert_eq!(extension_of("/archive."), None);
    }

    #[test]
    fn test_pattern_set() {
        let set = PatternSet::parse(&["/api/auth/login", "/api/upload"]).unwrap();

        assert!(set.matches("/api/upload/123"));
        assert_eq!(set.find("/api/auth/login").unwrap().as_str(), "/api/auth/login");
        assert!(!set.matches("/api/tickets"));
    }
}
