//! Path patterns.
//!
//! A pattern is a sequence of literal segments and `*` wildcards. An inner
//! `*` matches exactly one path segment; a trailing `*` matches one or more.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("path pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("path pattern `{0}` mixes `*` with literal text in one segment")]
    PartialWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        }
        let mut segments = Vec::new();
        for part in raw.split('/').filter(|s| !s.is_empty()) {
            if part == "*" {
                segments.push(Segment::Wildcard);
            } else if part.contains('*') {
                return Err(PatternError::PartialWildcard(raw.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as written at registration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The literal root `/`.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn ends_with_wildcard(&self) -> bool {
        self.raw.ends_with('*')
    }

    /// Canonical text, used to group routes sharing a pattern.
    pub fn canonical(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Wildcard => out.push('*'),
            }
        }
        out
    }

    /// Whether `path` (already normalized) matches.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last = self.segments.len().saturating_sub(1);
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard if i == last => return parts.len() > i,
                Segment::Wildcard => {
                    if i >= parts.len() {
                        return false;
                    }
                }
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.len() == self.segments.len()
    }

    /// Whether this pattern lies under `prefix` (segment-wise).
    pub fn starts_with(&self, prefix: &str) -> bool {
        let canonical = self.canonical();
        let prefix = normalize_path(prefix);
        prefix == "/" || canonical == prefix || canonical.starts_with(&format!("{prefix}/"))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Collapse repeated slashes and drop any trailing slash.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for part in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(PathPattern::parse("/").unwrap().is_root());
        assert_eq!(
            PathPattern::parse("files").unwrap_err(),
            PatternError::MissingLeadingSlash("files".into())
        );
        assert!(matches!(
            PathPattern::parse("/a*"),
            Err(PatternError::PartialWildcard(_))
        ));
        assert_eq!(PathPattern::parse("//a//b/").unwrap().canonical(), "/a/b");
    }

    #[test]
    fn test_matching() {
        let exact = PathPattern::parse("/users/list").unwrap();
        assert!(exact.matches("/users/list"));
        assert!(!exact.matches("/users"));
        assert!(!exact.matches("/users/list/more"));

        let inner = PathPattern::parse("/users/*/profile").unwrap();
        assert!(inner.matches("/users/7/profile"));
        assert!(!inner.matches("/users/profile"));

        let trailing = PathPattern::parse("/static/*").unwrap();
        assert!(trailing.matches("/static/css/site.css"));
        assert!(trailing.matches("/static/a"));
        assert!(!trailing.matches("/static"));

        let root = PathPattern::parse("/").unwrap();
        assert!(root.matches("/"));
        assert!(!root.matches("/a"));
        assert!(!PathPattern::parse("/*").unwrap().matches("/"));
    }

    #[test]
    fn test_prefix() {
        let pattern = PathPattern::parse("/admin/users").unwrap();
        assert!(pattern.starts_with("/admin"));
        assert!(pattern.starts_with("/admin/"));
        assert!(!pattern.starts_with("/adm"));
        assert!(PathPattern::parse("/admin").unwrap().starts_with("/admin"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//a///b/"), "/a/b");
        assert_eq!(normalize_path("/"), "/");
    }
}
