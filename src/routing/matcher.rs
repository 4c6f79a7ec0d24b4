//! Path pattern parsing and matching.
//!
//! # Responsibilities
//! - Parse path templates with `{name}` parameters and a trailing `{*name}` wildcard
//! - Match concrete request paths against a template
//! - Detect templates that would capture the same set of paths
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - A parameter matches exactly one non-empty segment
//! - A wildcard matches one or more remaining segments and must be last
//! - No regex to guarantee O(n) matching

use std::fmt;

use thiserror::Error;

/// Error raised for malformed path templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{0}' has an empty or malformed parameter")]
    BadParameter(String),

    #[error("pattern '{0}' has a wildcard that is not the last segment")]
    WildcardNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(String),
}

/// A parsed path template such as `/internal/resource/{resourceID}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathPattern {
    /// Parse a template.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        }

        let trimmed = &raw[1..];
        let trailing_slash = raw.len() > 1 && raw.ends_with('/');
        let body = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut segments = Vec::new();
        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.into_iter().enumerate() {
                let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                    Some(inner) => match inner.strip_prefix('*') {
                        Some(name) if valid_name(name) => {
                            if i != last || trailing_slash {
                                return Err(PatternError::WildcardNotLast(raw.to_string()));
                            }
                            Segment::Wildcard(name.to_string())
                        }
                        Some(_) => return Err(PatternError::BadParameter(raw.to_string())),
                        None if valid_name(inner) => Segment::Param(inner.to_string()),
                        None => return Err(PatternError::BadParameter(raw.to_string())),
                    },
                    None if part.is_empty() || part.contains(['{', '}']) => {
                        return Err(PatternError::BadParameter(raw.to_string()))
                    }
                    None => Segment::Literal(part.to_string()),
                };
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            trailing_slash,
        })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a concrete path, returning the captured parameters in order.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let rest = path.strip_prefix('/')?;
        let has_trailing = path.len() > 1 && path.ends_with('/');
        let body = rest.strip_suffix('/').unwrap_or(rest);
        let parts: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        let mut params = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard(name) => {
                    let tail = parts.get(i..).filter(|t| !t.is_empty())?;
                    let mut value = tail.join("/");
                    if has_trailing {
                        value.push('/');
                    }
                    params.push((name.clone(), value));
                    return Some(params);
                }
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i).filter(|v| !v.is_empty())?;
                    params.push((name.clone(), value.to_string()));
                }
            }
        }

        (parts.len() == self.segments.len() && has_trailing == self.trailing_slash)
            .then_some(params)
    }

    /// Whether the two templates capture the same paths (parameter names aside).
    pub fn overlaps(&self, other: &PathPattern) -> bool {
        self.trailing_slash == other.trailing_slash
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    (Segment::Wildcard(_), Segment::Wildcard(_)) => true,
                    _ => false,
                })
    }

    /// Number of parameter and wildcard segments, used to rank literal matches first.
    pub fn dynamic_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern() {
        let p = PathPattern::parse("/internal/resource").unwrap();
        assert_eq!(p.matches("/internal/resource"), Some(vec![]));
        assert_eq!(p.matches("/internal/resource/"), None);
        assert_eq!(p.matches("/internal"), None);
        assert_eq!(p.matches("/Internal/resource"), None);
    }

    #[test]
    fn parameter_pattern() {
        let p = PathPattern::parse("/internal/resource/{resourceID}").unwrap();
        assert_eq!(
            p.matches("/internal/resource/abc"),
            Some(vec![("resourceID".into(), "abc".into())])
        );
        assert_eq!(p.matches("/internal/resource"), None);
        assert_eq!(p.matches("/internal/resource/abc/def"), None);
    }

    #[test]
    fn wildcard_pattern() {
        let p = PathPattern::parse("/static/{*path}").unwrap();
        assert_eq!(
            p.matches("/static/css/app.css"),
            Some(vec![("path".into(), "css/app.css".into())])
        );
        assert_eq!(p.matches("/static/"), None);
        assert_eq!(p.matches("/static"), None);
    }

    #[test]
    fn root_and_trailing_slash() {
        let root = PathPattern::parse("/").unwrap();
        assert_eq!(root.matches("/"), Some(vec![]));
        assert_eq!(root.matches("/ui"), None);

        let ui = PathPattern::parse("/ui/").unwrap();
        assert_eq!(ui.matches("/ui/"), Some(vec![]));
        assert_eq!(ui.matches("/ui"), None);
    }

    #[test]
    fn malformed_patterns_rejected() {
        assert!(matches!(
            PathPattern::parse("internal"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a/{}"),
            Err(PatternError::BadParameter(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a/{*rest}/b"),
            Err(PatternError::WildcardNotLast(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a//b"),
            Err(PatternError::BadParameter(_))
        ));
    }

    #[test]
    fn overlap_ignores_parameter_names() {
        let a = PathPattern::parse("/resource/{id}").unwrap();
        let b = PathPattern::parse("/resource/{resourceID}").unwrap();
        let c = PathPattern::parse("/resource/provider").unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.dynamic_segments(), 1);
        assert_eq!(c.dynamic_segments(), 0);
    }
}
