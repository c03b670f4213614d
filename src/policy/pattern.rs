use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` or `{name}`: exactly one segment
    Single,
}

/// A resource path pattern such as `/orders/{id}/items/*` or `/admin/**`.
///
/// Patterns are `/`-separated. A segment is a literal, `*` or `{name}`
/// (one segment each), and the last segment may be `**` (zero or more
/// segments). Literal matching is case-sensitive.
///
/// Paths containing `.` or `..` segments never match, so a pattern cannot be
/// sidestepped by dot-segment tricks the host router might normalize later.
/// Percent-encoded dots (`%2e`, either case) count as dots.
///
/// # Examples
///
/// ```
/// use steak_security::ResourcePattern;
///
/// let pattern: ResourcePattern = "/orders/{id}/**".parse().unwrap();
///
/// assert!(pattern.matches("/orders/42"));
/// assert!(pattern.matches("/orders/42/items/7"));
/// assert!(!pattern.matches("/orders"));
/// assert!(!pattern.matches("/orders/42/../../admin"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    raw: String,
    segments: Vec<Segment>,
    rest: bool,
}

/// Ordering key for pattern specificity; larger is more specific.
///
/// Compared lexicographically: literal segment count, then absence of a
/// trailing `**`, then total segment count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literals: usize,
    exact_length: bool,
    segments: usize,
}

impl ResourcePattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not start
    /// with `/`, uses `**` anywhere but last, has an empty `{}` name, mixes
    /// wildcards into a literal, or contains a `.`/`..` segment.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let parts: Vec<&str> = path_segments(pattern).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut rest = false;

        for (index, part) in parts.iter().enumerate() {
            match *part {
                "**" if index + 1 == parts.len() => rest = true,
                "**" => return Err(invalid("'**' is only allowed as the last segment")),
                "*" => segments.push(Segment::Single),
                "." | ".." => return Err(invalid("dot segments are not allowed")),
                part if part.starts_with('{') && part.ends_with('}') => {
                    let name = &part[1..part.len() - 1];
                    if name.is_empty() || name.contains(['{', '}', '*']) {
                        return Err(invalid("invalid '{name}' segment"));
                    }
                    segments.push(Segment::Single);
                }
                part if part.contains(['*', '{', '}']) => {
                    return Err(invalid("wildcards must span a whole segment"))
                }
                part => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            rest,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if `path` matches the pattern.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path_segments(path).collect();
        if parts.iter().any(|part| is_dot_segment(part)) {
            return false;
        }

        let length_ok = if self.rest {
            parts.len() >= self.segments.len()
        } else {
            parts.len() == self.segments.len()
        };
        if !length_ok {
            return false;
        }

        self.segments
            .iter()
            .zip(parts.iter())
            .all(|(segment, part)| match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Single => true,
            })
    }

    /// How specific the pattern is, for choosing between overlapping policies.
    pub fn specificity(&self) -> Specificity {
        Specificity {
            literals: self
                .segments
                .iter()
                .filter(|segment| matches!(segment, Segment::Literal(_)))
                .count(),
            exact_length: !self.rest,
            segments: self.segments.len(),
        }
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

// `.` or `..`, literally or with any dot written as `%2e`/`%2E`.
fn is_dot_segment(segment: &str) -> bool {
    let mut rest = segment;
    let mut dots = 0;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('.') {
            rest = tail;
        } else if rest.get(..3).is_some_and(|head| head.eq_ignore_ascii_case("%2e")) {
            rest = &rest[3..];
        } else {
            return false;
        }
        dots += 1;
    }
    matches!(dots, 1 | 2)
}

impl FromStr for ResourcePattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> ResourcePattern {
        s.parse().unwrap()
    }

    #[test]
    fn literal_patterns_match_exactly() {
        let p = pattern("/admin/users");
        assert!(p.matches("/admin/users"));
        assert!(p.matches("/admin/users/"));
        assert!(!p.matches("/admin/users/1"));
        assert!(!p.matches("/admin"));
        assert!(!p.matches("/Admin/users"));
    }

    #[test]
    fn single_segment_wildcards() {
        let p = pattern("/orders/{id}/items/*");
        assert!(p.matches("/orders/1/items/2"));
        assert!(!p.matches("/orders/1/items"));
        assert!(!p.matches("/orders/1/items/2/3"));
    }

    #[test]
    fn trailing_double_star_matches_zero_or_more() {
        let p = pattern("/admin/**");
        assert!(p.matches("/admin"));
        assert!(p.matches("/admin/users/7/roles"));
        assert!(!p.matches("/administrator"));

        let everything = pattern("/**");
        assert!(everything.matches("/"));
        assert!(everything.matches("/anything/at/all"));
    }

    #[test]
    fn dot_segments_never_match() {
        let p = pattern("/public/**");
        assert!(!p.matches("/public/../admin"));
        assert!(!p.matches("/public/./x"));
        assert!(!p.matches("/public/%2e%2e/admin"));
        assert!(!p.matches("/public/%2E./admin"));
        assert!(!p.matches("/public/.%2e/admin"));
        assert!(!p.matches("/public/%2e/x"));
        assert!(p.matches("/public/...hidden"));
        assert!(p.matches("/public/%2ex"));
        assert!(p.matches("/public/%2é"));
    }

    #[test]
    fn rejects_bad_patterns() {
        for bad in ["admin", "/a/**/b", "/a/{}", "/a/b*", "/a/../b", "/x{y}"] {
            assert!(
                matches!(ResourcePattern::parse(bad), Err(ConfigError::InvalidPattern { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn specificity_ordering() {
        let exact = pattern("/admin/users").specificity();
        let param = pattern("/admin/{section}").specificity();
        let rest = pattern("/admin/**").specificity();
        let bare_rest = pattern("/admin/users/**").specificity();

        assert!(exact > param);
        assert!(param > rest);
        assert!(exact > bare_rest);
        assert!(bare_rest > param);
    }
}
