//! Path pattern matching
//!
//! Patterns are slash-separated segments; a segment starting with `:`
//! captures whatever the request has in that position.

use std::collections::HashMap;

use crate::http::percent_decode;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(seg.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path`, returning the captured parameters (percent-decoded)
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut parts = split_segments(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), percent_decode(part, false));
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

/// Non-empty segments of a path, so `/users/` and `/users` are the same
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
