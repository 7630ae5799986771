//! Decides whether a body travels as base64 or as plain text.

use crate::error::{AdapterError, Result};
use std::str::FromStr;
use tracing::{debug, trace};

/// Content types treated as text unless overridden by the config.
pub const DEFAULT_TEXT_CONTENT_TYPES: &[&str] = &[
    "text/*",
    "application/json",
    "application/javascript",
    "application/xml",
    "application/x-www-form-urlencoded",
    "application/graphql",
    "application/ld+json",
    "image/svg+xml",
    "+json",
    "+xml",
];

/// Which way the body is travelling. Only used for diagnostics: both directions follow the same rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Text,
    Binary,
}

/// A content-type pattern from the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPattern {
    /// `application/json`
    Exact(String),
    /// `text/*`
    Family(String),
    /// `+json`
    Suffix(String),
}

impl ContentPattern {
    /// `essence` is the lowercased `type/subtype` without parameters.
    fn matches(&self, essence: &str) -> bool {
        match self {
            ContentPattern::Exact(v) => essence == v,
            ContentPattern::Family(family) => essence
                .split_once('/')
                .is_some_and(|(t, _)| t == family),
            ContentPattern::Suffix(suffix) => essence
                .split_once('/')
                .is_some_and(|(_, subtype)| subtype.ends_with(suffix.as_str())),
        }
    }
}

impl FromStr for ContentPattern {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s.len() > 1 && s.starts_with('+') && !s.contains('/') {
            return Ok(ContentPattern::Suffix(s));
        }
        match s.split_once('/') {
            Some((t, "*")) if !t.is_empty() && t != "*" => Ok(ContentPattern::Family(t.to_owned())),
            Some((t, subtype)) if !t.is_empty() && !subtype.is_empty() && !s.contains('*') => {
                Ok(ContentPattern::Exact(s))
            }
            _ => Err(AdapterError::InvalidConfig(format!("invalid content-type pattern: {s:?}"))),
        }
    }
}

/// The text/binary MIME allow-list. Rules are checked in order, the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeRules {
    rules: Vec<(ContentPattern, ContentClass)>,
}

impl Default for ContentTypeRules {
    fn default() -> Self {
        let rules = DEFAULT_TEXT_CONTENT_TYPES
            .iter()
            .filter_map(|p| ContentPattern::from_str(p).ok())
            .map(|p| (p, ContentClass::Text))
            .collect();
        Self { rules }
    }
}

impl ContentTypeRules {
    /// Puts `overrides` ahead of the existing rules so they take precedence.
    pub fn with_overrides(mut self, overrides: Vec<(ContentPattern, ContentClass)>) -> Self {
        let mut rules = overrides;
        rules.append(&mut self.rules);
        self.rules = rules;
        self
    }

    /// Classifies a `Content-Type` header value. No content type or no matching rule means binary.
    pub fn classify(&self, content_type: Option<&str>) -> ContentClass {
        let essence = match content_type.and_then(essence) {
            Some(v) => v,
            None => return ContentClass::Binary,
        };

        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(&essence))
            .map(|(_, class)| *class)
            .unwrap_or(ContentClass::Binary)
    }
}

/// Lowercased `type/subtype` part of a content-type header value.
fn essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if essence.is_empty() {
        None
    } else {
        Some(essence)
    }
}

/// Consulted once for the request body and once for the response body of every invocation.
#[derive(Debug, Clone, Default)]
pub struct BinaryContentPolicy {
    rules: ContentTypeRules,
}

impl BinaryContentPolicy {
    pub fn new(rules: ContentTypeRules) -> Self {
        Self { rules }
    }

    pub fn classify(&self, content_type: Option<&str>) -> ContentClass {
        self.rules.classify(content_type)
    }

    /// Returns TRUE if the body is binary.
    /// 1. an explicit flag is trusted
    /// 2. otherwise the content type decides
    /// 3. bytes that are not valid UTF-8 are always binary
    pub fn decide(
        &self,
        direction: Direction,
        declared_base64: Option<bool>,
        content_type: Option<&str>,
        raw: &[u8],
    ) -> bool {
        if let Err(e) = std::str::from_utf8(raw) {
            debug!("{direction:?} body is not valid UTF-8 ({e}), forcing binary: {}", preview_hex(raw));
            return true;
        }

        let is_binary = match declared_base64 {
            Some(flag) => flag,
            None => self.classify(content_type) == ContentClass::Binary,
        };

        trace!(
            "{direction:?} body: declared={declared_base64:?}, content-type={content_type:?}, binary={is_binary}"
        );

        is_binary
    }
}

/// Hex dump of the first bytes of a body for the log.
pub(crate) fn preview_hex(raw: &[u8]) -> String {
    const MAX: usize = 64;
    if raw.len() > MAX {
        format!("{}... ({} bytes)", hex::encode(&raw[..MAX]), raw.len())
    } else {
        hex::encode(raw)
    }
}
