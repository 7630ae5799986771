use crate::binary::{ContentClass, ContentPattern, ContentTypeRules};
use crate::error::{AdapterError, Result};
use regex::Regex;
use std::env::var;
use tracing::debug;

/// Lambda rejects invocation responses larger than 6 MiB.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 6 * 1024 * 1024;

pub const MAX_RESPONSE_BYTES_VAR: &str = "HTTP_ADAPTER_MAX_RESPONSE_BYTES";
pub const TEXT_CONTENT_TYPES_VAR: &str = "HTTP_ADAPTER_TEXT_CONTENT_TYPES";
pub const BINARY_CONTENT_TYPES_VAR: &str = "HTTP_ADAPTER_BINARY_CONTENT_TYPES";
pub const STRIP_PATH_PREFIX_VAR: &str = "HTTP_ADAPTER_STRIP_PATH_PREFIX";

/// A prefix the integration puts ahead of the routable path, e.g. an API Gateway base path mapping.
#[derive(Debug, Clone)]
pub enum PathPrefix {
    /// Stripped when the path equals it or continues with `/` after it.
    Literal(String),
    /// Stripped when the regex matches at the start of the path.
    Pattern(Regex),
}

impl PathPrefix {
    /// Values starting with `^` are compiled as a regex, anything else is a literal prefix.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.starts_with('^') {
            let regex = Regex::new(value)
                .map_err(|e| AdapterError::InvalidConfig(format!("invalid path prefix regex {value:?}: {e}")))?;
            return Ok(PathPrefix::Pattern(regex));
        }

        let literal = value.trim_end_matches('/');
        if !literal.starts_with('/') {
            return Err(AdapterError::InvalidConfig(format!(
                "path prefix must start with / or ^: {value:?}"
            )));
        }
        Ok(PathPrefix::Literal(literal.to_owned()))
    }

    /// Returns the path without the prefix. The result always starts with `/`.
    pub fn strip<'a>(&self, path: &'a str) -> std::borrow::Cow<'a, str> {
        let rest = match self {
            PathPrefix::Literal(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => Some(rest),
                _ => None,
            },
            PathPrefix::Pattern(regex) => regex
                .find(path)
                .filter(|m| m.start() == 0)
                .map(|m| &path[m.end()..]),
        };

        match rest {
            None => std::borrow::Cow::Borrowed(path),
            Some("") => std::borrow::Cow::Borrowed("/"),
            Some(rest) if rest.starts_with('/') => std::borrow::Cow::Borrowed(rest),
            Some(rest) => std::borrow::Cow::Owned(format!("/{rest}")),
        }
    }
}

/// Adapter settings. See `from_env()` for the env vars they come from.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Ceiling for the serialized response body, in bytes
    pub max_response_bytes: usize,
    /// Text/binary classification of content types
    pub content_types: ContentTypeRules,
    /// Optional prefix stripped from every request path
    pub path_prefix: Option<PathPrefix>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            content_types: ContentTypeRules::default(),
            path_prefix: None,
        }
    }
}

impl AdapterConfig {
    /// Creates a new Config instance from the environment variables.
    /// Uses default values where the vars are not set.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| var(name).ok())
    }

    /// Same as `from_env()`, but reads the values through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(MAX_RESPONSE_BYTES_VAR) {
            config.max_response_bytes = match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(AdapterError::InvalidConfig(format!(
                        "{MAX_RESPONSE_BYTES_VAR} must be a positive integer, got {v:?}"
                    )))
                }
            };
        }

        // binary overrides are listed first so they win when both lists name the same type
        let mut overrides = Vec::new();
        for (name, class) in [
            (BINARY_CONTENT_TYPES_VAR, ContentClass::Binary),
            (TEXT_CONTENT_TYPES_VAR, ContentClass::Text),
        ] {
            if let Some(v) = lookup(name) {
                for pattern in v.split(',').filter(|p| !p.trim().is_empty()) {
                    overrides.push((pattern.parse::<ContentPattern>()?, class));
                }
            }
        }
        config.content_types = config.content_types.with_overrides(overrides);

        if let Some(v) = lookup(STRIP_PATH_PREFIX_VAR).filter(|v| !v.trim().is_empty()) {
            config.path_prefix = Some(PathPrefix::parse(&v)?);
        }

        debug!(
            "Config: max response {}B, path prefix {:?}",
            config.max_response_bytes, config.path_prefix
        );

        Ok(config)
    }
}

/// Returns TRUE if the process was started by the Lambda runtime.
pub fn is_lambda_environment() -> bool {
    var("AWS_LAMBDA_RUNTIME_API").is_ok() || var("AWS_LAMBDA_FUNCTION_NAME").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AdapterConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.max_response_bytes, 6_291_456);
        assert!(config.path_prefix.is_none());
        assert_eq!(config.content_types.classify(Some("text/plain")), ContentClass::Text);
    }

    #[test]
    fn reads_all_vars() {
        let config = AdapterConfig::from_vars(vars(&[
            (MAX_RESPONSE_BYTES_VAR, "1024"),
            (TEXT_CONTENT_TYPES_VAR, "application/wasm, text/csv"),
            (BINARY_CONTENT_TYPES_VAR, "text/csv"),
            (STRIP_PATH_PREFIX_VAR, "/api/"),
        ]))
        .unwrap();
        assert_eq!(config.max_response_bytes, 1024);
        assert_eq!(config.content_types.classify(Some("application/wasm")), ContentClass::Text);
        assert_eq!(config.content_types.classify(Some("text/csv")), ContentClass::Binary);
        assert_eq!(config.path_prefix.unwrap().strip("/api/users"), "/users");
    }

    #[test]
    fn rejects_bad_values() {
        for pairs in [
            [(MAX_RESPONSE_BYTES_VAR, "0")],
            [(MAX_RESPONSE_BYTES_VAR, "6MB")],
            [(TEXT_CONTENT_TYPES_VAR, "*/*")],
            [(STRIP_PATH_PREFIX_VAR, "api")],
            [(STRIP_PATH_PREFIX_VAR, "^(unclosed")],
        ] {
            let err = AdapterConfig::from_vars(vars(&pairs)).unwrap_err();
            assert_eq!(err.kind().as_str(), "InvalidConfig");
        }
    }

    #[test]
    fn literal_prefix_stops_at_segment_boundary() {
        let prefix = PathPrefix::parse("/api").unwrap();
        assert_eq!(prefix.strip("/api"), "/");
        assert_eq!(prefix.strip("/api/v1"), "/v1");
        assert_eq!(prefix.strip("/apiary"), "/apiary");
        assert_eq!(prefix.strip("/other"), "/other");
    }

    #[test]
    fn regex_prefix() {
        let prefix = PathPrefix::parse("^/v[0-9]+").unwrap();
        assert_eq!(prefix.strip("/v2/users"), "/users");
        assert_eq!(prefix.strip("/v2"), "/");
        assert_eq!(prefix.strip("/users/v2"), "/users/v2");
    }
}
