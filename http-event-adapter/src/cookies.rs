//! Request cookie parsing and response cookie formatting.

use std::fmt;

/// A request cookie as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parses a `Cookie` header value, e.g. `a=1; b=2`, appending the pairs to `out`.
/// A pair without `=` is kept as a name with an empty value, empty names are skipped.
pub fn parse_cookie_header(header: &str, out: &mut Vec<Cookie>) {
    for pair in header.split(';') {
        if let Some(cookie) = parse_pair(pair) {
            out.push(cookie);
        }
    }
}

/// Extracts the `name=value` pair from a `Set-Cookie` style value, ignoring its attributes.
pub fn parse_set_cookie(header: &str) -> Option<Cookie> {
    header.split(';').next().and_then(parse_pair)
}

fn parse_pair(pair: &str) -> Option<Cookie> {
    let pair = pair.trim();
    let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Cookie::new(name, value.trim()))
}

/// A cookie set by the application, emitted as `name=value; attr; attr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// Raw attributes such as `Path=/`, `HttpOnly` or `Max-Age=60`
    pub attributes: Vec<String>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        for attribute in &self.attributes {
            write!(f, "; {attribute}")?;
        }
        Ok(())
    }
}
