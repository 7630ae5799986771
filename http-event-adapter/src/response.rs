use crate::cookies::SetCookie;
use crate::error::{AdapterError, Result};
use crate::headers::Headers;
use hyper::body::Bytes;

/// The response produced by the application.
/// It is consumed exactly once by the serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalResponse {
    /// 100-599, passed through unchanged
    pub status: u16,
    pub headers: Headers,
    /// Emitted after any `Set-Cookie` values found in `headers`
    pub cookies: Vec<SetCookie>,
    pub body: Bytes,
    /// Some(TRUE) forces base64, Some(FALSE) asks for plain text,
    /// None leaves it to the content type. Bytes that are not valid UTF-8 are base64-encoded regardless.
    pub body_is_binary: Option<bool>,
}

impl CanonicalResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            body_is_binary: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_cookie(mut self, cookie: SetCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_binary_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.body_is_binary = Some(true);
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Converts a response built with the `http` types re-exported by hyper.
    pub fn from_http(response: hyper::Response<Bytes>) -> Result<Self> {
        let (parts, body) = response.into_parts();

        let mut headers = Headers::new();
        for (name, value) in parts.headers.iter() {
            let value = value.to_str().map_err(|e| {
                AdapterError::InvalidResponse(format!("header {name} is not visible ASCII: {e}"))
            })?;
            headers.append(name.as_str(), value);
        }

        Ok(Self {
            status: parts.status.as_u16(),
            headers,
            cookies: Vec::new(),
            body,
            body_is_binary: None,
        })
    }
}
