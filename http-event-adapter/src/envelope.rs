//! Shapes canonical responses into the envelope expected by the front door the event came from.

use crate::binary::{preview_hex, BinaryContentPolicy, Direction};
use crate::error::{AdapterError, Result};
use crate::event::OriginVariant;
use crate::response::CanonicalResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Repeated header values are joined with this separator in single-value header objects (RFC 7230, 3.2.2).
pub const HEADER_VALUE_SEPARATOR: &str = ", ";

const SET_COOKIE: &str = "set-cookie";

/// Response for Function URLs and API Gateway HTTP APIs (payload format 2.0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseV2 {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

/// Response for API Gateway REST APIs (payload format 1.0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestResponse {
    pub status_code: u16,
    pub multi_value_headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    pub is_base64_encoded: bool,
}

/// Response for ALB target groups. Exactly one of the header objects is set,
/// depending on whether the target group has multi-value headers enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerResponse {
    pub status_code: u16,
    pub status_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_value_headers: Option<BTreeMap<String, Vec<String>>>,
    pub body: String,
    pub is_base64_encoded: bool,
}

/// The JSON document returned to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundEnvelope {
    Http(HttpResponseV2),
    Rest(RestResponse),
    LoadBalancer(LoadBalancerResponse),
}

impl OutboundEnvelope {
    pub fn status_code(&self) -> u16 {
        match self {
            OutboundEnvelope::Http(r) => r.status_code,
            OutboundEnvelope::Rest(r) => r.status_code,
            OutboundEnvelope::LoadBalancer(r) => r.status_code,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            OutboundEnvelope::Http(r) => &r.body,
            OutboundEnvelope::Rest(r) => &r.body,
            OutboundEnvelope::LoadBalancer(r) => &r.body,
        }
    }

    pub fn is_base64_encoded(&self) -> bool {
        match self {
            OutboundEnvelope::Http(r) => r.is_base64_encoded,
            OutboundEnvelope::Rest(r) => r.is_base64_encoded,
            OutboundEnvelope::LoadBalancer(r) => r.is_base64_encoded,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| AdapterError::InvalidResponse(format!("cannot serialize envelope: {e}")))
    }
}

/// Turns canonical responses into outbound envelopes.
#[derive(Debug, Clone, Copy)]
pub struct ResponseSerializer<'a> {
    policy: &'a BinaryContentPolicy,
    max_body_bytes: usize,
}

impl<'a> ResponseSerializer<'a> {
    pub fn new(policy: &'a BinaryContentPolicy, max_body_bytes: usize) -> Self {
        Self { policy, max_body_bytes }
    }

    /// Fails with `ResponseTooLarge` if the body, as it would appear in the envelope, is longer than
    /// the ceiling. The body is never truncated.
    pub fn serialize(&self, response: CanonicalResponse, origin: OriginVariant) -> Result<OutboundEnvelope> {
        if !(100..=599).contains(&response.status) {
            return Err(AdapterError::InvalidResponse(format!(
                "status code {} is outside 100-599",
                response.status
            )));
        }

        let (body, is_base64_encoded) = self.encode_body(&response)?;

        if body.len() > self.max_body_bytes {
            return Err(AdapterError::ResponseTooLarge {
                size: body.len(),
                limit: self.max_body_bytes,
            });
        }

        // cookies are never joined with other values, so they are taken out of the headers up front
        let mut headers = response.headers;
        let mut set_cookies = headers.remove(SET_COOKIE);
        set_cookies.extend(response.cookies.iter().map(|c| c.to_string()));

        let groups: Vec<(String, Vec<String>)> = headers
            .grouped()
            .into_iter()
            .map(|(name, values)| (name.to_owned(), values.into_iter().map(str::to_owned).collect()))
            .collect();

        debug!(
            "Response: {} to {:?}, {}B body, base64: {}, {} cookies",
            response.status,
            origin,
            body.len(),
            is_base64_encoded,
            set_cookies.len()
        );

        let envelope = match origin {
            OriginVariant::FunctionUrl | OriginVariant::ApiGatewayHttp => OutboundEnvelope::Http(HttpResponseV2 {
                status_code: response.status,
                headers: single_value_headers(groups),
                cookies: set_cookies,
                body,
                is_base64_encoded,
            }),
            OriginVariant::ApiGatewayRest => OutboundEnvelope::Rest(RestResponse {
                status_code: response.status,
                multi_value_headers: multi_value_headers(groups, set_cookies),
                body,
                is_base64_encoded,
            }),
            OriginVariant::LoadBalancer { multi_value_headers: true } => {
                OutboundEnvelope::LoadBalancer(LoadBalancerResponse {
                    status_code: response.status,
                    status_description: status_description(response.status),
                    headers: None,
                    multi_value_headers: Some(multi_value_headers(groups, set_cookies)),
                    body,
                    is_base64_encoded,
                })
            }
            OriginVariant::LoadBalancer { multi_value_headers: false } => {
                let mut headers = single_value_headers(groups);
                for (name, cookie) in set_cookie_spellings(set_cookies.len())?.into_iter().zip(set_cookies) {
                    headers.insert(name, cookie);
                }
                OutboundEnvelope::LoadBalancer(LoadBalancerResponse {
                    status_code: response.status,
                    status_description: status_description(response.status),
                    headers: Some(headers),
                    multi_value_headers: None,
                    body,
                    is_base64_encoded,
                })
            }
        };

        Ok(envelope)
    }

    /// Returns the body as it goes into the envelope and the value of `isBase64Encoded`.
    fn encode_body(&self, response: &CanonicalResponse) -> Result<(String, bool)> {
        if response.body.is_empty() {
            return Ok((String::new(), false));
        }

        let is_binary = self.policy.decide(
            Direction::Outbound,
            response.body_is_binary,
            response.content_type(),
            &response.body,
        );

        if is_binary {
            return Ok((BASE64.encode(&response.body), true));
        }

        // the policy forces binary for invalid UTF-8, so this only fails on a bug
        match std::str::from_utf8(&response.body) {
            Ok(text) => Ok((text.to_owned(), false)),
            Err(e) => Err(AdapterError::InvalidResponse(format!(
                "text body is not valid UTF-8: {e}: {}",
                preview_hex(&response.body)
            ))),
        }
    }
}

fn single_value_headers(groups: Vec<(String, Vec<String>)>) -> BTreeMap<String, String> {
    groups
        .into_iter()
        .map(|(name, values)| (name, values.join(HEADER_VALUE_SEPARATOR)))
        .collect()
}

fn multi_value_headers(groups: Vec<(String, Vec<String>)>, set_cookies: Vec<String>) -> BTreeMap<String, Vec<String>> {
    let mut headers: BTreeMap<String, Vec<String>> = groups.into_iter().collect();
    if !set_cookies.is_empty() {
        headers.insert("Set-Cookie".to_owned(), set_cookies);
    }
    headers
}

/// `200 OK`, or just the code if it has no canonical reason phrase.
fn status_description(status: u16) -> String {
    match StatusCode::from_u16(status).ok().and_then(|s| s.canonical_reason()) {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}

/// Distinct spellings of `set-cookie` differing only in letter case.
/// A single-value header object can hold one value per key, but header names are case-insensitive,
/// so every cookie gets a key of its own instead of being merged with the others.
fn set_cookie_spellings(count: usize) -> Result<Vec<String>> {
    let letters = SET_COOKIE.chars().filter(char::is_ascii_alphabetic).count();
    let available = 1usize << letters;
    if count > available {
        return Err(AdapterError::InvalidResponse(format!(
            "{count} cookies cannot be sent without multi-value headers, the maximum is {available}"
        )));
    }

    Ok((0..count)
        .map(|mask| {
            let mut bit = 0;
            SET_COOKIE
                .chars()
                .map(|c| {
                    if !c.is_ascii_alphabetic() {
                        return c;
                    }
                    let upper = mask & (1 << bit) != 0;
                    bit += 1;
                    if upper {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    }
                })
                .collect()
        })
        .collect())
}
