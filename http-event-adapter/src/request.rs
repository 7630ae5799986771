//! Reconstruction of a canonical HTTP request from a classified event.

use crate::binary::{BinaryContentPolicy, ContentClass, Direction};
use crate::config::PathPrefix;
use crate::cookies::{parse_cookie_header, parse_set_cookie, Cookie};
use crate::error::{AdapterError, Result};
use crate::event::{HttpEventV2, InvocationEvent, LoadBalancerEvent, RestEvent};
use crate::fields::{merge_single_and_multi, KeyMatch};
use crate::headers::Headers;
use crate::query::QueryParams;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hyper::body::Bytes;
use hyper::Method;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;

/// Characters escaped when a decoded path is put back into a URI.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// API Gateway HTTP APIs use this stage name when no stage appears in the URL.
const DEFAULT_STAGE: &str = "$default";

/// Per-invocation data handed over by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
    /// Milliseconds since the epoch
    pub deadline_ms: u64,
}

impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(ctx: &lambda_runtime::Context) -> Self {
        Self {
            request_id: ctx.request_id.clone(),
            deadline_ms: ctx.deadline,
        }
    }
}

/// Invocation details attached to the request.
/// Also inserted as an extension into `hyper::Request` by `CanonicalRequest::to_http()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub deadline_ms: u64,
    pub source_ip: Option<String>,
    pub stage: Option<String>,
}

/// The variant-agnostic request handed to the application. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: Method,
    path: String,
    query: QueryParams,
    headers: Headers,
    cookies: Vec<Cookie>,
    body: Bytes,
    body_is_binary: bool,
    context: RequestContext,
}

impl CanonicalRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Decoded path without the query string and without any integration prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// The query parameters encoded back into a query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query.to_query_string()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.iter().find(|c| c.name == name).map(|c| c.value.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_is_binary(&self) -> bool {
        self.body_is_binary
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Converts the request into the `http` types re-exported by hyper.
    /// The `RequestContext` is available as a request extension.
    pub fn to_http(&self) -> Result<hyper::Request<Bytes>> {
        let mut uri = utf8_percent_encode(&self.path, PATH_ESCAPE).to_string();
        if !self.query.is_empty() {
            uri.push('?');
            uri.push_str(&self.query_string());
        }

        let mut builder = hyper::Request::builder().method(self.method.clone()).uri(uri);
        for (name, value) in self.headers.iter() {
            builder = builder.header(name, value);
        }

        builder
            .extension(self.context.clone())
            .body(self.body.clone())
            .map_err(|e| AdapterError::MalformedRequestEvent(format!("not representable as an HTTP request: {e}")))
    }
}

/// Builds canonical requests from classified events.
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    policy: &'a BinaryContentPolicy,
    path_prefix: Option<&'a PathPrefix>,
}

/// Fields common to all variants after the variant-specific reconstruction.
struct RawParts {
    method: Option<String>,
    path: Option<String>,
    /// A stage name that is present in the path and has to be removed from it
    stage_in_path: Option<String>,
    query: QueryParams,
    headers: Headers,
    /// The dedicated cookie array, if the variant has one
    cookie_list: Option<Vec<String>>,
    body: Option<String>,
    is_base64_encoded: Option<bool>,
    source_ip: Option<String>,
    stage: Option<String>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(policy: &'a BinaryContentPolicy, path_prefix: Option<&'a PathPrefix>) -> Self {
        Self { policy, path_prefix }
    }

    /// Fails with `MalformedRequestEvent` if the method or the path are missing or invalid
    /// and with `BodyDecodeError` if a base64 body does not decode.
    pub fn build(&self, event: InvocationEvent, ctx: &InvocationContext) -> Result<CanonicalRequest> {
        let parts = match event {
            InvocationEvent::FunctionUrl(event) | InvocationEvent::ApiGatewayHttp(event) => from_v2(event),
            InvocationEvent::ApiGatewayRest(event) => from_rest(event),
            InvocationEvent::LoadBalancer(event) => from_load_balancer(event),
        };
        self.finish(parts, ctx)
    }

    fn finish(&self, parts: RawParts, ctx: &InvocationContext) -> Result<CanonicalRequest> {
        let method = parse_method(parts.method.as_deref())?;
        let path = self.normalize_path(parts.path.as_deref(), parts.stage_in_path.as_deref())?;

        let mut headers = parts.headers;
        let cookies = match parts.cookie_list {
            Some(list) => {
                let mut cookies = Vec::new();
                for entry in &list {
                    parse_cookie_header(entry, &mut cookies);
                }
                // header-based applications expect the cookies in the Cookie header
                if !list.is_empty() && !headers.contains("cookie") {
                    headers.append("cookie", list.join("; "));
                }
                cookies
            }
            None => cookies_from_headers(&headers),
        };

        let (body, body_is_binary) = self.decode_body(parts.body, parts.is_base64_encoded, &headers)?;

        Ok(CanonicalRequest {
            method,
            path,
            query: parts.query,
            headers,
            cookies,
            body,
            body_is_binary,
            context: RequestContext {
                request_id: ctx.request_id.clone(),
                deadline_ms: ctx.deadline_ms,
                source_ip: parts.source_ip,
                stage: parts.stage,
            },
        })
    }

    /// Decodes the path, drops the query string and strips the stage and the configured prefix.
    fn normalize_path(&self, raw: Option<&str>, stage: Option<&str>) -> Result<String> {
        let raw = match raw {
            Some(v) if !v.is_empty() => v,
            _ => return Err(AdapterError::MalformedRequestEvent("missing path".to_owned())),
        };

        let raw = raw.split_once('?').map_or(raw, |(path, _)| path);
        if !raw.starts_with('/') {
            return Err(AdapterError::MalformedRequestEvent(format!("path must start with /: {raw:?}")));
        }

        let decoded = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|e| AdapterError::MalformedRequestEvent(format!("path is not valid UTF-8 when decoded: {e}")))?;

        let mut path = match stage {
            Some(stage) => PathPrefix::Literal(format!("/{stage}")).strip(&decoded).into_owned(),
            None => decoded.into_owned(),
        };

        if let Some(prefix) = self.path_prefix {
            path = prefix.strip(&path).into_owned();
        }

        Ok(path)
    }

    fn decode_body(&self, body: Option<String>, flag: Option<bool>, headers: &Headers) -> Result<(Bytes, bool)> {
        let text = match body {
            Some(v) if !v.is_empty() => v,
            _ => return Ok((Bytes::new(), false)),
        };

        let content_type = headers.get("content-type");

        // without a flag only the content type can tell if the body was encoded
        let encoded = flag.unwrap_or_else(|| self.policy.classify(content_type) == ContentClass::Binary);

        let bytes = if encoded { BASE64.decode(text.as_bytes())? } else { text.into_bytes() };

        let is_binary = self.policy.decide(Direction::Inbound, flag, content_type, &bytes);

        Ok((Bytes::from(bytes), is_binary))
    }
}

fn parse_method(raw: Option<&str>) -> Result<Method> {
    let raw = match raw.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Err(AdapterError::MalformedRequestEvent("missing HTTP method".to_owned())),
    };

    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| AdapterError::MalformedRequestEvent(format!("invalid HTTP method: {raw:?}")))
}

/// Cookies sent in `Cookie` headers, followed by the name/value pairs of any `Set-Cookie` headers.
fn cookies_from_headers(headers: &Headers) -> Vec<Cookie> {
    let mut cookies = Vec::new();
    for value in headers.get_all("cookie") {
        parse_cookie_header(value, &mut cookies);
    }
    cookies.extend(headers.get_all("set-cookie").into_iter().filter_map(parse_set_cookie));
    cookies
}

fn headers_from_groups(groups: Vec<(String, Vec<String>)>) -> Headers {
    groups
        .into_iter()
        .flat_map(|(name, values)| values.into_iter().map(move |v| (name.clone(), v)))
        .collect()
}

fn from_v2(event: HttpEventV2) -> RawParts {
    let ctx = event.request_context.unwrap_or_default();
    let http = ctx.http.unwrap_or_default();

    // the raw query string is the only source of repeated keys, the map has them comma-joined
    let query = match event.raw_query_string.as_deref() {
        Some(raw) if !raw.is_empty() => QueryParams::parse(raw),
        _ => event
            .query_string_parameters
            .map(|map| map.0.into_iter().collect())
            .unwrap_or_default(),
    };

    let headers: Headers = event.headers.map(|map| map.0.into_iter().collect()).unwrap_or_default();

    let stage_in_path = ctx.stage.clone().filter(|s| s != DEFAULT_STAGE && !s.is_empty());

    debug!("v2 event: rawPath={:?}, stage={:?}", event.raw_path, ctx.stage);

    RawParts {
        method: http.method,
        path: event.raw_path.or(http.path),
        stage_in_path,
        query,
        headers,
        // without a cookie array the Cookie header is the source
        cookie_list: event.cookies.filter(|c| !c.is_empty()),
        body: event.body,
        is_base64_encoded: event.is_base64_encoded,
        source_ip: http.source_ip,
        stage: ctx.stage,
    }
}

fn from_rest(event: RestEvent) -> RawParts {
    let ctx = event.request_context.unwrap_or_default();

    let query = QueryParams::from_grouped(merge_single_and_multi(
        event.query_string_parameters.as_ref(),
        event.multi_value_query_string_parameters.as_ref(),
        KeyMatch::Exact,
    ));

    let headers = headers_from_groups(merge_single_and_multi(
        event.headers.as_ref(),
        event.multi_value_headers.as_ref(),
        KeyMatch::CaseInsensitive,
    ));

    RawParts {
        method: event.http_method,
        path: event.path,
        stage_in_path: None,
        query,
        headers,
        cookie_list: None,
        body: event.body,
        is_base64_encoded: event.is_base64_encoded,
        source_ip: ctx.identity.and_then(|i| i.source_ip),
        stage: ctx.stage,
    }
}

fn from_load_balancer(event: LoadBalancerEvent) -> RawParts {
    // ALB passes the query string through as received, so keys and values are still encoded
    let query: QueryParams = merge_single_and_multi(
        event.query_string_parameters.as_ref(),
        event.multi_value_query_string_parameters.as_ref(),
        KeyMatch::Exact,
    )
    .into_iter()
    .flat_map(|(key, values)| {
        let key = decode_form_component(&key);
        values.into_iter().map(move |v| (key.clone(), decode_form_component(&v)))
    })
    .collect();

    let headers = headers_from_groups(merge_single_and_multi(
        event.headers.as_ref(),
        event.multi_value_headers.as_ref(),
        KeyMatch::CaseInsensitive,
    ));

    // the load balancer appends the peer address, anything before it comes from the client
    let source_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.rsplit(',').next())
        .map(|v| v.trim().to_owned());

    RawParts {
        method: event.http_method,
        path: event.path,
        stage_in_path: None,
        query,
        headers,
        cookie_list: None,
        body: event.body,
        is_base64_encoded: event.is_base64_encoded,
        source_ip,
        stage: None,
    }
}

/// Decodes one `application/x-www-form-urlencoded` component: `+` is a space, `%XX` an escaped byte.
fn decode_form_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}
