//! Invocation events as sent by the four front doors and their classification.
//!
//! Sample payloads:
//! - Function URL: https://docs.aws.amazon.com/lambda/latest/dg/urls-invocation.html#urls-payloads
//! - API Gateway HTTP API (v2) and REST API (v1):
//!   https://docs.aws.amazon.com/apigateway/latest/developerguide/http-api-develop-integrations-lambda.html
//! - ALB: https://docs.aws.amazon.com/elasticloadbalancing/latest/application/lambda-functions.html
//!
//! Only the fields of interest are deserialized, the rest is ignored.

use crate::error::{AdapterError, Result};
use crate::fields::FieldMap;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// The front door an event came from, as far as the structure of the payload tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    FunctionUrl,
    ApiGatewayHttp,
    ApiGatewayRest,
    LoadBalancer,
}

/// The envelope the response has to be shaped into.
/// It is the `EventKind` plus what the load balancer needs to know about its target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginVariant {
    FunctionUrl,
    ApiGatewayHttp,
    ApiGatewayRest,
    /// `multi_value_headers` is TRUE if the target group has multi-value headers enabled
    LoadBalancer { multi_value_headers: bool },
}

/// A classified invocation event.
#[derive(Debug, Clone)]
pub enum InvocationEvent {
    FunctionUrl(HttpEventV2),
    ApiGatewayHttp(HttpEventV2),
    ApiGatewayRest(RestEvent),
    LoadBalancer(LoadBalancerEvent),
}

impl InvocationEvent {
    /// Classifies the payload and extracts the fields of the matching variant.
    /// Fails with `UnrecognizedEventShape` before any field is extracted if the shape is unknown,
    /// and with `MalformedRequestEvent` if a known shape carries fields of the wrong type.
    pub fn from_value(payload: Value) -> Result<Self> {
        let kind = classify(&payload)?;
        debug!("Event classified as {kind:?}");

        Ok(match kind {
            EventKind::FunctionUrl => InvocationEvent::FunctionUrl(extract(payload, kind)?),
            EventKind::ApiGatewayHttp => InvocationEvent::ApiGatewayHttp(extract(payload, kind)?),
            EventKind::ApiGatewayRest => InvocationEvent::ApiGatewayRest(extract(payload, kind)?),
            EventKind::LoadBalancer => InvocationEvent::LoadBalancer(extract(payload, kind)?),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            InvocationEvent::FunctionUrl(_) => EventKind::FunctionUrl,
            InvocationEvent::ApiGatewayHttp(_) => EventKind::ApiGatewayHttp,
            InvocationEvent::ApiGatewayRest(_) => EventKind::ApiGatewayRest,
            InvocationEvent::LoadBalancer(_) => EventKind::LoadBalancer,
        }
    }

    /// Where the response has to go. Must be recorded before the event is consumed by the request builder.
    pub fn origin(&self) -> OriginVariant {
        match self {
            InvocationEvent::FunctionUrl(_) => OriginVariant::FunctionUrl,
            InvocationEvent::ApiGatewayHttp(_) => OriginVariant::ApiGatewayHttp,
            InvocationEvent::ApiGatewayRest(_) => OriginVariant::ApiGatewayRest,
            InvocationEvent::LoadBalancer(event) => OriginVariant::LoadBalancer {
                multi_value_headers: event.multi_value_headers.is_some()
                    || event.multi_value_query_string_parameters.is_some(),
            },
        }
    }
}

fn extract<T: DeserializeOwned>(payload: Value, kind: EventKind) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| AdapterError::MalformedRequestEvent(format!("{kind:?} event: {e}")))
}

/// Only the presence of the discriminating nodes is checked, their contents are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeProbe {
    #[serde(default)]
    request_context: Option<ContextProbe>,
    #[serde(default)]
    http_method: Option<IgnoredAny>,
    #[serde(default)]
    raw_path: Option<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextProbe {
    #[serde(default)]
    elb: Option<IgnoredAny>,
    #[serde(default)]
    http: Option<IgnoredAny>,
    #[serde(default)]
    domain_name: Option<Value>,
}

/// Function URLs are served from `<url-id>.lambda-url.<region>.on.aws`.
const FUNCTION_URL_DOMAIN_MARKER: &str = ".lambda-url.";

/// Determines the wire variant from the structure of the payload.
/// Precedence: `requestContext.elb`, then `requestContext.http`, then top-level `httpMethod`,
/// then top-level `rawPath`. Anything else is rejected.
/// A v2 payload served from a Function URL domain is reported as `FunctionUrl`, which only affects logging.
pub fn classify(payload: &Value) -> Result<EventKind> {
    if !payload.is_object() {
        return Err(AdapterError::UnrecognizedEventShape(format!(
            "expected a JSON object, got {}",
            json_type(payload)
        )));
    }

    let probe = ShapeProbe::deserialize(payload)
        .map_err(|e| AdapterError::UnrecognizedEventShape(format!("unexpected requestContext: {e}")))?;

    let (has_elb, has_http, domain_name) = match probe.request_context {
        Some(ctx) => (ctx.elb.is_some(), ctx.http.is_some(), ctx.domain_name),
        None => (false, false, None),
    };

    match (has_elb, has_http, probe.http_method.is_some(), probe.raw_path.is_some()) {
        (true, _, _, _) => Ok(EventKind::LoadBalancer),
        (false, true, _, _) => {
            // both take the v2 response envelope, so this only changes what is logged
            let is_function_url = domain_name
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|d| d.contains(FUNCTION_URL_DOMAIN_MARKER));
            if is_function_url {
                Ok(EventKind::FunctionUrl)
            } else {
                Ok(EventKind::ApiGatewayHttp)
            }
        }
        (false, false, true, _) => Ok(EventKind::ApiGatewayRest),
        (false, false, false, true) => Ok(EventKind::FunctionUrl),
        (false, false, false, false) => Err(AdapterError::UnrecognizedEventShape(
            "none of requestContext.elb, requestContext.http, httpMethod or rawPath is present".to_owned(),
        )),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Payload format 2.0, shared by Function URLs and API Gateway HTTP APIs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEventV2 {
    #[serde(default)]
    pub raw_path: Option<String>,
    #[serde(default)]
    pub raw_query_string: Option<String>,
    #[serde(default)]
    pub cookies: Option<Vec<String>>,
    /// Repeated headers arrive comma-joined
    #[serde(default)]
    pub headers: Option<FieldMap<String>>,
    /// Repeated keys arrive comma-joined
    #[serde(default)]
    pub query_string_parameters: Option<FieldMap<String>>,
    #[serde(default)]
    pub request_context: Option<HttpContextV2>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpContextV2 {
    #[serde(default)]
    pub http: Option<HttpDescriptionV2>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescriptionV2 {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub source_ip: Option<String>,
}

/// Payload format 1.0 of API Gateway REST APIs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestEvent {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub headers: Option<FieldMap<String>>,
    #[serde(default)]
    pub multi_value_headers: Option<FieldMap<Vec<String>>>,
    #[serde(default)]
    pub query_string_parameters: Option<FieldMap<String>>,
    #[serde(default)]
    pub multi_value_query_string_parameters: Option<FieldMap<Vec<String>>>,
    #[serde(default)]
    pub request_context: Option<RestContext>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestContext {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub identity: Option<RestIdentity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestIdentity {
    #[serde(default)]
    pub source_ip: Option<String>,
}

/// ALB target group event. Depending on the target group settings either the single-value
/// or the multi-value maps are present, never both.
/// Query parameters arrive still percent-encoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerEvent {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub headers: Option<FieldMap<String>>,
    #[serde(default)]
    pub multi_value_headers: Option<FieldMap<Vec<String>>>,
    #[serde(default)]
    pub query_string_parameters: Option<FieldMap<String>>,
    #[serde(default)]
    pub multi_value_query_string_parameters: Option<FieldMap<Vec<String>>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_precedence() {
        let alb = json!({"requestContext": {"elb": {"targetGroupArn": "arn"}}, "httpMethod": "GET", "path": "/"});
        assert_eq!(classify(&alb).unwrap(), EventKind::LoadBalancer);

        let v2 = json!({"rawPath": "/", "requestContext": {"http": {"method": "GET"}, "domainName": "id.execute-api.us-east-1.amazonaws.com"}});
        assert_eq!(classify(&v2).unwrap(), EventKind::ApiGatewayHttp);

        let furl = json!({"rawPath": "/", "requestContext": {"http": {"method": "GET"}, "domainName": "abc.lambda-url.us-east-1.on.aws"}});
        assert_eq!(classify(&furl).unwrap(), EventKind::FunctionUrl);

        let v1 = json!({"httpMethod": "GET", "path": "/", "requestContext": {"stage": "prod"}});
        assert_eq!(classify(&v1).unwrap(), EventKind::ApiGatewayRest);

        let bare = json!({"rawPath": "/"});
        assert_eq!(classify(&bare).unwrap(), EventKind::FunctionUrl);
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for payload in [
            json!({"Records": [{"eventSource": "aws:sqs"}]}),
            json!({"requestContext": {"elb": null}, "path": "/"}),
            json!({"requestContext": "nope", "httpMethod": "GET"}),
            json!("GET /"),
            json!(null),
        ] {
            let err = classify(&payload).unwrap_err();
            assert_eq!(err.kind().as_str(), "UnrecognizedEventShape", "{payload}");
        }
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        let payload = json!({"httpMethod": "GET", "path": 42});
        let err = InvocationEvent::from_value(payload).unwrap_err();
        assert_eq!(err.kind().as_str(), "MalformedRequestEvent");
    }

    #[test]
    fn load_balancer_origin_tracks_multi_value_mode() {
        let single = json!({"requestContext": {"elb": {}}, "httpMethod": "GET", "path": "/", "headers": {}});
        let multi = json!({"requestContext": {"elb": {}}, "httpMethod": "GET", "path": "/", "multiValueHeaders": {}});
        assert_eq!(
            InvocationEvent::from_value(single).unwrap().origin(),
            OriginVariant::LoadBalancer { multi_value_headers: false }
        );
        assert_eq!(
            InvocationEvent::from_value(multi).unwrap().origin(),
            OriginVariant::LoadBalancer { multi_value_headers: true }
        );
    }

    #[test]
    fn function_url_and_http_api_share_the_v2_fields() {
        let payload = |domain: &str| {
            json!({"rawPath": "/a", "requestContext": {"http": {"method": "GET"}, "domainName": domain}})
        };

        let furl = InvocationEvent::from_value(payload("abc.lambda-url.eu-west-1.on.aws")).unwrap();
        let http = InvocationEvent::from_value(payload("abc.execute-api.eu-west-1.amazonaws.com")).unwrap();

        match (furl, http) {
            (InvocationEvent::FunctionUrl(a), InvocationEvent::ApiGatewayHttp(b)) => {
                assert_eq!(a.raw_path, b.raw_path);
                assert_eq!(a.request_context.and_then(|c| c.http).and_then(|h| h.method).as_deref(), Some("GET"));
                assert_eq!(b.request_context.and_then(|c| c.http).and_then(|h| h.method).as_deref(), Some("GET"));
            }
            other => panic!("unexpected variants: {other:?}"),
        }
    }
}
