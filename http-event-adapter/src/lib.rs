//! Runs a request/response web application on AWS Lambda without a web server.
//!
//! Lambda invokes the function once per request with a JSON event shaped by the integration in front of it:
//! a Function URL, an API Gateway HTTP API (payload v2), an API Gateway REST API (payload v1) or an ALB.
//! This crate turns any of those events into one `CanonicalRequest`, passes it to the application and
//! shapes the `CanonicalResponse` back into the envelope the integration expects.
//!
//! ```no_run
//! use http_event_adapter::{application_fn, Adapter, AdapterConfig, CanonicalRequest, CanonicalResponse, BoxError};
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//!
//! async fn app(req: CanonicalRequest) -> Result<CanonicalResponse, BoxError> {
//!     Ok(CanonicalResponse::new(200)
//!         .with_header("content-type", "text/plain")
//!         .with_body(format!("Hello from {}", req.path())))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let adapter = Adapter::new(AdapterConfig::from_env()?, || async { Ok::<_, BoxError>(application_fn(app)) });
//!     let adapter = &adapter;
//!     lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
//!         adapter.handle_event(event).await.map_err(Error::from)
//!     }))
//!     .await
//! }
//! ```

pub mod binary;
pub mod config;
pub mod cookies;
pub mod envelope;
pub mod error;
pub mod event;
pub mod fields;
pub mod handler;
pub mod headers;
pub mod query;
pub mod request;
pub mod response;
pub mod warm;

pub use binary::{BinaryContentPolicy, ContentClass, ContentTypeRules, Direction};
pub use config::{is_lambda_environment, AdapterConfig, PathPrefix};
pub use cookies::{Cookie, SetCookie};
pub use envelope::{OutboundEnvelope, ResponseSerializer};
pub use error::{AdapterError, BoxError, ErrorKind, Result};
pub use event::{classify, EventKind, InvocationEvent, OriginVariant};
pub use handler::{application_fn, Adapter, Application};
pub use headers::Headers;
pub use query::QueryParams;
pub use request::{CanonicalRequest, InvocationContext, RequestBuilder, RequestContext};
pub use response::CanonicalResponse;
pub use warm::WarmState;
