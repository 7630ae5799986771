//! The process entry: one call per invocation event.

use crate::binary::BinaryContentPolicy;
use crate::config::AdapterConfig;
use crate::envelope::ResponseSerializer;
use crate::error::{AdapterError, BoxError, Result};
use crate::event::InvocationEvent;
use crate::headers::Headers;
use crate::request::{CanonicalRequest, InvocationContext, RequestBuilder};
use crate::response::CanonicalResponse;
use crate::warm::WarmState;
use lambda_runtime::LambdaEvent;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, error, info};

/// Header values that never make it into the log.
const REDACTED_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization", "x-api-key"];

/// The web application served through the adapter.
pub trait Application: Send + Sync {
    fn call(
        &self,
        request: CanonicalRequest,
    ) -> impl Future<Output = std::result::Result<CanonicalResponse, BoxError>> + Send;
}

/// An `Application` made of an async function, see `application_fn()`.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationFn<F>(F);

/// Wraps an async function into an `Application`, the way `lambda_runtime::service_fn` wraps handlers.
pub fn application_fn<F, Fut>(f: F) -> ApplicationFn<F>
where
    F: Fn(CanonicalRequest) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<CanonicalResponse, BoxError>> + Send,
{
    ApplicationFn(f)
}

impl<F, Fut> Application for ApplicationFn<F>
where
    F: Fn(CanonicalRequest) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<CanonicalResponse, BoxError>> + Send,
{
    fn call(
        &self,
        request: CanonicalRequest,
    ) -> impl Future<Output = std::result::Result<CanonicalResponse, BoxError>> + Send {
        (self.0)(request)
    }
}

/// Connects invocation events to the application.
/// Owns the config and the warm state, so one instance is created per process in `main`.
pub struct Adapter<A, F> {
    config: AdapterConfig,
    policy: BinaryContentPolicy,
    warm: WarmState<A>,
    factory: F,
}

impl<A, F, Fut, E> Adapter<A, F>
where
    A: Application,
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<A, E>>,
    E: Display,
{
    /// `factory` creates the application on the first invocation of the process.
    pub fn new(config: AdapterConfig, factory: F) -> Self {
        let policy = BinaryContentPolicy::new(config.content_types.clone());
        Self {
            config,
            policy,
            warm: WarmState::new(),
            factory,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn warm_state(&self) -> &WarmState<A> {
        &self.warm
    }

    /// Entry point for `lambda_runtime::service_fn`.
    pub async fn handle_event(&self, event: LambdaEvent<Value>) -> Result<Value> {
        let (payload, ctx) = event.into_parts();
        self.handle(payload, InvocationContext::from(&ctx)).await
    }

    /// Runs one invocation: classify, build the request, call the application, serialize the response.
    /// Any error fails the invocation. Nothing is retried here.
    pub async fn handle(&self, payload: Value, ctx: InvocationContext) -> Result<Value> {
        match self.invoke(payload, &ctx).await {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("Invocation {} failed with {}: {e}", ctx.request_id, e.kind().as_str());
                Err(e)
            }
        }
    }

    async fn invoke(&self, payload: Value, ctx: &InvocationContext) -> Result<Value> {
        let event = InvocationEvent::from_value(payload)?;
        let origin = event.origin();

        let request = RequestBuilder::new(&self.policy, self.config.path_prefix.as_ref()).build(event, ctx)?;

        info!("{} {}", request.method(), request.path());
        debug!(
            "Request: query={:?}, headers={:?}, {}B body, binary: {}",
            request.query_string(),
            redacted(request.headers()),
            request.body().len(),
            request.body_is_binary()
        );

        let app = self.warm.get_or_init(|| (self.factory)()).await?;

        let response = app
            .call(request)
            .await
            .map_err(|e| AdapterError::Application(e.to_string()))?;

        let envelope =
            ResponseSerializer::new(&self.policy, self.config.max_response_bytes).serialize(response, origin)?;

        debug!("Status: {}", envelope.status_code());

        envelope.to_value()
    }
}

fn redacted(headers: &Headers) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            if REDACTED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                (name, "***")
            } else {
                (name, value)
            }
        })
        .collect()
}
