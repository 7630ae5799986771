/// A small web app served from Lambda through the adapter.
/// Runs under the Lambda runtime when deployed or against a payload file locally:
/// `cargo run -p demo-lambda -- http-event-adapter/tests/events/function_url.json`
use http_event_adapter::{
    is_lambda_environment, Adapter, AdapterConfig, Application, BoxError, CanonicalRequest, CanonicalResponse,
    InvocationContext, SetCookie,
};
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::env::args;
use std::future::Future;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Deadline reported to the app in local mode, far in the future (2034)
const LOCAL_DEADLINE_MS: u64 = 2_035_313_041_000;

struct DemoApp {
    greeting: String,
}

impl DemoApp {
    /// Runs once per cold start.
    async fn init() -> Result<Self, BoxError> {
        let greeting = std::env::var("DEMO_GREETING").unwrap_or_else(|_| "Hello".to_owned());
        info!("Demo app ready");
        Ok(Self { greeting })
    }

    fn route(&self, req: CanonicalRequest) -> Result<CanonicalResponse, BoxError> {
        let path = req.path().trim_end_matches('/');

        match (req.method(), path) {
            (&Method::GET, "") => Ok(CanonicalResponse::new(200)
                .with_header("content-type", "text/html; charset=utf-8")
                .with_body(format!("<h1>{} from Lambda</h1>", self.greeting))),

            (&Method::GET, p) if p.starts_with("/hello/") => {
                let name = &p["/hello/".len()..];
                let visits = req
                    .cookie("visits")
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or_default()
                    + 1;
                Ok(CanonicalResponse::new(200)
                    .with_header("content-type", "text/plain")
                    .with_cookie(SetCookie::new("visits", visits.to_string()).with_attribute("Path=/"))
                    .with_cookie(SetCookie::new("last", name).with_attribute("Path=/").with_attribute("HttpOnly"))
                    .with_body(format!("{}, {name}! Visit #{visits}", self.greeting)))
            }

            // the body goes back as received, binary or not
            (&Method::POST, "/echo") => {
                let content_type = req.headers().get("content-type").unwrap_or("application/octet-stream").to_owned();
                let response = CanonicalResponse::new(200).with_header("content-type", content_type);
                Ok(if req.body_is_binary() {
                    response.with_binary_body(req.body().clone())
                } else {
                    response.with_body(req.body().clone())
                })
            }

            // the same app can be written against the hyper types
            (_, "/http") => {
                let req = req.to_http()?;
                let res = hyper::Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "application/json")
                    .body(Bytes::from(format!(
                        r#"{{"method":"{}","uri":"{}"}}"#,
                        req.method(),
                        req.uri()
                    )))?;
                Ok(CanonicalResponse::from_http(res)?)
            }

            _ => {
                warn!("No route for {} {}", req.method(), req.path());
                Ok(CanonicalResponse::new(404)
                    .with_header("content-type", "text/plain")
                    .with_body("Not found"))
            }
        }
    }
}

impl Application for DemoApp {
    fn call(&self, request: CanonicalRequest) -> impl Future<Output = Result<CanonicalResponse, BoxError>> + Send {
        std::future::ready(self.route(request))
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let adapter = Adapter::new(AdapterConfig::from_env()?, DemoApp::init);

    // a payload file in the command line means a local run
    if let Some(payload) = get_local_payload()? {
        let ctx = InvocationContext {
            request_id: Uuid::new_v4().to_string(),
            deadline_ms: LOCAL_DEADLINE_MS,
        };
        let envelope = adapter.handle(payload, ctx).await?;
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    let adapter = &adapter;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        adapter.handle_event(event).await.map_err(Error::from)
    }))
    .await
}

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging:
/// - INFO for this binary and the adapter
/// - ERROR for everything else
fn init_tracing() {
    // find out the name of the binary to set the default logging filter
    let binary_name = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().to_string()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned())
        // tracing uses target names with underscores, e.g. `demo_lambda`
        .replace('-', "_");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("error,{binary_name}=info,http_event_adapter=info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        // CloudWatch does not render the color codes
        .with_ansi(!is_lambda_environment())
        .with_target(false)
        .without_time()
        .compact()
        .init();
}

/// Reads the payload from a local file if the file name is provided in the command line arguments.
/// Returns None when running under the Lambda runtime.
fn get_local_payload() -> Result<Option<Value>, Error> {
    if is_lambda_environment() {
        return Ok(None);
    }

    let payload_file = match args().nth(1) {
        Some(v) => v,
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    if payload_file == "--help" {
        print_help();
        std::process::exit(0);
    }

    let payload = std::fs::read_to_string(&payload_file)
        .map_err(|e| format!("Failed to read payload from {payload_file}: {e}"))?;

    info!("Payload from {payload_file}");

    Ok(Some(serde_json::from_str(&payload)?))
}

fn print_help() {
    println!("A sample web app running on AWS Lambda behind a Function URL, API Gateway or ALB.");
    println!();
    println!("Local run: cargo run -p demo-lambda -- [payload_file], e.g. http-event-adapter/tests/events/alb.json");
    println!("The response envelope is printed to stdout.");
    println!();
    println!("Env vars:");
    println!("  HTTP_ADAPTER_MAX_RESPONSE_BYTES    response body ceiling, 6291456 by default");
    println!("  HTTP_ADAPTER_TEXT_CONTENT_TYPES    extra text content types, e.g. application/vnd.api+json");
    println!("  HTTP_ADAPTER_BINARY_CONTENT_TYPES  content types to always base64-encode");
    println!("  HTTP_ADAPTER_STRIP_PATH_PREFIX     a path prefix to remove, /api or ^/v[0-9]+");
    println!("  RUST_LOG                           logging filter, e.g. demo_lambda=debug");
}
