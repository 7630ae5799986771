//! Whole invocations: sample event in, response envelope out.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]


use event_loader::{load, ALL_EVENTS};
use http_event_adapter::config::DEFAULT_MAX_RESPONSE_BYTES;
use http_event_adapter::{
    application_fn, Adapter, AdapterConfig, Application, BoxError, CanonicalRequest, CanonicalResponse,
    InvocationContext, SetCookie,
};
use serde_json::{json, Value};
use std::future::{ready, Future, Ready};

struct Echo;

impl Application for Echo {
    fn call(&self, request: CanonicalRequest) -> impl Future<Output = Result<CanonicalResponse, BoxError>> + Send {
        echo(request)
    }
}

/// Answers with the route, one cookie per `cookies` query value and `size` bytes of body if asked to.
async fn echo(request: CanonicalRequest) -> Result<CanonicalResponse, BoxError> {
    let mut response = CanonicalResponse::new(200)
        .with_header("Content-Type", "text/plain")
        .with_header("X-Route", format!("{} {}", request.method(), request.path()));

    let cookies = request.query().get("cookies").map_or(Ok(0), str::parse::<usize>)?;
    for i in 0..cookies {
        response = response.with_cookie(SetCookie::new(format!("c{i}"), i.to_string()).with_attribute("Path=/"));
    }

    let body = match request.query().get("size") {
        Some(size) => "x".repeat(size.parse()?),
        None => format!("hello {}", request.path()),
    };

    Ok(response.with_body(body))
}

fn adapter() -> Adapter<Echo, impl Fn() -> Ready<Result<Echo, BoxError>>> {
    Adapter::new(AdapterConfig::default(), || ready(Ok(Echo)))
}

/// The sample REST event with its query replaced by `query`.
fn rest_event(query: &[(&str, &str)]) -> Value {
    let mut event = load("api_gateway_rest.json");
    event["multiValueQueryStringParameters"] = query
        .iter()
        .map(|(k, v)| (k.to_string(), json!([v])))
        .collect::<serde_json::Map<String, Value>>()
        .into();
    event["queryStringParameters"] = Value::Null;
    event
}

#[tokio::test]
async fn every_sample_event_gets_its_envelope() {
    let adapter = adapter();

    for name in ALL_EVENTS {
        let out = adapter.handle(load(name), InvocationContext::default()).await.unwrap();
        assert_eq!(out["statusCode"], 200, "{name}");
        assert_eq!(out["body"], "hello /users/42", "{name}");
        assert_eq!(out["isBase64Encoded"], false, "{name}");
    }
}

/// Sends the request headers, cookies and body back as the response.
async fn mirror(request: CanonicalRequest) -> Result<CanonicalResponse, BoxError> {
    let mut response = CanonicalResponse::new(200);
    for (name, value) in request.headers().iter() {
        if !name.eq_ignore_ascii_case("cookie") {
            response = response.with_header(name, value);
        }
    }
    for cookie in request.cookies() {
        response = response.with_cookie(SetCookie::new(&cookie.name, &cookie.value));
    }

    Ok(if request.body_is_binary() {
        response.with_binary_body(request.body().clone())
    } else {
        response.with_body(request.body().clone())
    })
}

#[tokio::test]
async fn headers_cookies_and_body_survive_the_round_trip() {
    let adapter = Adapter::new(AdapterConfig::default(), || async { Ok::<_, BoxError>(application_fn(mirror)) });
    let ctx = InvocationContext::default;
    let cookies = json!(["session=abc123", "theme=dark"]);

    let furl = adapter.handle(load("function_url.json"), ctx()).await.unwrap();
    assert_eq!(furl["headers"]["x-custom"], "one,two");
    assert_eq!(furl["headers"]["accept"], "text/html");
    assert_eq!(furl["cookies"], cookies);
    assert_eq!(furl["body"], "");
    assert_eq!(furl["isBase64Encoded"], false);

    let http = adapter.handle(load("api_gateway_http.json"), ctx()).await.unwrap();
    assert_eq!(http["headers"]["content-type"], "application/json");
    assert_eq!(http["cookies"], cookies);
    assert_eq!(http["body"], "eyJuYW1lIjoiYWRhIn0=");
    assert_eq!(http["isBase64Encoded"], true);

    let rest = adapter.handle(load("api_gateway_rest.json"), ctx()).await.unwrap();
    assert_eq!(rest["multiValueHeaders"]["X-Custom"], json!(["one", "two"]));
    assert_eq!(rest["multiValueHeaders"]["Set-Cookie"], cookies);
    assert!(rest["multiValueHeaders"].get("Cookie").is_none());
    assert_eq!(rest["body"], "name=ada&lang=en");
    assert_eq!(rest["isBase64Encoded"], false);

    let alb = adapter.handle(load("alb.json"), ctx()).await.unwrap();
    let headers = alb["headers"].as_object().unwrap();
    assert_eq!(headers["x-custom"], "two");
    let mut set_cookies: Vec<&str> = headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
        .map(|(_, v)| v.as_str().unwrap())
        .collect();
    set_cookies.sort_unstable();
    assert_eq!(set_cookies, vec!["session=abc123", "theme=dark"]);
    assert_eq!(alb["body"], "");

    let alb_multi = adapter.handle(load("alb_multi_value.json"), ctx()).await.unwrap();
    assert_eq!(alb_multi["multiValueHeaders"]["x-custom"], json!(["one", "two"]));
    assert_eq!(alb_multi["multiValueHeaders"]["Set-Cookie"], cookies);
    assert_eq!(alb_multi["body"], "");
}

#[tokio::test]
async fn request_and_response_encodings_are_independent() {
    let adapter = Adapter::new(AdapterConfig::default(), || async {
        Ok::<_, BoxError>(application_fn(|req: CanonicalRequest| async move {
            assert!(req.body_is_binary());
            Ok::<_, BoxError>(
                CanonicalResponse::new(200)
                    .with_header("content-type", "text/plain")
                    .with_body(format!("{} bytes", req.body().len())),
            )
        }))
    });

    let out = adapter
        .handle(load("api_gateway_http.json"), InvocationContext::default())
        .await
        .unwrap();
    assert_eq!(out["isBase64Encoded"], false);
    assert_eq!(out["body"], "14 bytes");
}

#[tokio::test]
async fn envelope_shape_follows_the_front_door() {
    let adapter = adapter();
    let ctx = InvocationContext::default;

    let furl = adapter.handle(load("function_url.json"), ctx()).await.unwrap();
    assert_eq!(furl["headers"]["X-Route"], "GET /users/42");
    assert!(furl["cookies"].is_array());
    assert!(furl.get("multiValueHeaders").is_none());

    let http = adapter.handle(load("api_gateway_http.json"), ctx()).await.unwrap();
    assert_eq!(http["headers"]["X-Route"], "POST /users/42");

    let rest = adapter.handle(load("api_gateway_rest.json"), ctx()).await.unwrap();
    assert_eq!(rest["multiValueHeaders"]["X-Route"], json!(["POST /users/42"]));
    assert!(rest.get("headers").is_none());
    assert!(rest.get("cookies").is_none());

    let alb = adapter.handle(load("alb.json"), ctx()).await.unwrap();
    assert_eq!(alb["statusDescription"], "200 OK");
    assert_eq!(alb["headers"]["X-Route"], "GET /users/42");
    assert!(alb.get("multiValueHeaders").is_none());

    let alb_multi = adapter.handle(load("alb_multi_value.json"), ctx()).await.unwrap();
    assert_eq!(alb_multi["statusDescription"], "200 OK");
    assert_eq!(alb_multi["multiValueHeaders"]["X-Route"], json!(["GET /users/42"]));
    assert!(alb_multi.get("headers").is_none());
}

#[tokio::test]
async fn cookies_are_never_merged() {
    let adapter = adapter();

    for n in 2..=6usize {
        let count = n.to_string();

        let mut furl = load("function_url.json");
        furl["rawQueryString"] = json!(format!("cookies={n}"));
        let out = adapter.handle(furl, InvocationContext::default()).await.unwrap();
        let cookies = out["cookies"].as_array().unwrap();
        assert_eq!(cookies.len(), n);
        assert_eq!(cookies[1], "c1=1; Path=/");

        let out = adapter
            .handle(rest_event(&[("cookies", count.as_str())]), InvocationContext::default())
            .await
            .unwrap();
        assert_eq!(out["multiValueHeaders"]["Set-Cookie"].as_array().unwrap().len(), n);

        for name in ["alb.json", "alb_multi_value.json"] {
            let mut alb = load(name);
            alb["queryStringParameters"] = json!({"cookies": count});
            alb["multiValueQueryStringParameters"] = if name == "alb.json" {
                Value::Null
            } else {
                json!({"cookies": [count]})
            };
            let out = adapter.handle(alb, InvocationContext::default()).await.unwrap();

            let values: Vec<&Value> = match out["multiValueHeaders"].as_object() {
                Some(headers) => headers["Set-Cookie"].as_array().unwrap().iter().collect(),
                None => out["headers"]
                    .as_object()
                    .unwrap()
                    .iter()
                    .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
                    .map(|(_, v)| v)
                    .collect(),
            };
            assert_eq!(values.len(), n, "{name}");
            assert!(values.iter().all(|v| !v.as_str().unwrap().contains(", c")), "{name}");
        }
    }
}

#[tokio::test]
async fn default_size_ceiling_is_inclusive() {
    let adapter = adapter();

    let limit = DEFAULT_MAX_RESPONSE_BYTES.to_string();
    let out = adapter
        .handle(rest_event(&[("size", limit.as_str())]), InvocationContext::default())
        .await
        .unwrap();
    assert_eq!(out["body"].as_str().unwrap().len(), DEFAULT_MAX_RESPONSE_BYTES);

    let over = (DEFAULT_MAX_RESPONSE_BYTES + 1).to_string();
    let err = adapter
        .handle(rest_event(&[("size", over.as_str())]), InvocationContext::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind().as_str(), "ResponseTooLarge");
}

#[tokio::test]
async fn unrecognized_payloads_are_rejected() {
    let adapter = adapter();

    for payload in [
        json!({"Records": [{"eventSource": "aws:sqs"}]}),
        json!({"source": "aws.events", "detail-type": "Scheduled Event"}),
        json!("GET /"),
        json!([1, 2, 3]),
        Value::Null,
    ] {
        let err = adapter
            .handle(payload.clone(), InvocationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind().as_str(), "UnrecognizedEventShape", "{payload}");
    }
    assert!(!adapter.warm_state().is_initialized());
}

#[tokio::test]
async fn binary_responses_are_base64_encoded() {
    let adapter = Adapter::new(AdapterConfig::default(), || async {
        Ok::<_, BoxError>(application_fn(|_req: CanonicalRequest| async {
            Ok::<_, BoxError>(
                CanonicalResponse::new(200)
                    .with_header("content-type", "image/png")
                    .with_body(vec![0x89u8, b'P', b'N', b'G']),
            )
        }))
    });

    let out = adapter
        .handle(load("function_url.json"), InvocationContext::default())
        .await
        .unwrap();
    assert_eq!(out["isBase64Encoded"], true);
    assert_eq!(out["body"], "iVBORw==");
}

#[tokio::test]
async fn hyper_applications_are_supported() {
    let adapter = Adapter::new(AdapterConfig::default(), || async {
        Ok::<_, BoxError>(application_fn(|req: CanonicalRequest| async move {
            let req = req.to_http()?;
            let res = hyper::Response::builder()
                .status(201)
                .header("content-type", "application/json")
                .header("location", req.uri().path())
                .body(req.into_body())?;
            Ok::<_, BoxError>(CanonicalResponse::from_http(res)?)
        }))
    });

    let out = adapter
        .handle(load("api_gateway_rest.json"), InvocationContext::default())
        .await
        .unwrap();
    assert_eq!(out["statusCode"], 201);
    assert_eq!(out["multiValueHeaders"]["location"], json!(["/users/42"]));
    assert_eq!(out["body"], "name=ada&lang=en");
}
