//! HTTP traffic logging, enabled with `--debug`.

use bytes::Bytes;
use http::Extensions;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::fmt::Write;

/// Logs each request and response, including bodies.
///
/// The response body is read in full and put back, so callers downstream
/// see the same bytes.
pub struct DebugMiddleware;

#[async_trait::async_trait]
impl Middleware for DebugMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        tracing::info!(target: "gapi::http", "\n[request]\n{}[/request]", describe_request(&req));

        match next.run(req, extensions).await {
            Ok(response) => echo_response(response).await,
            Err(err) => {
                tracing::info!(target: "gapi::http", "[response]\nERROR: {}", err);
                Err(err)
            }
        }
    }
}

fn describe_request(req: &Request) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {} {:?}", req.method(), req.url(), req.version());
    write_headers(&mut out, req.headers());

    if let Some(body) = req.body().and_then(|b| b.as_bytes()) {
        let _ = writeln!(out, "\n{}", String::from_utf8_lossy(body));
    }
    out
}

async fn echo_response(response: Response) -> reqwest_middleware::Result<Response> {
    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();
    let body: Bytes = response.bytes().await?;

    let mut out = String::new();
    let _ = writeln!(out, "{:?} {}", version, status);
    write_headers(&mut out, &headers);
    let _ = writeln!(out, "\n{}", String::from_utf8_lossy(&body));
    tracing::info!(target: "gapi::http", "[response]\n{}[/response]", out);

    let mut builder = http::Response::builder().status(status).version(version);
    if let Some(target) = builder.headers_mut() {
        *target = headers;
    }
    let rebuilt = builder
        .body(body)
        .map_err(|e| reqwest_middleware::Error::Middleware(anyhow::Error::new(e)))?;

    Ok(Response::from(rebuilt))
}

fn write_headers(out: &mut String, headers: &header::HeaderMap) {
    for (name, value) in headers {
        let _ = writeln!(out, "{}: {}", name, redact(name, value));
    }
}

fn redact(name: &header::HeaderName, value: &header::HeaderValue) -> String {
    if name == header::AUTHORIZATION {
        return "<redacted>".to_string();
    }
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}
