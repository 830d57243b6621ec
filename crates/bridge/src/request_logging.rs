use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::{to_bytes, Body};
use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

static LOG_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Largest webhook body accepted; the router's extractor limit uses the same value.
pub const WEBHOOK_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
const SHORT_BODY_MAX_CHARS: usize = 160;

pub async fn log_webhook_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let route = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_string(),
        |matched_path| matched_path.as_str().to_string(),
    );
    let handler = handler_name(method.as_str());
    let log_number = LOG_COUNTER.fetch_add(1, Ordering::Relaxed);

    let (parts, body) = request.into_parts();
    let Ok(body_bytes) = to_bytes(body, WEBHOOK_BODY_LIMIT_BYTES).await else {
        let status = StatusCode::PAYLOAD_TOO_LARGE;
        warn!(
            log_number,
            handler,
            %route,
            status = status.as_u16(),
            body = "<request-body-unavailable>",
            "webhook request"
        );
        return status.into_response();
    };
    let short_body = shorten_request_body(&String::from_utf8_lossy(&body_bytes));

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;
    info!(
        log_number,
        handler,
        %route,
        status = response.status().as_u16(),
        body = %short_body,
        "webhook request"
    );
    response
}

fn shorten_request_body(raw_body: &str) -> String {
    if raw_body.is_empty() {
        return "-".to_string();
    }

    let single_line = raw_body
        .replace(['\r', '\n', '\t'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if single_line.chars().count() <= SHORT_BODY_MAX_CHARS {
        return single_line;
    }

    let mut shortened = single_line
        .chars()
        .take(SHORT_BODY_MAX_CHARS)
        .collect::<String>();
    shortened.push_str("...");
    shortened
}

fn handler_name(method: &str) -> &'static str {
    match method {
        "POST" => "webhook.receive_release",
        _ => "webhook.method_not_allowed",
    }
}
