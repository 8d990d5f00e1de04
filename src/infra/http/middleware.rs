use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Level, debug, event};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const RESPONSE_TARGET: &str = "devhub::http::response";
const MAX_FORWARDED_ID_LEN: usize = 128;

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with an id, reusing one set by an upstream proxy, and echo
/// it on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id =
        forwarded_request_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn forwarded_request_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(&REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let acceptable = !raw.is_empty()
        && raw.len() <= MAX_FORWARDED_ID_LEN
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    acceptable.then(|| raw.to_string())
}

/// Log every response; failures carry the [`ErrorReport`] their handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = RESPONSE_TARGET,
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms,
            request_id,
            "request served"
        );
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("router", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    macro_rules! failure {
        ($level:expr, $message:literal) => {
            event!(
                $level,
                target = RESPONSE_TARGET,
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms,
                source,
                detail = %detail,
                chain = ?messages,
                request_id,
                $message
            )
        };
    }

    match failure_level(status) {
        FailureLevel::Error => failure!(Level::ERROR, "request failed"),
        FailureLevel::Warn => failure!(Level::WARN, "client request error"),
        // Crawlers ask for files that were never generated.
        FailureLevel::Quiet => failure!(Level::DEBUG, "not found"),
    }

    response
}

enum FailureLevel {
    Error,
    Warn,
    Quiet,
}

fn failure_level(status: StatusCode) -> FailureLevel {
    if status.is_server_error() {
        FailureLevel::Error
    } else if status == StatusCode::NOT_FOUND {
        FailureLevel::Quiet
    } else {
        FailureLevel::Warn
    }
}
