//! Middleware shared by every HTTP surface.

use axum::http::header::{HeaderName, ETAG, IF_NONE_MATCH};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{Level, Span};

const REQUEST_ID_HEADER: &str = "x-request-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

fn header_str<'a, B>(request: &'a Request<B>, name: &str) -> &'a str {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

fn request_span<B>(service_name: &'static str, request: &Request<B>) -> Span {
    tracing::info_span!(
        "http.request",
        service = service_name,
        method = %request.method(),
        uri = %request.uri(),
        request_id = %header_str(request, REQUEST_ID_HEADER),
        if_none_match = %header_str(request, IF_NONE_MATCH.as_str()),
    )
}

/// Metrics, tracing, timeout, body limit and request ids, outermost last.
pub fn apply_standard_layers(router: Router, service_name: &'static str) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(move |request: &Request<_>| request_span(service_name, request))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router
        .layer(crate::metrics::MetricsLayer::new(service_name))
        .layer(trace)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Browser screens poll cross-origin and must be able to read `ETag`.
pub fn apply_cors(router: Router) -> Router {
    router.layer(CorsLayer::permissive().expose_headers([ETAG]))
}
