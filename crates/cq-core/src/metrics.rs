use axum::extract::MatchedPath;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

struct Metrics {
    registry: Registry,
    cq_up: IntGaugeVec,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    queue_rebuild_total: IntCounterVec,
    queue_waiting_entries: IntGaugeVec,
    queue_version: IntGaugeVec,
    queue_notification_total: IntCounterVec,
}

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_ERROR: &str = "error";
/// Route label for requests no route matched.
const UNMATCHED_ROUTE: &str = "unmatched";

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let cq_up = IntGaugeVec::new(Opts::new("cq_up", "Service health"), &["service"])
            .expect("cq_up metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP request count"),
            &["service", "route", "method", "status"],
        )
        .expect("http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["service", "route", "method", "status"],
        )
        .expect("http_request_duration_seconds metric");

        let queue_rebuild_total = IntCounterVec::new(
            Opts::new("queue_rebuild_total", "Queue snapshot rebuilds by outcome"),
            &["service", "result"],
        )
        .expect("queue_rebuild_total metric");

        let queue_waiting_entries = IntGaugeVec::new(
            Opts::new(
                "queue_waiting_entries",
                "Entries in the most recently published queue snapshot",
            ),
            &["service"],
        )
        .expect("queue_waiting_entries metric");

        let queue_version = IntGaugeVec::new(
            Opts::new("queue_version", "Current queue snapshot version"),
            &["service"],
        )
        .expect("queue_version metric");

        let queue_notification_total = IntCounterVec::new(
            Opts::new(
                "queue_notification_total",
                "Patient call notifications by outcome",
            ),
            &["service", "result"],
        )
        .expect("queue_notification_total metric");

        registry
            .register(Box::new(cq_up.clone()))
            .expect("register cq_up");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http_requests_total");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("register http_request_duration_seconds");
        registry
            .register(Box::new(queue_rebuild_total.clone()))
            .expect("register queue_rebuild_total");
        registry
            .register(Box::new(queue_waiting_entries.clone()))
            .expect("register queue_waiting_entries");
        registry
            .register(Box::new(queue_version.clone()))
            .expect("register queue_version");
        registry
            .register(Box::new(queue_notification_total.clone()))
            .expect("register queue_notification_total");

        Metrics {
            registry,
            cq_up,
            http_requests_total,
            http_request_duration_seconds,
            queue_rebuild_total,
            queue_waiting_entries,
            queue_version,
            queue_notification_total,
        }
    })
}

pub fn init(service_name: &'static str) {
    metrics().cq_up.with_label_values(&[service_name]).set(1);
}

pub fn record_http_request(
    service_name: &'static str,
    method: &str,
    route: &str,
    status: u16,
    duration: Duration,
) {
    let status_str = status.to_string();
    let labels = &[service_name, route, method, status_str.as_str()];
    let metrics = metrics();
    metrics.http_requests_total.with_label_values(labels).inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(labels)
        .observe(duration.as_secs_f64());
}

pub fn record_queue_rebuild(service_name: &'static str, waiting: usize, version: u64) {
    let metrics = metrics();
    metrics
        .queue_rebuild_total
        .with_label_values(&[service_name, RESULT_SUCCESS])
        .inc();
    metrics
        .queue_waiting_entries
        .with_label_values(&[service_name])
        .set(i64::try_from(waiting).unwrap_or(i64::MAX));
    metrics
        .queue_version
        .with_label_values(&[service_name])
        .set(i64::try_from(version).unwrap_or(i64::MAX));
}

pub fn inc_queue_rebuild_failure(service_name: &'static str) {
    metrics()
        .queue_rebuild_total
        .with_label_values(&[service_name, RESULT_ERROR])
        .inc();
}

pub fn inc_queue_notification(service_name: &'static str, delivered: bool) {
    let result = if delivered { RESULT_SUCCESS } else { RESULT_ERROR };
    metrics()
        .queue_notification_total
        .with_label_values(&[service_name, result])
        .inc();
}

pub fn metrics_response(service_name: &'static str) -> impl IntoResponse {
    init(service_name);
    let metrics = metrics();
    let metric_families = metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            "failed to encode metrics".to_string(),
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    (
        StatusCode::OK,
        headers,
        String::from_utf8_lossy(&buffer).to_string(),
    )
}

#[derive(Clone)]
pub struct MetricsLayer {
    service_name: &'static str,
}

impl MetricsLayer {
    pub fn new(service_name: &'static str) -> Self {
        Self { service_name }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    service_name: &'static str,
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            service_name: self.service_name,
        }
    }
}

impl<S, ReqBody, ResBody> Service<axum::http::Request<ReqBody>> for MetricsService<S>
where
    S: Service<axum::http::Request<ReqBody>, Response = axum::response::Response<ResBody>>
        + Send
        + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = axum::response::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: axum::http::Request<ReqBody>) -> Self::Future {
        let service_name = self.service_name;
        let method = request.method().to_string();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
        let start = Instant::now();
        let fut = self.inner.call(request);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    record_http_request(
                        service_name,
                        &method,
                        &route,
                        response.status().as_u16(),
                        start.elapsed(),
                    );
                    Ok(response)
                }
                Err(err) => {
                    record_http_request(service_name, &method, &route, 500, start.elapsed());
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    async fn exported_text(service_name: &'static str) -> String {
        let response = metrics_response(service_name).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn metrics_response_sets_content_type() {
        let response = metrics_response("cq-test").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "text/plain; version=0.0.4");
    }

    #[tokio::test]
    async fn queue_metrics_are_exported() {
        record_queue_rebuild("cq-metrics-test", 3, 7);
        inc_queue_notification("cq-metrics-test", false);

        let response = metrics_response("cq-metrics-test").into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("queue_waiting_entries{service=\"cq-metrics-test\"} 3"));
        assert!(text.contains("queue_version{service=\"cq-metrics-test\"} 7"));
        assert!(text.contains("queue_notification_total"));
    }

    #[tokio::test]
    async fn http_requests_are_labelled_by_route_template() {
        let service = "cq-route-label-test";
        let router = Router::new()
            .route("/queue/:id/finish", post(|| async { StatusCode::OK }))
            .layer(MetricsLayer::new(service));

        for id in 1..=20 {
            let request = Request::builder()
                .method("POST")
                .uri(format!("/queue/{id}/finish"))
                .body(Body::empty())
                .unwrap();
            router.clone().oneshot(request).await.unwrap();
        }
        let request = Request::builder()
            .uri("/nowhere/17")
            .body(Body::empty())
            .unwrap();
        router.clone().oneshot(request).await.unwrap();

        let text = exported_text(service).await;
        let series: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with("http_requests_total{"))
            .filter(|line| line.contains(&format!("service=\"{service}\"")))
            .collect();

        assert_eq!(series.len(), 2, "unexpected series: {series:?}");
        assert!(series
            .iter()
            .any(|line| line.contains("route=\"/queue/:id/finish\"") && line.ends_with(" 20")));
        assert!(series
            .iter()
            .any(|line| line.contains("route=\"unmatched\"")));
    }
}
