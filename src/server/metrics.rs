use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all SwipeSound metrics
const PREFIX: &str = "swipesound";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Discovery Metrics
    pub static ref FEED_COMPOSITIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_feed_compositions_total"), "Feed compositions by outcome"),
        &["outcome"]
    ).expect("Failed to create feed_compositions_total metric");

    pub static ref FEED_COMPOSITION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_feed_composition_duration_seconds"),
            "Feed composition duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("Failed to create feed_composition_duration_seconds metric");

    pub static ref FEED_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_feed_size"),
            "Number of candidates in a composed feed"
        )
        .buckets(vec![0.0, 10.0, 25.0, 50.0, 100.0, 150.0, 200.0])
    ).expect("Failed to create feed_size metric");

    pub static ref CATALOG_FETCH_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_catalog_fetch_failures_total"),
            "Failed catalog calls by request and error kind"
        ),
        &["request", "kind"]
    ).expect("Failed to create catalog_fetch_failures_total metric");

    pub static ref DECISIONS_RECORDED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_decisions_recorded_total"), "Recorded swipe decisions"),
        &["decision"]
    ).expect("Failed to create decisions_recorded_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Already registered metrics are fine, tests call this many times
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FEED_COMPOSITIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FEED_COMPOSITION_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(FEED_SIZE.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_FETCH_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DECISIONS_RECORDED_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a feed composition, `size` is only known when it succeeded.
pub fn record_feed_composition(outcome: &str, size: Option<usize>, duration: Duration) {
    FEED_COMPOSITIONS_TOTAL.with_label_values(&[outcome]).inc();
    FEED_COMPOSITION_DURATION_SECONDS.observe(duration.as_secs_f64());
    if let Some(size) = size {
        FEED_SIZE.observe(size as f64);
    }
}

pub fn record_catalog_fetch_failure(request: &str, kind: &str) {
    CATALOG_FETCH_FAILURES_TOTAL
        .with_label_values(&[request, kind])
        .inc();
}

pub fn record_decision(decision: &str) {
    DECISIONS_RECORDED_TOTAL
        .with_label_values(&[decision])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
