//! Prometheus metrics

use crate::chart::ChartData;
use crate::labels::SelectionEvent;

use axum::{body::Body, http::Request, http::StatusCode, response::Response};
use lazy_static::lazy_static;
use prometheus::{self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use tracing::Span;

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Simple request counter
    pub static ref INCOMING_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("incoming_requests", "The number of HTTP requests received"),
        &["http_method"]
    ).expect("valid metric");
    // Request counter by status code
    pub static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_response", "The number of responses sent."),
        &["status_code"]
    ).expect("valid metric");
    // Request histogram by response time
    pub static ref RESPONSE_TIME_COLLECTOR: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("response_time", "The time taken to respond to each request"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &[],
    ).expect("valid metric");
    // Label resolutions by what the selection resolved to
    pub static ref LABEL_RESOLUTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("label_resolutions", "The number of label selections resolved"),
        &["outcome"]
    ).expect("valid metric");
    // Chart renders by chart state
    pub static ref CHART_RENDERS: IntCounterVec = IntCounterVec::new(
        Opts::new("chart_renders", "The number of change charts aligned"),
        &["state"]
    ).expect("valid metric");
}

/// Register all metrics with the registry.
///
/// Panics if called more than once.
pub fn register_metrics() {
    REGISTRY
        .register(Box::new(INCOMING_REQUESTS.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(RESPONSE_CODE_COLLECTOR.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(RESPONSE_TIME_COLLECTOR.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(LABEL_RESOLUTIONS.clone()))
        .expect("collector can be registered");
    REGISTRY
        .register(Box::new(CHART_RENDERS.clone()))
        .expect("collector can be registered");
}

/// Handler for `GET /metrics`, rendering the registry in the Prometheus text format
pub async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    String::from_utf8(buffer).map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

/// Increments the prometheus counter on all incoming requests, labelled by http method
pub fn request_counter(request: &Request<Body>, _span: &Span) {
    INCOMING_REQUESTS
        .with_label_values(&[&request.method().to_string().to_ascii_uppercase()])
        .inc();
}

/// Increment the prometheus counter on all outgoing responses, labelled by status code
pub fn record_response_metrics<B>(
    response: &Response<B>,
    latency: std::time::Duration,
    _span: &Span,
) {
    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[response.status().as_str()])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[])
        .observe(latency.as_secs_f64());
}

/// Label value of a resolution outcome
pub fn resolution_outcome(selection: Option<&SelectionEvent>) -> &'static str {
    match selection {
        None => "none",
        Some(SelectionEvent::Full(_)) => "full",
        Some(SelectionEvent::Partial(_)) => "partial",
        Some(SelectionEvent::Cleared) => "cleared",
    }
}

/// Increment the label resolution counter, labelled by outcome
pub fn record_resolution(selection: Option<&SelectionEvent>) {
    LABEL_RESOLUTIONS
        .with_label_values(&[resolution_outcome(selection)])
        .inc();
}

/// Label value of a chart state
pub fn chart_state(data: &ChartData) -> &'static str {
    match data {
        ChartData::Series { .. } => "series",
        ChartData::NoDatapoints => "no_datapoints",
    }
}

/// Increment the chart render counter, labelled by chart state
pub fn record_chart(data: &ChartData) {
    CHART_RENDERS.with_label_values(&[chart_state(data)]).inc();
}
