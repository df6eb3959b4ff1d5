use lazy_static::lazy_static;
use prometheus::{
    Encoder, Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder, register_gauge,
    register_histogram, register_int_counter, register_int_counter_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "shimmy_gateway_requests_total",
        "Total number of proxied requests",
        &["route"]
    )
    .unwrap();
    pub static ref BACKEND_FAILURES: IntCounter = register_int_counter!(
        "shimmy_gateway_backend_failures_total",
        "Backend calls that failed before a usable response"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "shimmy_gateway_request_latency_seconds",
        "Latency of buffered generate calls in seconds"
    )
    .unwrap();
    pub static ref DOWNLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "shimmy_gateway_downloads_total",
        "Model pulls by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref DOWNLOAD_IN_PROGRESS: Gauge = register_gauge!(
        "shimmy_gateway_download_in_progress",
        "1 while a model pull holds the download slot"
    )
    .unwrap();
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
