use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Metric name prefix for every sync metric
const PREFIX: &str = "borealis";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Sync passes
    pub static ref SYNC_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sync_runs_total"), "Sync passes by kind and result"),
        &["kind", "result"]
    ).expect("Failed to create sync_runs_total metric");

    pub static ref SYNC_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_sync_duration_seconds"),
            "Wall time of a sync pass in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
        &["kind"]
    ).expect("Failed to create sync_duration_seconds metric");

    // Remote API
    pub static ref REMOTE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_remote_requests_total"), "Media server requests by endpoint and outcome"),
        &["endpoint", "outcome"]
    ).expect("Failed to create remote_requests_total metric");

    pub static ref REMOTE_RETRIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_remote_retries_total"), "Retried media server requests"),
        &["endpoint"]
    ).expect("Failed to create remote_retries_total metric");

    // Ingestion
    pub static ref PLAYBACK_EVENTS_INGESTED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_playback_events_ingested_total"),
        "Playback events written to the store"
    ).expect("Failed to create playback_events_ingested_total metric");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(SYNC_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(REMOTE_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(REMOTE_RETRIES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PLAYBACK_EVENTS_INGESTED_TOTAL.clone()));

    tracing::debug!("Sync metrics registered");
}

pub fn record_sync_run(kind: &str, result: &str, duration: Duration) {
    SYNC_RUNS_TOTAL.with_label_values(&[kind, result]).inc();
    SYNC_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

pub fn record_remote_request(endpoint: &str, outcome: &str) {
    REMOTE_REQUESTS_TOTAL
        .with_label_values(&[endpoint, outcome])
        .inc();
}

pub fn record_remote_retry(endpoint: &str) {
    REMOTE_RETRIES_TOTAL.with_label_values(&[endpoint]).inc();
}

pub fn record_events_ingested(count: usize) {
    PLAYBACK_EVENTS_INGESTED_TOTAL.inc_by(count as u64);
}

/// Render the registry in the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
