// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Analysis outcomes --------
pub static ANALYSES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("analyses_total", "analyses served (labels: kind, source)"),
        &["kind", "source"],
    )
    .unwrap()
});

pub static FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("analysis_fallbacks_total", "fallback results by kind & reason"),
        &["kind", "reason"],
    )
    .unwrap()
});

// -------- Quota gate --------
pub static QUOTA_ADMITTED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("quota_admitted_total", "calls admitted by the quota gate").unwrap());

pub static QUOTA_WAITS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("quota_waits_total", "times a caller slept on a full window").unwrap());

pub static QUOTA_WAIT_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("quota_wait_ms", "Time from acquire() to admission (ms)")
            .buckets(vec![0.0, 10.0, 100.0, 1_000.0, 5_000.0, 15_000.0, 30_000.0, 60_000.0]),
    )
    .unwrap()
});

pub static QUOTA_IN_WINDOW: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("quota_in_window", "admissions inside the current window").unwrap()
});

// -------- Upstream (LLM endpoint) --------
pub static UPSTREAM_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("upstream_latency_ms", "LLM endpoint round trip (ms)")
            .buckets(vec![100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0]),
    )
    .unwrap()
});

pub static UPSTREAM_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("upstream_errors_total", "LLM endpoint failures (label: reason)"),
        &["reason"],
    )
    .unwrap()
});

// -------- HTTP boundary --------
pub static HTTP_RESPONSES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_responses_total", "responses by route & status"),
        &["route", "status"],
    )
    .unwrap()
});

// -------- Journal --------
pub static JOURNAL_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("journal_dropped_total", "journal events not queued (label: reason)"),
        &["reason"],
    )
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_QUOTA_REQUESTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("config_quota_requests", "max admissions per window").unwrap()
});

pub static CONFIG_QUOTA_WINDOW_MS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("config_quota_window_ms", "quota window length (ms)").unwrap()
});

pub static CONFIG_MODEL: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_model", "configured model (label: model)"),
        &["model"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(ANALYSES.clone())),
        REGISTRY.register(Box::new(FALLBACKS.clone())),
        REGISTRY.register(Box::new(QUOTA_ADMITTED.clone())),
        REGISTRY.register(Box::new(QUOTA_WAITS.clone())),
        REGISTRY.register(Box::new(QUOTA_WAIT_MS.clone())),
        REGISTRY.register(Box::new(QUOTA_IN_WINDOW.clone())),
        REGISTRY.register(Box::new(UPSTREAM_LATENCY_MS.clone())),
        REGISTRY.register(Box::new(UPSTREAM_ERRORS.clone())),
        REGISTRY.register(Box::new(HTTP_RESPONSES.clone())),
        REGISTRY.register(Box::new(JOURNAL_DROPPED.clone())),
        // Config visibility
        REGISTRY.register(Box::new(CONFIG_QUOTA_REQUESTS.clone())),
        REGISTRY.register(Box::new(CONFIG_QUOTA_WINDOW_MS.clone())),
        REGISTRY.register(Box::new(CONFIG_MODEL.clone())),
    ] {
        // sudah terdaftar (mis. init dipanggil dua kali di test) -> abaikan
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
