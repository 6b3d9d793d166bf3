/// Observability counters for the refresh service
///
/// Counters cover the current process only; the run report is the sole
/// per-run snapshot.
use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static RUNS_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "cdn_refresh_runs_started_total",
        "Total refresh runs started",
    )
    .expect("failed to create cdn_refresh_runs_started_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register cdn_refresh_runs_started_total");
    counter
});

static RUNS_FINISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "cdn_refresh_runs_finished_total",
            "Total refresh runs finished, by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create cdn_refresh_runs_finished_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register cdn_refresh_runs_finished_total");
    counter
});

static PROVIDER_CALLS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "cdn_refresh_provider_calls_total",
        "Total provider API calls issued",
    )
    .expect("failed to create cdn_refresh_provider_calls_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register cdn_refresh_provider_calls_total");
    counter
});

static URLS_UPDATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "cdn_refresh_urls_updated_total",
            "Total catalog URLs rewritten, by record kind",
        ),
        &["record_kind"],
    )
    .expect("failed to create cdn_refresh_urls_updated_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register cdn_refresh_urls_updated_total");
    counter
});

pub fn record_run_started() {
    RUNS_STARTED_TOTAL.inc();
}

pub fn record_run_finished(outcome: &str) {
    RUNS_FINISHED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_provider_call() {
    PROVIDER_CALLS_TOTAL.inc();
}

pub fn record_url_updated(record_kind: &str) {
    URLS_UPDATED_TOTAL.with_label_values(&[record_kind]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
