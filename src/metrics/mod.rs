use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;


lazy_static! {
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("keyspace_requests_total", "Key-space operations issued"),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("keyspace_store_errors_total", "Operations the store refused, by error code"),
        &["operation", "code"]
    )
    .expect("metric can not be created");

    pub static ref TRANSPORT_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("keyspace_transport_failures_total", "Operations that never got a valid reply"),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref REQUEST_DURATION_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("keyspace_request_duration_ms", "Histogram of operation latency in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets")),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref OUTSTANDING_WATCHES: IntGauge = IntGauge::new(
        "keyspace_outstanding_watches",
        "Watches registered and not yet finished"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

/// Registers every collector of this crate into `registry`
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(REQUESTS_TOTAL.clone()),
        Box::new(STORE_ERRORS_TOTAL.clone()),
        Box::new(TRANSPORT_FAILURES_TOTAL.clone()),
        Box::new(REQUEST_DURATION_MS.clone()),
        Box::new(OUTSTANDING_WATCHES.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {:?}", e);
        }
    }
}

/// Registers the crate collectors into [`REGISTRY`] once per process
pub fn init_metrics() {
    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Renders [`REGISTRY`] in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    init_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {:?}", e);
        return String::default();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        warn!("custom metrics could not be from_utf8'd: {:?}", e);
        String::default()
    })
}
