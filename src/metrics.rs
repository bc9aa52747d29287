//! Prometheus counters
//!
//! Registered in the default registry and exposed by `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

lazy_static! {
    /// Browser sessions started to capture a token
    pub static ref EXTRACTOR_RUNS: IntCounter = register_int_counter!(
        "tunein_token_extractor_runs_total",
        "Token extractor browser sessions started"
    )
    .unwrap();

    /// Extractor runs that ended without a token
    pub static ref EXTRACTOR_FAILURES: IntCounter = register_int_counter!(
        "tunein_token_extractor_failures_total",
        "Token extractor runs that did not observe a token"
    )
    .unwrap();

    /// Secondary live playlist requests
    pub static ref STREAM_PROBES: IntCounter = register_int_counter!(
        "tunein_stream_probes_total",
        "Live playlist probes issued during stream expansion"
    )
    .unwrap();

    /// Secondary requests that failed or returned nothing usable
    pub static ref STREAM_PROBE_FAILURES: IntCounter = register_int_counter!(
        "tunein_stream_probe_failures_total",
        "Live playlist probes that failed"
    )
    .unwrap();

    /// Addon requests by resource and outcome
    pub static ref RESOURCE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "tunein_resource_requests_total",
        "Addon resource requests",
        &["resource", "outcome"]
    )
    .unwrap();
}
