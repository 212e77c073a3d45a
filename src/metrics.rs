//! Prometheus metrics for stakescope.
//!
//! Counters and histograms for analyses, event source calls, rate limiting,
//! and cache performance. Without an installed recorder these are no-ops.

use eyre::{Result, WrapErr};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Record a completed analysis.
pub fn record_analysis(stakers: u64, nfts: u64, duration_ms: u64) {
    counter!("analyses_total").increment(1);
    gauge!("last_analysis_stakers").set(stakers as f64);
    gauge!("last_analysis_nfts").set(nfts as f64);
    histogram!("analysis_duration_ms").record(duration_ms as f64);
}

/// Record an event source fetch.
pub fn record_source_call(source: &str, success: bool, duration_ms: u64) {
    counter!("source_calls_total", "source" => source.to_string(), "success" => success.to_string())
        .increment(1);
    histogram!("source_call_duration_ms").record(duration_ms as f64);
}

/// Record a rejected request by error kind.
pub fn record_error(kind: &str) {
    counter!("analysis_errors_total", "kind" => kind.to_string()).increment(1);
}

/// Record a rate limit hit.
pub fn record_rate_limit_hit() {
    counter!("rate_limit_hits_total").increment(1);
}

/// Record a cache hit.
pub fn record_cache_hit() {
    counter!("cache_hits_total").increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!("cache_misses_total").increment(1);
}

/// Install the Prometheus exporter as the global recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("Failed to install Prometheus recorder")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_an_error() {
        let _ = install_prometheus_recorder();
        assert!(install_prometheus_recorder().is_err());
    }
}
