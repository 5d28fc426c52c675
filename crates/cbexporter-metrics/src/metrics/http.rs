use std::{sync::Arc, time::Duration};

use cbexporter_common::error::Result;

use crate::metrics::registry::{CounterMetric, HistogramMetric, MetricsRegistry};

/// Instrumentation of the exporter's own HTTP endpoints.
pub struct HttpMetrics {
    requests_total: Arc<CounterMetric>,
    request_duration_seconds: Arc<HistogramMetric>,
}

impl HttpMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let requests_total = registry.register_counter(
            "cbexporter_http_requests_total",
            "Total number of requests served by the exporter",
            &["method", "status"],
        )?;

        let request_duration_seconds = registry.register_histogram(
            "cbexporter_http_request_duration_seconds",
            "Duration of exporter HTTP requests in seconds",
            &["method", "status"],
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
        )?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
        })
    }

    pub fn record_request(&self, method: &str, status: u16, duration: Duration) {
        let status_value = status.to_string();
        self.requests_total.inc_one(&[method, &status_value]);
        self.request_duration_seconds
            .observe(&[method, &status_value], duration.as_secs_f64());
    }

    pub fn requests(&self, method: &str, status: u16) -> u64 {
        self.requests_total
            .get(&[method, &status.to_string()])
            .unwrap_or(0)
    }
}
