pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;

pub use metrics::{CounterMetric, GaugeMetric, HistogramMetric, HttpMetrics, MetricsRegistry};
pub use router::{ExporterState, exporter_router};
