pub mod http;
pub mod registry;
pub mod types;

pub use http::HttpMetrics;
pub use registry::{CounterMetric, GaugeMetric, HistogramMetric, MetricsRegistry};
pub use types::{MetricDescriptor, MetricType, MetricValue};
