use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use cbexporter_common::error::{ExporterError, Result};

use crate::metrics::types::{
    CollectedMetric, LabelPairs, MetricDescriptor, MetricSample, MetricType, MetricValue,
};

type LabelValues = Vec<String>;

trait RegisteredMetric: Send + Sync {
    fn descriptor(&self) -> &MetricDescriptor;
    fn collect(&self) -> Vec<MetricSample>;
}

/// Process-wide set of metrics, keyed by metric name. Constructed once at
/// startup and shared by `Arc` between the collectors and the HTTP surface.
pub struct MetricsRegistry {
    metrics: RwLock<HashMap<String, Arc<dyn RegisteredMetric>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Arc<CounterMetric>> {
        let metric = Arc::new(CounterMetric {
            descriptor: MetricDescriptor::new(name, help, MetricType::Counter, label_names),
            series: SeriesMap::new(),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        let metric = Arc::new(GaugeMetric {
            descriptor: MetricDescriptor::new(name, help, MetricType::Gauge, label_names),
            series: SeriesMap::new(),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<Arc<HistogramMetric>> {
        let mut bounds = buckets.to_vec();
        bounds.sort_by(|left, right| left.total_cmp(right));

        let metric = Arc::new(HistogramMetric {
            descriptor: MetricDescriptor::new(name, help, MetricType::Histogram, label_names),
            bounds,
            series: SeriesMap::new(),
        });
        self.register(metric.clone())?;
        Ok(metric)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every metric, sorted by name, samples sorted by labels.
    pub fn collect_all(&self) -> Vec<CollectedMetric> {
        let metrics = match self.metrics.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut collected = metrics
            .values()
            .map(|metric| {
                let mut samples = metric.collect();
                samples.sort_by(|left, right| left.labels.cmp(&right.labels));
                CollectedMetric {
                    descriptor: metric.descriptor().clone(),
                    samples,
                }
            })
            .collect::<Vec<_>>();

        collected.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        collected
    }

    /// Prometheus text exposition format, version 0.0.4.
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for metric in self.collect_all() {
            let name = &metric.descriptor.name;
            output.push_str(&format!(
                "# HELP {name} {}\n",
                escape_help(&metric.descriptor.help)
            ));
            output.push_str(&format!(
                "# TYPE {name} {}\n",
                metric.descriptor.metric_type.as_prometheus_type()
            ));

            for sample in metric.samples {
                match sample.value {
                    MetricValue::Scalar(value) => {
                        output.push_str(&render_sample_line(name, &sample.labels, value));
                    }
                    MetricValue::Histogram {
                        buckets,
                        count,
                        sum,
                    } => {
                        let mut cumulative = 0_u64;
                        for (bound, bucket_count) in buckets {
                            cumulative = cumulative.saturating_add(bucket_count);
                            let mut labels = sample.labels.clone();
                            labels.push(("le".to_string(), format_bucket_bound(bound)));
                            output.push_str(&render_sample_line(
                                &format!("{name}_bucket"),
                                &labels,
                                cumulative as f64,
                            ));
                        }

                        output.push_str(&render_sample_line(
                            &format!("{name}_sum"),
                            &sample.labels,
                            sum,
                        ));
                        output.push_str(&render_sample_line(
                            &format!("{name}_count"),
                            &sample.labels,
                            count as f64,
                        ));
                    }
                }
            }
        }

        output
    }

    fn register<M: RegisteredMetric + 'static>(&self, metric: Arc<M>) -> Result<()> {
        let name = metric.descriptor().name.clone();
        if name.is_empty() {
            return Err(ExporterError::InvalidArgument(
                "metric name must not be empty".to_string(),
            ));
        }

        let mut metrics = self.metrics.write().map_err(|_| {
            ExporterError::InternalError("failed to acquire metrics registry lock".to_string())
        })?;

        if metrics.contains_key(&name) {
            return Err(ExporterError::InvalidArgument(format!(
                "metric already registered: {name}"
            )));
        }

        metrics.insert(name, metric);
        Ok(())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Label values to per-series state. Each series is an independent cell, so
/// writers only contend on the map when a new label tuple first appears.
struct SeriesMap<T> {
    series: RwLock<HashMap<LabelValues, Arc<T>>>,
}

impl<T> SeriesMap<T> {
    fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, label_values: &LabelValues) -> Option<Arc<T>> {
        self.series.read().ok()?.get(label_values).cloned()
    }

    fn get_or_insert_with(&self, label_values: LabelValues, init: impl Fn() -> T) -> Arc<T> {
        if let Some(existing) = self.get(&label_values) {
            return existing;
        }

        match self.series.write() {
            Ok(mut guard) => guard
                .entry(label_values)
                .or_insert_with(|| Arc::new(init()))
                .clone(),
            Err(_) => Arc::new(init()),
        }
    }

    fn snapshot(&self) -> Vec<(LabelValues, Arc<T>)> {
        match self.series.read() {
            Ok(guard) => guard
                .iter()
                .map(|(labels, value)| (labels.clone(), value.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub struct CounterMetric {
    descriptor: MetricDescriptor,
    series: SeriesMap<AtomicU64>,
}

impl CounterMetric {
    pub fn inc(&self, labels: &[&str], value: u64) {
        let label_values = normalize_labels(&self.descriptor, labels);
        self.series
            .get_or_insert_with(label_values, || AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc_one(&self, labels: &[&str]) {
        self.inc(labels, 1);
    }

    pub fn get(&self, labels: &[&str]) -> Option<u64> {
        self.series
            .get(&normalize_labels(&self.descriptor, labels))
            .map(|value| value.load(Ordering::Relaxed))
    }
}

impl RegisteredMetric for CounterMetric {
    fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series
            .snapshot()
            .into_iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(&self.descriptor, &label_values),
                value: MetricValue::Scalar(value.load(Ordering::Relaxed) as f64),
            })
            .collect()
    }
}

/// A labeled gauge holding the last value set for each label tuple. Values
/// are stored as `f64` bit patterns.
pub struct GaugeMetric {
    descriptor: MetricDescriptor,
    series: SeriesMap<AtomicU64>,
}

impl GaugeMetric {
    pub fn set(&self, labels: &[&str], value: f64) {
        let label_values = normalize_labels(&self.descriptor, labels);
        self.series
            .get_or_insert_with(label_values, || AtomicU64::new(0_f64.to_bits()))
            .store(value.to_bits(), Ordering::Relaxed);
    }

    /// `None` until a value has been set for `labels`.
    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.series
            .get(&normalize_labels(&self.descriptor, labels))
            .map(|value| f64::from_bits(value.load(Ordering::Relaxed)))
    }
}

impl RegisteredMetric for GaugeMetric {
    fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series
            .snapshot()
            .into_iter()
            .map(|(label_values, value)| MetricSample {
                labels: materialize_labels(&self.descriptor, &label_values),
                value: MetricValue::Scalar(f64::from_bits(value.load(Ordering::Relaxed))),
            })
            .collect()
    }
}

pub struct HistogramMetric {
    descriptor: MetricDescriptor,
    bounds: Vec<f64>,
    series: SeriesMap<HistogramSeries>,
}

struct HistogramSeries {
    bucket_counts: Vec<AtomicU64>,
    count: AtomicU64,
    sum: Mutex<f64>,
}

impl HistogramSeries {
    fn new(bucket_count: usize) -> Self {
        Self {
            bucket_counts: (0..bucket_count).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum: Mutex::new(0.0),
        }
    }
}

impl HistogramMetric {
    pub fn observe(&self, labels: &[&str], value: f64) {
        let label_values = normalize_labels(&self.descriptor, labels);
        // One slot per bound plus the trailing +Inf slot.
        let slots = self.bounds.len() + 1;
        let series = self
            .series
            .get_or_insert_with(label_values, || HistogramSeries::new(slots));

        let bucket_index = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bounds.len());

        if let Some(bucket) = series.bucket_counts.get(bucket_index) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }

        series.count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut sum) = series.sum.lock() {
            *sum += value;
        }
    }
}

impl RegisteredMetric for HistogramMetric {
    fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    fn collect(&self) -> Vec<MetricSample> {
        self.series
            .snapshot()
            .into_iter()
            .map(|(label_values, entry)| {
                let buckets = self
                    .bounds
                    .iter()
                    .copied()
                    .chain(std::iter::once(f64::INFINITY))
                    .zip(entry.bucket_counts.iter())
                    .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
                    .collect::<Vec<_>>();

                let sum = entry.sum.lock().map(|value| *value).unwrap_or(0.0);

                MetricSample {
                    labels: materialize_labels(&self.descriptor, &label_values),
                    value: MetricValue::Histogram {
                        buckets,
                        count: entry.count.load(Ordering::Relaxed),
                        sum,
                    },
                }
            })
            .collect()
    }
}

/// Pads missing label values with `""` and drops extras so every series of a
/// metric has exactly the declared arity.
fn normalize_labels(descriptor: &MetricDescriptor, labels: &[&str]) -> LabelValues {
    (0..descriptor.label_names.len())
        .map(|index| labels.get(index).copied().unwrap_or_default().to_string())
        .collect()
}

fn materialize_labels(descriptor: &MetricDescriptor, values: &[String]) -> LabelPairs {
    descriptor
        .label_names
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn render_sample_line(name: &str, labels: &[(String, String)], value: f64) -> String {
    let mut rendered = String::from(name);

    if !labels.is_empty() {
        let pairs = labels
            .iter()
            .map(|(key, value)| format!("{key}=\"{}\"", escape_label_value(value)))
            .collect::<Vec<_>>();
        rendered.push('{');
        rendered.push_str(&pairs.join(","));
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(&format_metric_value(value));
    rendered.push('\n');
    rendered
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let rendered = if value.is_sign_positive() { "+Inf" } else { "-Inf" };
        rendered.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn format_bucket_bound(value: f64) -> String {
    if value.is_infinite() {
        "+Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use cbexporter_common::error::ExporterError;

    use super::MetricsRegistry;

    #[test]
    fn gauge_keeps_last_value_per_label_tuple() {
        let registry = MetricsRegistry::new();
        let gauge = registry
            .register_gauge("cb_items", "Items", &["bucket", "node"])
            .unwrap();

        gauge.set(&["a", "n1"], 5.0);
        gauge.set(&["a", "n1"], 7.5);
        gauge.set(&["b", "n1"], 1.0);

        assert_eq!(gauge.get(&["a", "n1"]), Some(7.5));
        assert_eq!(gauge.get(&["b", "n1"]), Some(1.0));
        assert_eq!(gauge.get(&["c", "n1"]), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = MetricsRegistry::new();
        registry.register_gauge("dup", "first", &[]).unwrap();

        let err = registry.register_counter("dup", "second", &[]).err();
        assert!(matches!(err, Some(ExporterError::InvalidArgument(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn renders_text_format() {
        let registry = MetricsRegistry::new();
        let gauge = registry
            .register_gauge(
                "cbpernodebucket_curr_items",
                "Current items",
                &["bucket", "node", "cluster"],
            )
            .unwrap();
        gauge.set(&["default", "node1", "prod"], 30.0);
        gauge.set(&["a\"b", "node1", "prod"], 0.25);

        let text = registry.render_prometheus();

        assert!(text.contains("# HELP cbpernodebucket_curr_items Current items\n"));
        assert!(text.contains("# TYPE cbpernodebucket_curr_items gauge\n"));
        assert!(text.contains(
            "cbpernodebucket_curr_items{bucket=\"default\",node=\"node1\",cluster=\"prod\"} 30\n"
        ));
        assert!(text.contains(
            "cbpernodebucket_curr_items{bucket=\"a\\\"b\",node=\"node1\",cluster=\"prod\"} 0.25\n"
        ));
    }

    #[test]
    fn unset_gauges_render_headers_only() {
        let registry = MetricsRegistry::new();
        registry.register_gauge("idle", "", &["bucket"]).unwrap();

        assert_eq!(registry.render_prometheus(), "# HELP idle \n# TYPE idle gauge\n");
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram("latency_seconds", "Latency", &["method"], &[1.0, 0.5])
            .unwrap();

        histogram.observe(&["GET"], 0.25);
        histogram.observe(&["GET"], 0.5);
        histogram.observe(&["GET"], 3.0);

        let text = registry.render_prometheus();
        assert!(text.contains("latency_seconds_bucket{method=\"GET\",le=\"0.5\"} 2\n"));
        assert!(text.contains("latency_seconds_bucket{method=\"GET\",le=\"1\"} 2\n"));
        assert!(text.contains("latency_seconds_bucket{method=\"GET\",le=\"+Inf\"} 3\n"));
        assert!(text.contains("latency_seconds_sum{method=\"GET\"} 3.75\n"));
        assert!(text.contains("latency_seconds_count{method=\"GET\"} 3\n"));
    }

    #[test]
    fn counters_accumulate() {
        let registry = MetricsRegistry::new();
        let counter = registry
            .register_counter("requests_total", "Requests", &["status"])
            .unwrap();

        counter.inc_one(&["200"]);
        counter.inc(&["200"], 2);

        assert_eq!(counter.get(&["200"]), Some(3));
    }
}
