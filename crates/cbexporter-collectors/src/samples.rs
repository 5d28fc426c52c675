//! Turning sample series from the stats payload into a single published value.

use std::borrow::Cow;

use cbexporter_metrics::GaugeMetric;
use serde_json::Value;

/// Splits `text` on single spaces and keeps the tokens that parse as `f64`,
/// in their original order. Empty and malformed tokens are dropped, as are
/// numerals too large for `f64`. Spelled-out `inf` and `nan` are kept.
pub fn extract_series(text: &str) -> Vec<f64> {
    text.split(' ')
        .filter_map(|token| {
            let value = token.parse::<f64>().ok()?;
            (value.is_finite() || is_non_finite_literal(token)).then_some(value)
        })
        .collect()
}

fn is_non_finite_literal(token: &str) -> bool {
    token
        .trim_start_matches(['+', '-'])
        .bytes()
        .all(|byte| byte.is_ascii_alphabetic())
}

/// Space separated text form of a sample value. Arrays are joined element by
/// element; values that are not series (null, objects, booleans) render as
/// text that yields no samples.
pub fn series_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(text) => Cow::Borrowed(text.as_str()),
        Value::Number(number) => Cow::Owned(number.to_string()),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Null | Value::Bool(_) | Value::Object(_) => Cow::Borrowed(""),
    }
}

/// Sets the gauge to the newest sample. An empty series leaves the previous
/// value in place. Returns whether a value was written.
pub fn publish_latest(gauge: &GaugeMetric, series: &[f64], labels: &[&str]) -> bool {
    match series.last() {
        Some(latest) => {
            gauge.set(labels, *latest);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use cbexporter_metrics::MetricsRegistry;
    use serde_json::json;

    use super::{extract_series, publish_latest, series_text};

    #[test]
    fn drops_unparseable_tokens_in_order() {
        assert_eq!(extract_series("1.0 bad 2.5 "), vec![1.0, 2.5]);
        assert_eq!(extract_series("3 -4e2 0.5"), vec![3.0, -400.0, 0.5]);
    }

    #[test]
    fn out_of_range_numerals_are_dropped() {
        assert_eq!(extract_series("5 1e400"), vec![5.0]);
        assert_eq!(extract_series("-1e400 2"), vec![2.0]);

        let spelled = extract_series("+Inf -inf NaN");
        assert_eq!(spelled.len(), 3);
        assert_eq!(spelled[0], f64::INFINITY);
        assert_eq!(spelled[1], f64::NEG_INFINITY);
        assert!(spelled[2].is_nan());
    }

    #[test]
    fn empty_and_garbage_yield_nothing() {
        assert!(extract_series("").is_empty());
        assert!(extract_series("   ").is_empty());
        assert!(extract_series("n/a <nil>").is_empty());
    }

    #[test]
    fn only_single_spaces_separate_tokens() {
        assert_eq!(extract_series("1\t2 3"), vec![3.0]);
    }

    #[test]
    fn series_text_handles_payload_shapes() {
        assert_eq!(series_text(&json!("10 20 30")), "10 20 30");
        assert_eq!(series_text(&json!([10, 20.5, 30])), "10 20.5 30");
        assert_eq!(series_text(&json!(42)), "42");
        assert_eq!(series_text(&json!(null)), "");
        assert_eq!(series_text(&json!({"a": 1})), "");
    }

    #[test]
    fn array_with_nulls_keeps_numeric_entries() {
        let value = json!([1, null, 3]);
        let text = series_text(&value);
        assert_eq!(extract_series(&text), vec![1.0, 3.0]);
    }

    #[test]
    fn publish_sets_last_sample_and_skips_empty() {
        let registry = MetricsRegistry::new();
        let gauge = registry.register_gauge("g", "", &["bucket"]).unwrap();

        assert!(publish_latest(&gauge, &[5.0], &["b"]));
        assert_eq!(gauge.get(&["b"]), Some(5.0));

        assert!(!publish_latest(&gauge, &[], &["b"]));
        assert_eq!(gauge.get(&["b"]), Some(5.0));

        assert!(publish_latest(&gauge, &[3.0, 7.0], &["b"]));
        assert_eq!(gauge.get(&["b"]), Some(7.0));
    }

    #[test]
    fn empty_series_never_creates_a_series() {
        let registry = MetricsRegistry::new();
        let gauge = registry.register_gauge("g", "", &["bucket"]).unwrap();

        publish_latest(&gauge, &extract_series("bad"), &["b"]);

        assert_eq!(gauge.get(&["b"]), None);
    }
}
