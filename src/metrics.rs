// Metrics and observability module
// This file defines the per-consumer stream instruments, applies consumer
// records to them and renders the registry in the Prometheus text format
//
// Numan Thabit 2025 Nov

use crate::consumer::{ConsumerLabels, ConsumerRecord};
use prometheus::{CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

pub const METRIC_ACTIVE_OFFSET: &str = "rabbitmq_stream_consumer_active_offset";
pub const METRIC_ACTIVE_OFFSET_LAG: &str = "rabbitmq_stream_consumer_active_offset_lag";
pub const METRIC_ACTIVE_MESSAGES_CONSUMED: &str =
    "rabbitmq_stream_consumer_active_messages_consumed_total";
pub const METRIC_ACTIVE_STATUS: &str = "rabbitmq_stream_consumer_active_status";
pub const METRIC_CONSUMERS_TOTAL: &str = "rabbitmq_stream_consumers_total";
pub const METRIC_LAST_SCRAPE: &str = "rabbitmq_stream_exporter_last_scrape_timestamp";

const HELP_ACTIVE_OFFSET: &str = "Current offset of the active consumer";
const HELP_ACTIVE_OFFSET_LAG: &str =
    "Consumer lag (difference between stream end and consumer offset lag)";
const HELP_ACTIVE_MESSAGES_CONSUMED: &str =
    "Total number of messages consumed by the active consumer";
const HELP_ACTIVE_STATUS: &str = "Whether the consumer is active (1) or inactive (0)";
const HELP_CONSUMERS_TOTAL: &str = "Total number of consumers per stream";
const HELP_LAST_SCRAPE: &str = "Timestamp of the last successful scrape";

enum Instrument {
    /// Written only for active consumers that report the field.
    ActiveGauge {
        gauge: GaugeVec,
        value: fn(&ConsumerRecord) -> Option<f64>,
    },
    /// Accumulates within one refresh cycle, cleared by `reset_all`.
    CycleCounter {
        counter: CounterVec,
        increment: fn(&ConsumerRecord) -> f64,
    },
}

pub struct StreamMetrics {
    instruments: Vec<Instrument>,
}

impl StreamMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let instruments = vec![
            Instrument::ActiveGauge {
                gauge: gauge_vec(registry, METRIC_ACTIVE_OFFSET, HELP_ACTIVE_OFFSET)?,
                value: |r| r.offset,
            },
            Instrument::ActiveGauge {
                gauge: gauge_vec(registry, METRIC_ACTIVE_OFFSET_LAG, HELP_ACTIVE_OFFSET_LAG)?,
                value: |r| r.offset_lag,
            },
            Instrument::ActiveGauge {
                gauge: gauge_vec(
                    registry,
                    METRIC_ACTIVE_MESSAGES_CONSUMED,
                    HELP_ACTIVE_MESSAGES_CONSUMED,
                )?,
                value: |r| r.consumed,
            },
            Instrument::CycleCounter {
                counter: counter_vec(registry, METRIC_ACTIVE_STATUS, HELP_ACTIVE_STATUS)?,
                increment: |r| if r.is_active() { 1.0 } else { 0.0 },
            },
            Instrument::CycleCounter {
                counter: counter_vec(registry, METRIC_CONSUMERS_TOTAL, HELP_CONSUMERS_TOTAL)?,
                increment: |_| 1.0,
            },
        ];
        Ok(Self { instruments })
    }

    /// Drop every counter series; gauges keep their last value.
    pub fn reset_all(&self) {
        for instrument in &self.instruments {
            if let Instrument::CycleCounter { counter, .. } = instrument {
                counter.reset();
            }
        }
    }

    pub fn update_for_consumer(&self, record: &ConsumerRecord) {
        let labels = ConsumerLabels::from_record(record);
        let values = labels.values();
        for instrument in &self.instruments {
            match instrument {
                Instrument::ActiveGauge { gauge, value } => {
                    if !record.is_active() {
                        continue;
                    }
                    if let Some(v) = value(record) {
                        gauge.with_label_values(&values).set(v);
                    }
                }
                Instrument::CycleCounter { counter, increment } => {
                    counter.with_label_values(&values).inc_by(increment(record));
                }
            }
        }
    }
}

pub fn register_last_scrape(registry: &Registry) -> prometheus::Result<Gauge> {
    let gauge = Gauge::new(METRIC_LAST_SCRAPE, HELP_LAST_SCRAPE)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

pub fn render(registry: &Registry) -> prometheus::Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(format!("metrics are not utf-8: {e}")))
}

fn gauge_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &ConsumerLabels::NAMES)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn counter_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<CounterVec> {
    let counter = CounterVec::new(Opts::new(name, help), &ConsumerLabels::NAMES)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Current value of one series, `None` when it was never written.
    pub(crate) fn sample(registry: &Registry, name: &str, labels: [&str; 3]) -> Option<f64> {
        let family = registry.gather().into_iter().find(|f| f.get_name() == name)?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label().iter().all(|pair| {
                    let idx = ConsumerLabels::NAMES
                        .iter()
                        .position(|n| *n == pair.get_name())
                        .unwrap();
                    pair.get_value() == labels[idx]
                })
            })
            .map(|m| {
                if m.has_counter() {
                    m.get_counter().get_value()
                } else {
                    m.get_gauge().get_value()
                }
            })
    }

    fn record(value: serde_json::Value) -> ConsumerRecord {
        serde_json::from_value(value).unwrap()
    }

    fn setup() -> (Registry, StreamMetrics) {
        let registry = Registry::new();
        let metrics = StreamMetrics::new(&registry).unwrap();
        (registry, metrics)
    }

    const S1_C1: [&str; 3] = ["", "s1", "c1"];

    #[test]
    fn active_record_populates_every_instrument() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": true,
            "offset": 42,
            "offset_lag": 3,
            "consumed": 100,
            "properties": { "name": "c1" },
            "queue": { "name": "s1" }
        })));

        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), Some(42.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET_LAG, S1_C1), Some(3.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_MESSAGES_CONSUMED, S1_C1), Some(100.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_STATUS, S1_C1), Some(1.0));
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, S1_C1), Some(1.0));
    }

    #[test]
    fn inactive_record_never_writes_gauges() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": false,
            "offset": 42,
            "offset_lag": 3,
            "consumed": 100,
            "properties": { "name": "c1" },
            "queue": { "name": "s1" }
        })));

        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), None);
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET_LAG, S1_C1), None);
        assert_eq!(sample(&registry, METRIC_ACTIVE_MESSAGES_CONSUMED, S1_C1), None);
        // Presence is still recorded.
        assert_eq!(sample(&registry, METRIC_ACTIVE_STATUS, S1_C1), Some(0.0));
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, S1_C1), Some(1.0));
    }

    #[test]
    fn inactive_record_keeps_previous_gauge_value() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": true, "offset": 10, "properties": { "name": "c1" }, "queue": { "name": "s1" }
        })));
        metrics.update_for_consumer(&record(json!({
            "active": false, "offset": 99, "properties": { "name": "c1" }, "queue": { "name": "s1" }
        })));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), Some(10.0));
    }

    #[test]
    fn zero_offset_is_written_and_missing_fields_are_skipped() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": true, "offset": 0, "properties": { "name": "c1" }, "queue": { "name": "s1" }
        })));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), Some(0.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET_LAG, S1_C1), None);
        assert_eq!(sample(&registry, METRIC_ACTIVE_MESSAGES_CONSUMED, S1_C1), None);
    }

    #[test]
    fn colliding_labels_double_count_and_last_gauge_wins() {
        let (registry, metrics) = setup();
        for offset in [5, 8] {
            metrics.update_for_consumer(&record(json!({
                "active": true,
                "offset": offset,
                "properties": { "name": "c1" },
                "queue": { "name": "s1" }
            })));
        }
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, S1_C1), Some(2.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_STATUS, S1_C1), Some(2.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), Some(8.0));
    }

    #[test]
    fn reset_clears_counters_but_not_gauges() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": true, "offset": 42, "properties": { "name": "c1" }, "queue": { "name": "s1" }
        })));
        metrics.reset_all();

        assert_eq!(sample(&registry, METRIC_ACTIVE_STATUS, S1_C1), None);
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, S1_C1), None);
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), Some(42.0));

        metrics.update_for_consumer(&record(json!({
            "active": true, "offset": 43, "properties": { "name": "c1" }, "queue": { "name": "s1" }
        })));
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, S1_C1), Some(1.0));
    }

    #[test]
    fn malformed_unused_field_is_still_counted() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": true,
            "offset": 42.0,
            "credits": "lots",
            "connection_details": { "peer_port": 70000 },
            "properties": { "name": "c1" },
            "queue": { "name": "s1" }
        })));
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, S1_C1), Some(1.0));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, S1_C1), Some(42.0));
    }

    #[test]
    fn record_without_nested_objects_uses_empty_labels() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({ "active": true, "offset": 1 })));
        assert_eq!(sample(&registry, METRIC_ACTIVE_OFFSET, ["", "", ""]), Some(1.0));
        assert_eq!(sample(&registry, METRIC_CONSUMERS_TOTAL, ["", "", ""]), Some(1.0));
    }

    #[test]
    fn super_stream_becomes_a_label() {
        let (registry, metrics) = setup();
        metrics.update_for_consumer(&record(json!({
            "active": true,
            "offset_lag": 12,
            "properties": { "name": "c1", "super-stream": "orders" },
            "queue": { "name": "orders-1" }
        })));
        assert_eq!(
            sample(&registry, METRIC_ACTIVE_OFFSET_LAG, ["orders", "orders-1", "c1"]),
            Some(12.0)
        );
    }

    #[test]
    fn renders_text_exposition() {
        let (registry, metrics) = setup();
        let last_scrape = register_last_scrape(&registry).unwrap();
        last_scrape.set(1_700_000_000_000.0);
        metrics.update_for_consumer(&record(json!({
            "active": true, "offset": 42, "properties": { "name": "c1" }, "queue": { "name": "s1" }
        })));

        let text = render(&registry).unwrap();
        assert!(text.contains("# TYPE rabbitmq_stream_consumer_active_offset gauge"));
        assert!(text.contains("# TYPE rabbitmq_stream_consumers_total counter"));
        assert!(text.contains(
            r#"rabbitmq_stream_consumer_active_offset{consumer_name="c1",stream="s1",superstream=""} 42"#
        ));
        assert!(text.contains("rabbitmq_stream_exporter_last_scrape_timestamp 1700000000000"));
    }
}
