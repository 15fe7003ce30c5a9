//! Ticket store metrics
//!
//! Upserts, appended messages, timestamp fallbacks taken on the write path,
//! and store errors.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_upsert(created: bool, messages_appended: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "store", "upserts")).increment(1);
        if created {
            ::metrics::counter!(phase_metric!(counter, "store", "tickets_created")).increment(1);
        }
        ::metrics::counter!(phase_metric!(counter, "store", "messages_appended"))
            .increment(messages_appended as u64);
        ::metrics::histogram!(phase_metric!(histogram, "store", "upsert_duration_seconds"))
            .record(duration_secs);
    }

    /// Unparseable or absent timestamps replaced by the current instant
    pub fn record_timestamp_fallbacks(count: usize) {
        if count > 0 {
            ::metrics::counter!(phase_metric!(counter, "store", "timestamp_fallbacks"))
                .increment(count as u64);
        }
    }

    pub fn record_delete(found: bool) {
        let outcome = if found { "deleted" } else { "missing" };
        ::metrics::counter!(phase_metric!(counter, "store", "deletes"), "outcome" => outcome)
            .increment(1);
    }

    pub fn record_error(operation: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "store", "errors"), "operation" => operation)
            .increment(1);
    }

    pub fn set_ticket_count(count: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "store", "tickets")).set(count as f64);
    }
}

impl PhaseMetrics for StoreMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "store", "upserts"));
        let _ = counter!(phase_metric!(counter, "store", "tickets_created"));
        let _ = counter!(phase_metric!(counter, "store", "messages_appended"));
        let _ = counter!(phase_metric!(counter, "store", "timestamp_fallbacks"));
        let _ = histogram!(phase_metric!(histogram, "store", "upsert_duration_seconds"));
        let _ = gauge!(phase_metric!(gauge, "store", "tickets"));
    }

    fn phase_name() -> &'static str {
        "store"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "store", "upserts"),
                metric_type: MetricType::Counter,
                help: "Tickets written to the store",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "tickets_created"),
                metric_type: MetricType::Counter,
                help: "Upserts that inserted a new ticket id",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "messages_appended"),
                metric_type: MetricType::Counter,
                help: "Messages appended to existing or new tickets",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "timestamp_fallbacks"),
                metric_type: MetricType::Counter,
                help: "Timestamps stored as the current instant because they could not be parsed",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "deletes"),
                metric_type: MetricType::Counter,
                help: "Delete requests by outcome",
                labels: vec!["outcome"],
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "errors"),
                metric_type: MetricType::Counter,
                help: "Store operations that failed",
                labels: vec!["operation"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "store", "upsert_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent writing one ticket",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "store", "tickets"),
                metric_type: MetricType::Gauge,
                help: "Tickets in the store at the last count",
                labels: vec![],
            },
        ]
    }
}
