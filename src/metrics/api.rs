//! HTTP API metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ApiMetrics;

impl ApiMetrics {
    pub fn record_request(route: &str, status: u16, duration_secs: f64) {
        ::metrics::counter!(
            phase_metric!(counter, "api", "requests"),
            "route" => route.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        ::metrics::histogram!(
            phase_metric!(histogram, "api", "request_duration_seconds"),
            "route" => route.to_string()
        )
        .record(duration_secs);
    }

    pub fn record_dashboard_built(total_tickets: usize, unparsed_dates: usize) {
        ::metrics::counter!(phase_metric!(counter, "api", "dashboards_built")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "api", "unparsed_dates")).set(unparsed_dates as f64);
        ::metrics::gauge!(phase_metric!(gauge, "api", "dashboard_tickets")).set(total_tickets as f64);
    }
}

impl PhaseMetrics for ApiMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge};

        let _ = counter!(phase_metric!(counter, "api", "dashboards_built"));
        let _ = gauge!(phase_metric!(gauge, "api", "unparsed_dates"));
        let _ = gauge!(phase_metric!(gauge, "api", "dashboard_tickets"));
    }

    fn phase_name() -> &'static str {
        "api"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "api", "requests"),
                metric_type: MetricType::Counter,
                help: "HTTP requests by route and status code",
                labels: vec!["route", "status"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "api", "request_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "HTTP handler latency",
                labels: vec!["route"],
            },
            MetricDoc {
                name: phase_metric!(counter, "api", "dashboards_built"),
                metric_type: MetricType::Counter,
                help: "Dashboard summaries computed",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "api", "unparsed_dates"),
                metric_type: MetricType::Gauge,
                help: "Tickets left out of date aggregates in the last dashboard",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "api", "dashboard_tickets"),
                metric_type: MetricType::Gauge,
                help: "Tickets covered by the last dashboard",
                labels: vec![],
            },
        ]
    }
}
