//! Centralized metrics infrastructure for the ticket dashboard
//!
//! Each area of the service (store, api) defines its metrics in a dedicated
//! submodule, so names have a single owner and conflicts surface at startup.

pub mod api;
pub mod registry;
pub mod store;

pub use api::ApiMetrics;
pub use store::StoreMetrics;

use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Initialize the global metrics recorder
///
/// Idempotent. Installs a Prometheus recorder without its own listener; the
/// HTTP server exposes the rendered snapshot on `/metrics`.
pub fn init_metrics() {
    INIT.call_once(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

        match builder.install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("metrics handle was already stored");
                }
                info!("Prometheus recorder installed");

                registry::register_all_metrics();
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Prometheus text rendering of every recorded metric, if a recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

/// Implemented by each area's metrics collection
pub trait PhaseMetrics {
    /// Pre-register every metric so it shows up before the first event
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names as `ticket_dash_{area}_{name}`, with `_total` on counters
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("ticket_dash_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("ticket_dash_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("ticket_dash_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "store", "upserts"),
            "ticket_dash_store_upserts_total"
        );
        assert_eq!(
            phase_metric!(histogram, "api", "request_duration_seconds"),
            "ticket_dash_api_request_duration_seconds"
        );
        assert_eq!(
            phase_metric!(gauge, "store", "tickets"),
            "ticket_dash_store_tickets"
        );
    }

    #[test]
    fn test_every_documented_metric_uses_the_prefix() {
        let docs = StoreMetrics::metrics_documentation()
            .into_iter()
            .chain(ApiMetrics::metrics_documentation());
        for doc in docs {
            assert!(doc.name.starts_with("ticket_dash_"), "{}", doc.name);
            if doc.metric_type == MetricType::Counter {
                assert!(doc.name.ends_with("_total"), "{}", doc.name);
            }
        }
    }
}
