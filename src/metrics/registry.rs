//! Registration of every area's metrics, with conflict detection

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::store::StoreMetrics>(&mut all_metrics);
    register_phase_metrics::<super::api::ApiMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all areas",
        all_metrics.len()
    );

    if std::env::var("TICKET_DASH_METRICS_DEBUG").is_ok() {
        log_metrics_summary(&all_metrics);
    }
}

/// Register one area's metrics; returns the names that were already taken
fn register_phase_metrics<T: PhaseMetrics>(
    all_metrics: &mut HashMap<String, (&'static str, MetricDoc)>,
) -> Vec<&'static str> {
    T::register_metrics();
    let phase_name = T::phase_name();
    let mut conflicts = Vec::new();

    for doc in T::metrics_documentation() {
        if let Some((owner, _)) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined by both '{}' and '{}'",
                doc.name, owner, phase_name
            );
            conflicts.push(doc.name);
        } else {
            all_metrics.insert(doc.name.to_string(), (phase_name, doc));
        }
    }
    conflicts
}

fn log_metrics_summary(all_metrics: &HashMap<String, (&'static str, MetricDoc)>) {
    let mut by_phase: HashMap<&str, Vec<&MetricDoc>> = HashMap::new();
    for doc in all_metrics.values().map(|(_, doc)| doc) {
        by_phase
            .entry(extract_phase_from_metric_name(doc.name))
            .or_default()
            .push(doc);
    }

    for (phase, metrics) in by_phase {
        info!("Area '{}': {} metrics", phase, metrics.len());
        for metric in metrics {
            info!("  - {} ({:?}): {}", metric.name, metric.metric_type, metric.help);
        }
    }
}

/// "ticket_dash_store_upserts_total" -> "store"
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("ticket_dash_")
        .and_then(|rest| rest.split('_').next())
        .filter(|phase| !phase.is_empty())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ApiMetrics, StoreMetrics};

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(
            extract_phase_from_metric_name("ticket_dash_store_upserts_total"),
            "store"
        );
        assert_eq!(
            extract_phase_from_metric_name("ticket_dash_api_request_duration_seconds"),
            "api"
        );
        assert_eq!(extract_phase_from_metric_name("sms_parser_errors_total"), "unknown");
    }

    #[test]
    fn test_areas_do_not_conflict() {
        let mut all = HashMap::new();
        assert!(register_phase_metrics::<StoreMetrics>(&mut all).is_empty());
        assert!(register_phase_metrics::<ApiMetrics>(&mut all).is_empty());
        // Registering the same area twice reports every name
        let again = register_phase_metrics::<StoreMetrics>(&mut all);
        assert_eq!(again.len(), StoreMetrics::metrics_documentation().len());
    }
}
