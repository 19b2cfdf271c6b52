//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the vulntrack server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Finding ticket index size (collected dynamically)
//! - Core metrics (tracker calls, workflows, finding stream)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vulntrack_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("valid http duration metric")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vulntrack_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid http requests metric")
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vulntrack_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("valid in flight metric")
});

// =============================================================================
// Index Metrics (collected dynamically)
// =============================================================================

/// Rows of the finding ticket index.
pub static FINDING_TICKETS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "vulntrack_finding_tickets",
        "Number of finding to ticket links in the local index",
    )
    .expect("valid finding tickets metric")
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let server_metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(FINDING_TICKETS.clone()),
    ];

    // Core metrics (tracker, workflow, stream)
    let core_metrics = vulntrack_core::metrics::all_metrics();

    for metric in server_metrics.into_iter().chain(core_metrics) {
        if let Err(e) = registry.register(metric) {
            warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the current values.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.finding_tickets().count() {
        Ok(count) => FINDING_TICKETS.set(count),
        Err(e) => warn!(error = %e, "Failed to count finding tickets"),
    }
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid uuid regex")
});

static FINDING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/findings/[^/]+").expect("valid finding regex"));

static TICKET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/tickets/([^/]+)").expect("valid ticket regex"));

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_REGEX.replace_all(path, "{team_id}");
    let result = FINDING_REGEX.replace_all(&result, "/findings/{finding_id}");
    let result = TICKET_REGEX.replace_all(&result, |caps: &regex_lite::Captures| {
        if &caps[1] == "findings" {
            caps[0].to_string()
        } else {
            "/tickets/{id}".to_string()
        }
    });
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_ticket() {
        let path = "/550e8400-e29b-41d4-a716-446655440000/tickets/SEC-42";
        assert_eq!(normalize_path(path), "/{team_id}/tickets/{id}");
    }

    #[test]
    fn test_normalize_path_ticket_action() {
        let path = "/550e8400-e29b-41d4-a716-446655440000/tickets/SEC-42/wontfix";
        assert_eq!(normalize_path(path), "/{team_id}/tickets/{id}/wontfix");
    }

    #[test]
    fn test_normalize_path_finding() {
        let path = "/550e8400-e29b-41d4-a716-446655440000/tickets/findings/f-1";
        assert_eq!(
            normalize_path(path),
            "/{team_id}/tickets/findings/{finding_id}"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/healthcheck"), "/healthcheck");
        assert_eq!(
            normalize_path("/550e8400-e29b-41d4-a716-446655440000/tickets"),
            "/{team_id}/tickets"
        );
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics().unwrap();
        assert!(output.contains("vulntrack_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        vulntrack_core::metrics::TICKETS_CREATED.inc();
        vulntrack_core::metrics::FINDINGS_PROCESSED
            .with_label_values(&["fixed"])
            .inc();
        FINDING_TICKETS.set(0);

        let output = encode_metrics().unwrap();

        assert!(output.contains("vulntrack_finding_tickets"));
        assert!(output.contains("vulntrack_tickets_created_total"));
        assert!(output.contains("vulntrack_findings_processed_total"));
    }
}
