//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Tracker API calls (requests, latency)
//! - Workflow engine (transitions executed/skipped, tickets created/found)
//! - Finding stream (messages, per-team reconciliation outcomes, restarts)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Tracker API Metrics
// =============================================================================

/// Tracker request duration in seconds.
pub static TRACKER_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vulntrack_tracker_request_duration_seconds",
            "Duration of ticket tracker API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["tracker", "operation"],
    )
    .expect("valid tracker duration metric")
});

/// Tracker requests total.
pub static TRACKER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vulntrack_tracker_requests_total",
            "Total ticket tracker API calls",
        ),
        // status: "success", "not_found" or the error kind
        &["tracker", "operation", "status"],
    )
    .expect("valid tracker requests metric")
});

// =============================================================================
// Workflow Metrics
// =============================================================================

/// Transitions executed, by target status.
pub static TRANSITIONS_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vulntrack_transitions_executed_total",
            "Total workflow transitions executed",
        ),
        &["target"],
    )
    .expect("valid transitions executed metric")
});

/// Workflow steps skipped because the tracker offered no matching transition.
pub static TRANSITIONS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vulntrack_transitions_skipped_total",
            "Total workflow steps skipped for lack of a matching transition",
        ),
        &["target"],
    )
    .expect("valid transitions skipped metric")
});

/// Tickets created in a tracker.
pub static TICKETS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("vulntrack_tickets_created_total", "Total tickets created")
        .expect("valid tickets created metric")
});

/// Create requests answered with an already existing ticket.
pub static TICKETS_FOUND: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vulntrack_tickets_found_total",
        "Total create requests resolved to an existing ticket",
    )
    .expect("valid tickets found metric")
});

// =============================================================================
// Stream Metrics
// =============================================================================

/// Stream messages by result.
pub static STREAM_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vulntrack_stream_messages_total",
            "Total stream messages handled",
        ),
        &["result"], // "committed", "failed", "rejected", "tombstone"
    )
    .expect("valid stream messages metric")
});

/// Per-team reconciliation outcomes.
pub static FINDINGS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vulntrack_findings_processed_total",
            "Total finding reconciliations per team",
        ),
        // "fixed", "wont_fix", "no_action", "skipped_unconfigured", "skipped_disabled", "failed"
        &["result"],
    )
    .expect("valid findings processed metric")
});

/// Consumer restarts after a failed subscribe+process cycle.
pub static CONSUMER_RESTARTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vulntrack_consumer_restarts_total",
        "Total finding consumer restarts",
    )
    .expect("valid consumer restarts metric")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Tracker
        Box::new(TRACKER_REQUEST_DURATION.clone()),
        Box::new(TRACKER_REQUESTS.clone()),
        // Workflow
        Box::new(TRANSITIONS_EXECUTED.clone()),
        Box::new(TRANSITIONS_SKIPPED.clone()),
        Box::new(TICKETS_CREATED.clone()),
        Box::new(TICKETS_FOUND.clone()),
        // Stream
        Box::new(STREAM_MESSAGES.clone()),
        Box::new(FINDINGS_PROCESSED.clone()),
        Box::new(CONSUMER_RESTARTS.clone()),
    ]
}
