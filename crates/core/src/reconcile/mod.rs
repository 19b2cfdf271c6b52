//! Reconciliation of finding notifications into tracker tickets.

mod reconciler;

pub use reconciler::{FindingReconciler, TeamOutcome};
