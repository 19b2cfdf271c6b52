//! Ticket tracker client abstraction.
//!
//! This module provides a `TicketClient` trait over ticket trackers and
//! a factory that picks the implementation from a server's `kind`.

mod factory;
mod jira;
mod types;

pub use factory::{DefaultTicketClientFactory, TicketClientFactory};
pub use jira::JiraClient;
pub use types::*;
