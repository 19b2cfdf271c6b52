//! Access to the tracker of each team.
//!
//! Resolves a team to its project configuration, the tracker server that
//! hosts the project and that server's credentials, and hands out a ready
//! workflow engine for it.

mod error;
mod server;
mod store;

pub use error::TrackingError;
pub use server::{TeamTracker, TicketServer};
pub use store::{normalize_team_id, ConfigStore, ProjectConfig, ServerRecord, TomlConfigStore};
