//! Tracker tickets and the local finding → ticket index.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteFindingTicketStore;
pub use store::{FindingTicketError, FindingTicketStore, NewFindingTicket};
pub use types::{FindingTicket, Ticket, Transition};
