pub mod config;
pub mod events;
pub mod metrics;
pub mod reconcile;
pub mod secrets;
pub mod supervisor;
pub mod testing;
pub mod ticket;
pub mod tracker_client;
pub mod tracking;
pub mod workflow;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use events::{FindingHandler, FindingNotification, FindingStreamError, FindingsStream};
pub use reconcile::FindingReconciler;
pub use supervisor::{ConsumerSupervisor, ShutdownTrigger, SupervisorError, SupervisorHandle};
pub use ticket::{FindingTicket, FindingTicketStore, SqliteFindingTicketStore, Ticket};
pub use tracking::{TicketServer, TrackingError};
