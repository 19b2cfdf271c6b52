//! Message stream consumption.
//!
//! `StreamConsumer` runs the at-least-once processing loop over any
//! `BusConsumer`: offsets are committed only after the handler succeeds, so
//! a failed message is redelivered on the next subscription of the group.
//! `FindingsStream` layers the finding entity protocol on top of it.

mod consumer;
mod findings;
#[cfg(feature = "kafka")]
mod kafka;
mod memory;
mod types;

pub use consumer::{
    BusConsumer, ConsumerState, Delivery, HandlerError, MessageHandler, Position, StreamConsumer,
    StreamError,
};
pub use findings::{
    supported_version, FindingHandler, FindingStreamError, FindingsStream, FINDINGS_ENTITY,
    MAJOR_VERSION, VERSION_HEADER,
};
#[cfg(feature = "kafka")]
pub use kafka::KafkaConsumer;
pub use memory::{MemoryBroker, MemoryConsumer};
pub use types::*;
