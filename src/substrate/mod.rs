//! Shared streaming substrate: topic name resolution and the broker
//! producer/consumer abstraction both orchestrators build on.

pub mod bus;
pub mod topics;

pub use bus::{decode_json, encode_json, BusConsumer, BusProducer, InboundMessage};
pub use topics::Topic;
