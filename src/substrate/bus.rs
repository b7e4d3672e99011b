//! Broker-agnostic producer/consumer abstraction. The concrete `rdkafka`
//! implementation lives behind the `kafka` feature so the rest of the crate
//! (and its unit tests) never need a running broker or a native client
//! library to build and exercise the orchestration logic.

use crate::error::SubstrateError;

/// One message handed to a consumer callback.
pub struct InboundMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

pub trait BusProducer: Send + Sync {
    fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<(), SubstrateError>;
}

pub trait BusConsumer: Send {
    /// Blocks up to `timeout` waiting for the next message. `None` means
    /// the poll timed out with nothing available; callers loop back to
    /// check the stop flag and poll again.
    fn poll(&mut self, timeout: std::time::Duration) -> Option<Result<InboundMessage, SubstrateError>>;
}

pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, SubstrateError> {
    serde_json::to_vec(value).map_err(SubstrateError::Decode)
}

pub fn decode_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, SubstrateError> {
    serde_json::from_slice(bytes).map_err(SubstrateError::Decode)
}

#[cfg(feature = "kafka")]
pub mod kafka {
    use super::*;
    use rdkafka::config::ClientConfig;
    use rdkafka::consumer::{BaseConsumer, Consumer as _};
    use rdkafka::message::Message as _;
    use rdkafka::producer::{BaseProducer, BaseRecord, Producer as _};
    use std::time::Duration;

    pub struct KafkaProducer {
        inner: BaseProducer,
    }

    impl KafkaProducer {
        pub fn new(bootstrap_servers: &str) -> Result<Self, SubstrateError> {
            let inner = ClientConfig::new()
                .set("bootstrap.servers", bootstrap_servers)
                .create()
                .map_err(|e| SubstrateError::Broker(e.to_string()))?;
            Ok(Self { inner })
        }
    }

    impl BusProducer for KafkaProducer {
        fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<(), SubstrateError> {
            let mut record = BaseRecord::to(topic).payload(payload);
            if let Some(k) = key {
                record = record.key(k);
            }
            self.inner
                .send(record)
                .map_err(|(e, _)| SubstrateError::Broker(e.to_string()))?;
            self.inner.poll(Duration::from_millis(0));
            Ok(())
        }
    }

    pub struct KafkaConsumer {
        inner: BaseConsumer,
    }

    impl KafkaConsumer {
        pub fn new(
            bootstrap_servers: &str,
            consumer_group: &str,
            topics: &[&str],
        ) -> Result<Self, SubstrateError> {
            let inner: BaseConsumer = ClientConfig::new()
                .set("bootstrap.servers", bootstrap_servers)
                .set("group.id", consumer_group)
                .set("enable.auto.commit", "true")
                .set("auto.offset.reset", "earliest")
                .create()
                .map_err(|e| SubstrateError::Broker(e.to_string()))?;
            inner
                .subscribe(topics)
                .map_err(|e| SubstrateError::Broker(e.to_string()))?;
            Ok(Self { inner })
        }
    }

    impl BusConsumer for KafkaConsumer {
        fn poll(&mut self, timeout: Duration) -> Option<Result<InboundMessage, SubstrateError>> {
            match self.inner.poll(timeout) {
                None => None,
                Some(Err(e)) => Some(Err(SubstrateError::Broker(e.to_string()))),
                Some(Ok(msg)) => {
                    let payload = msg.payload().unwrap_or_default().to_vec();
                    let key = msg
                        .key()
                        .map(|k| String::from_utf8_lossy(k).into_owned());
                    Some(Ok(InboundMessage {
                        topic: msg.topic().to_string(),
                        key,
                        payload,
                    }))
                }
            }
        }
    }
}
