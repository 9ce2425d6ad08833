//! Message channel to the queue broker
//!
//! - `amqp` - RabbitMQ via lapin (durable queue, topic exchange, persistent delivery)
//! - `mqtt` - MQTT via rumqttc, `exchange/routing_key` topics at QoS 1
//! - `memory` - in-process recorder for tests and dry runs

pub mod amqp;
pub mod memory;
pub mod mqtt;

use async_trait::async_trait;

pub use amqp::AmqpChannel;
pub use memory::MemoryChannel;
pub use mqtt::MqttChannel;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Credentials rejected while opening the connection
    #[error("broker authentication failed: {0}")]
    Auth(String),
    /// Broker unreachable while opening the connection
    #[error("broker connection failed: {0}")]
    Connect(String),
    /// Channel or connection no longer usable
    #[error("channel in invalid state: {0}")]
    InvalidState(String),
    /// Fault that may clear on a later attempt
    #[error("transient broker fault: {0}")]
    Transient(String),
}

impl ChannelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChannelError::Auth(_) => "auth",
            ChannelError::Connect(_) => "connect",
            ChannelError::InvalidState(_) => "invalid_state",
            ChannelError::Transient(_) => "transient",
        }
    }
}

/// Publish primitive with durable queue semantics.
///
/// `declare` and `bind` must be idempotent: repeating them with the same
/// arguments is a no-op.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn declare(&self, queue: &str) -> Result<(), ChannelError>;
    async fn bind(&self, exchange: &str, queue: &str, routing_key: &str)
        -> Result<(), ChannelError>;
    /// Persistent publish
    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8])
        -> Result<(), ChannelError>;
    async fn close(&self) -> Result<(), ChannelError>;
}
