//! IO modules - external system interfaces
//!
//! - `wire` - TCP client for the sensor gateway request/reply protocol
//! - `broker` - Message channel backends (AMQP, MQTT, in-memory)
//! - `directory` - Gateway floor and sensor slot lookup

pub mod broker;
pub mod directory;
pub mod wire;

// Re-export commonly used types
pub use broker::{ChannelError, MessageChannel};
pub use directory::{SensorDirectory, StaticDirectory};
pub use wire::{GatewayClient, TcpTransport, Transport, WireError};
