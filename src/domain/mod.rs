//! Domain models - core types, classification and job encoding
//!
//! - `types` - gateway target, sensor records, occupancy readings, log levels
//! - `classifier` - maps a raw gateway reply to an occupancy state
//! - `php_serialize` - serializer for the consumer's object grammar
//! - `envelope` - queue job envelope wrapping a serialized command

pub mod classifier;
pub mod envelope;
pub mod php_serialize;
pub mod types;

// Re-export commonly used types at module level
pub use classifier::{classify, classify_hex};
pub use envelope::JobEnvelope;
pub use php_serialize::{EncodeError, Mapping, Value};
pub use types::{ClassifiedEvent, GatewayTarget, LogLevel, Occupancy, RawResponse, SensorRecord};
