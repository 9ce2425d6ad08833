//! Infrastructure - configuration, metrics, and sections
//!
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free metrics collection
//! - `sections` - Application sections and building selection

pub mod config;
pub mod metrics;
pub mod sections;

// Re-export commonly used types
pub use config::{BrokerMode, Config};
pub use metrics::Metrics;
