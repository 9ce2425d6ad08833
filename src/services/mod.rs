//! Services - polling loop and event dispatch
//!
//! - `poller` - Floor scan cycle driving the gateway client
//! - `dispatcher` - Publishes classified readings as queued jobs

pub mod dispatcher;
pub mod poller;

// Re-export commonly used types
pub use dispatcher::{DispatchError, Dispatcher, Route};
pub use poller::{CycleOutcome, Poller, PollerSettings};
