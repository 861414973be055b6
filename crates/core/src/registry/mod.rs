//! Encoder node registry.
//!
//! Nodes move between two states: active after a registration, inactive
//! after an explicit deregister or when the stale sweep finds no heartbeat
//! within the threshold. Only a fresh registration reactivates a node.
//!
//! Capacity is handed out as [`CapacityLease`]s; the per-node counter is
//! the only throttle on concurrent work.

mod clock;
mod config;
mod error;
mod node_registry;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use node_registry::{CapacityLease, NodeRegistry};
pub use types::{EncoderNode, NodeHealth, NodeRegistration};
