//! HTTP surface and process wiring for the encodefleet server.

pub mod api;
pub mod local_node;
pub mod metrics;
pub mod state;
