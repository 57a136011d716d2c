//! In-memory network backend.
//!
//! Implements [`AppRequestNetwork`] for tests and the local harness:
//! registered subnets with scripted per-node signer behavior, configurable
//! connectivity, and send recording. Delivery is synchronous — responses are
//! queued into the registered response channel during `send_app_request`.

mod network;

pub use network::{MemoryNetwork, SignerBehavior};
