//! Bitcoin P2P handshake client.
//!
//! - [`wire`]: message framing and payload codecs, no I/O of its own
//! - [`handshake`]: the `version`/`verack` state machine
//! - [`session`]: drives a handshake over a blocking stream
//! - [`pool`]: one session thread per peer, with coordinated shutdown
pub mod config;
pub mod handshake;
pub mod pool;
pub mod session;
pub mod telemetry;
pub mod wire;
