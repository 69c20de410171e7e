//! Bitcoin P2P wire protocol primitives.
//!
//! This module provides the low-level encoding used before and during the
//! `version`/`verack` handshake:
//! - CompactSize integers and double-SHA256 digests
//! - Peer addresses in the legacy and BIP-155 (`addrv2`) layouts
//! - The 24-byte message header and whole-frame reading over any `Read`
//! - The `version` payload
//!
//! Nothing here logs or does I/O beyond the reader/writer it is handed.
//! Higher-level message decoding is handled by [`Message`], which converts
//! raw payloads into strongly typed variants.
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html
pub mod codec;

pub mod address;
pub mod hash;
pub mod header;
pub mod message;
pub mod reader;
pub mod services;
pub mod varint;
pub mod version;

pub mod constants;
pub mod error;
pub mod network;

pub use address::{AddressVersion, NetworkId, PeerAddress};
pub use codec::{decode_frame, frame, read_message, send, write_message};
pub use error::{WireError, WireResult};
pub use hash::Sha256Hash;
pub use message::{Command, Decode, Encode, Message, RawMessage};
pub use network::{Network, NetworkParams};
pub use services::Services;
pub use version::VersionMessage;
