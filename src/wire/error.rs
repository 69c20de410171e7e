//! Error type shared by every wire codec in this crate.
//!
//! All variants are local and recoverable: a failure decoding one frame
//! never affects the framing of the next one, because frames are always
//! consumed by their declared length.

use std::io;

use thiserror::Error;

/// Wire codec errors.
#[derive(Error, Debug)]
pub enum WireError {
    /// Fewer bytes are available than the field declares.
    #[error("truncated input: {context} needs {needed} bytes, {available} available")]
    TruncatedInput {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    /// A field length does not match its declared network/address type.
    #[error("invalid length for {context}: {actual} bytes, expected {expected}")]
    InvalidLength {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Onion-service version byte other than 3.
    #[error("unsupported onion service version: {0}")]
    UnsupportedVersion(u8),

    /// A checksum did not match its recomputed value.
    #[error("checksum mismatch for {context}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// Command name longer than the 12-byte header field.
    #[error("command name too long: {0:?} exceeds 12 bytes")]
    CommandTooLong(String),

    /// Command name that cannot be written as ASCII.
    #[error("invalid command name: {0:?}")]
    InvalidCommand(String),

    /// Bounds violation or claimed length above `MAX_PAYLOAD`.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// BIP-155 network id outside the known registry.
    ///
    /// Address decoding absorbs this into a placeholder address; it only
    /// escapes from [`NetworkId::try_from`](crate::wire::address::NetworkId).
    #[error("unknown BIP-155 network id: {0}")]
    UnknownNetworkId(u8),

    /// The address cannot be represented in the requested wire format.
    #[error("address cannot be encoded: {0}")]
    UnencodableAddress(String),

    /// Frame magic does not belong to the configured network.
    #[error("network magic mismatch: expected {expected:#010x}, got {actual:#010x}")]
    MagicMismatch { expected: u32, actual: u32 },

    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        WireError::MalformedPayload(msg.into())
    }
}

/// Result alias for codec operations.
pub type WireResult<T> = Result<T, WireError>;
