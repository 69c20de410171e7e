/// Current Bitcoin P2P protocol version.
///
/// This value is sent in the `version` message during handshake
/// and is used for peer capability negotiation and feature gating.
///
/// The protocol version is defined in Bitcoin Core:
/// https://github.com/bitcoin/bitcoin/blob/707ad466968b947b364cfc25bcb4d6895e799418/src/node/protocol_version.h#L12
///
/// It is serialized on the wire as a signed 32-bit little-endian integer.
///
/// You can find a list of notable versions here: https://developer.bitcoin.org/reference/p2p_networking.html#protocol-versions
pub const PROTOCOL_VERSION: i32 = 70016;

/// Size of the fixed message header:
///
/// ```text
/// magic (4) | command (12) | length (4) | checksum (4)
/// ```
pub const HEADER_SIZE: usize = 24;

/// Width of the NUL-padded command field in the message header.
pub const COMMAND_SIZE: usize = 12;

/// Largest payload Bitcoin Core accepts (`MAX_SIZE`, 32 MiB).
///
/// Every length read from the wire is checked against this bound before
/// any allocation happens.
pub const MAX_PAYLOAD: usize = 0x0200_0000;

/// BIP-155 caps the address blob of an `addrv2` entry at 512 bytes.
pub const MAX_ADDRV2_ADDR_LEN: usize = 512;

/// OnionCat prefix (`fd87:d87e:eb43::/48`) used to carry a TORv2
/// identifier inside a legacy 16-byte address field.
pub const ONIONCAT_PREFIX: [u8; 6] = [0xfd, 0x87, 0xd8, 0x7e, 0xeb, 0x43];

/// Domain separator hashed in front of a TORv3 public key to derive the
/// 2-byte address checksum (rend-spec-v3, section 6).
pub const ONION_CHECKSUM_CONTEXT: &[u8] = b".onion checksum";

/// The only onion-service version with a 32-byte key.
pub const TORV3_VERSION: u8 = 0x03;

/// Checksum of an empty payload: first 4 bytes of SHA256(SHA256("")).
///
/// Every `verack` and `sendaddrv2` header carries this value.
pub const EMPTY_PAYLOAD_CHECKSUM: [u8; 4] = [0x5d, 0xf6, 0xe0, 0xe2];
