use crate::wire::constants::{COMMAND_SIZE, HEADER_SIZE, MAX_PAYLOAD};
use crate::wire::error::{WireError, WireResult};
use crate::wire::hash;
use crate::wire::message::Command;

/// The fixed 24-byte header in front of every P2P message.
///
/// ```text
/// +------------+--------------+---------------+------------+
/// | magic (4)  | command (12) | length (4 LE) | checksum(4)|
/// +------------+--------------+---------------+------------+
/// ```
///
/// The checksum is the first 4 bytes of `SHA256(SHA256(payload))`.
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#message-headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u32,
    pub command: [u8; COMMAND_SIZE],
    pub length: u32,
    pub checksum: [u8; 4],
}

impl MessageHeader {
    /// Builds the header for `payload`, computing length and checksum.
    pub fn new(magic: u32, command: &str, payload: &[u8]) -> WireResult<Self> {
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|&len| len as usize <= MAX_PAYLOAD)
            .ok_or_else(|| {
                WireError::malformed(format!(
                    "payload of {} bytes exceeds {MAX_PAYLOAD}",
                    payload.len()
                ))
            })?;

        Ok(Self {
            magic,
            command: encode_command(command)?,
            length,
            checksum: hash::checksum(payload),
        })
    }

    /// Parses the first 24 bytes of `bytes`.
    ///
    /// A declared payload length above [`MAX_PAYLOAD`] is rejected here,
    /// before anyone allocates a buffer for it.
    pub fn parse(bytes: &[u8]) -> WireResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(WireError::TruncatedInput {
                context: "message header",
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let mut magic = [0u8; 4];
        let mut command = [0u8; COMMAND_SIZE];
        let mut length = [0u8; 4];
        let mut checksum = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        command.copy_from_slice(&bytes[4..16]);
        length.copy_from_slice(&bytes[16..20]);
        checksum.copy_from_slice(&bytes[20..24]);

        let length = u32::from_le_bytes(length);
        if length as usize > MAX_PAYLOAD {
            return Err(WireError::malformed(format!(
                "header declares {length} payload bytes, limit is {MAX_PAYLOAD}"
            )));
        }

        Ok(Self {
            magic: u32::from_le_bytes(magic),
            command,
            length,
            checksum,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..16].copy_from_slice(&self.command);
        out[16..20].copy_from_slice(&self.length.to_le_bytes());
        out[20..24].copy_from_slice(&self.checksum);
        out
    }

    /// The command with its NUL padding removed.
    pub fn command_name(&self) -> String {
        let end = self
            .command
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(COMMAND_SIZE);
        String::from_utf8_lossy(&self.command[..end]).into_owned()
    }

    pub fn command(&self) -> Command {
        Command::from(&self.command)
    }

    pub fn payload_len(&self) -> usize {
        self.length as usize
    }

    /// Checks `payload` against the declared length and checksum.
    pub fn verify_payload(&self, payload: &[u8]) -> WireResult<()> {
        if payload.len() != self.payload_len() {
            return Err(WireError::InvalidLength {
                context: "payload",
                expected: self.payload_len(),
                actual: payload.len(),
            });
        }

        let actual = hash::checksum(payload);
        if actual != self.checksum {
            return Err(WireError::ChecksumMismatch {
                context: "message payload",
                expected: hex::encode(self.checksum),
                actual: hex::encode(actual),
            });
        }

        Ok(())
    }
}

/// ASCII command name, left-justified and NUL-padded to 12 bytes.
pub fn encode_command(name: &str) -> WireResult<[u8; COMMAND_SIZE]> {
    if name.len() > COMMAND_SIZE {
        return Err(WireError::CommandTooLong(name.to_owned()));
    }
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(WireError::InvalidCommand(name.to_owned()));
    }

    let mut padded = [0u8; COMMAND_SIZE];
    padded[..name.len()].copy_from_slice(name.as_bytes());
    Ok(padded)
}
