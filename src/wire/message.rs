use crate::wire::constants::COMMAND_SIZE;
use crate::wire::error::{WireError, WireResult};
use crate::wire::header::encode_command;
use crate::wire::version::VersionMessage;

/// A raw Bitcoin P2P message frame.
///
/// This struct represents a message as transmitted on the wire
/// according to the Bitcoin P2P protocol (https://developer.bitcoin.org/reference/p2p_networking.html#message-headers).
///
/// By the time a `RawMessage` exists its magic and checksum have been
/// checked against the header; the payload is still uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub command: Command,
    /// Command name as sent, NUL padding removed.
    pub name: String,
    pub payload: Vec<u8>,
    pub magic: u32,
    pub checksum: [u8; 4],
}

/// Implemented by types that can be decoded from a raw Bitcoin message payload.
pub trait Decode: Sized {
    fn decode(payload: &[u8]) -> WireResult<Self>;
}

/// Implemented by payload types this crate sends.
pub trait Encode {
    fn encode(&self) -> WireResult<Vec<u8>>;
}

/// Commands understood during the handshake.
///
/// Anything else maps to [`Command::Unknown`]; its name travels in
/// [`RawMessage::name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Version,
    Verack,
    /// BIP-155: the sender wants `addrv2` instead of `addr`. Only
    /// meaningful between `version` and `verack`.
    SendAddrV2,
    Unknown,
}

/// Name lookup table; the only place command strings are spelled out.
const COMMANDS: [(Command, &str); 3] = [
    (Command::Version, "version"),
    (Command::Verack, "verack"),
    (Command::SendAddrV2, "sendaddrv2"),
];

impl Command {
    pub fn from_name(name: &str) -> Command {
        COMMANDS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(c, _)| *c)
            .unwrap_or(Command::Unknown)
    }

    /// Wire name, `None` for [`Command::Unknown`].
    pub fn name(self) -> Option<&'static str> {
        COMMANDS
            .iter()
            .find(|(c, _)| *c == self)
            .map(|(_, n)| *n)
    }

    /// Returns the 12-byte command field as defined by the Bitcoin P2P protocol.
    ///
    /// The command string is ASCII and padded with zero bytes.
    pub fn as_bytes(self) -> [u8; COMMAND_SIZE] {
        let mut padded = [0u8; COMMAND_SIZE];
        if let Some(name) = self.name() {
            padded[..name.len()].copy_from_slice(name.as_bytes());
        }
        padded
    }
}

impl From<&[u8; 12]> for Command {
    fn from(bytes: &[u8; 12]) -> Self {
        let cmd = std::str::from_utf8(bytes)
            .unwrap_or("")
            .trim_end_matches(char::from(0));

        Command::from_name(cmd)
    }
}

/// A decoded handshake-phase message.
///
/// Closed set: supporting a new command means adding a variant here and a
/// row to the name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionMessage),
    Verack,
    SendAddrV2,
    Unknown { command: String, payload: Vec<u8> },
}

impl Message {
    pub fn command(&self) -> Command {
        match self {
            Message::Version(_) => Command::Version,
            Message::Verack => Command::Verack,
            Message::SendAddrV2 => Command::SendAddrV2,
            Message::Unknown { .. } => Command::Unknown,
        }
    }

    pub fn command_name(&self) -> &str {
        match self {
            Message::Unknown { command, .. } => command.as_str(),
            other => other.command().name().unwrap_or_default(),
        }
    }

    pub fn encode_payload(&self) -> WireResult<Vec<u8>> {
        match self {
            Message::Version(v) => v.encode(),
            Message::Verack | Message::SendAddrV2 => Ok(Vec::new()),
            Message::Unknown { command, payload } => {
                encode_command(command)?;
                Ok(payload.clone())
            }
        }
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = WireError;

    fn try_from(raw: RawMessage) -> WireResult<Self> {
        match raw.command {
            Command::Version => Ok(Message::Version(VersionMessage::decode(&raw.payload)?)),
            // Empty by definition; Bitcoin Core ignores any trailing bytes.
            Command::Verack => Ok(Message::Verack),
            Command::SendAddrV2 => Ok(Message::SendAddrV2),
            Command::Unknown => Ok(Message::Unknown {
                command: raw.name,
                payload: raw.payload,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::services::Services;

    fn raw(command: &str, payload: Vec<u8>) -> RawMessage {
        RawMessage {
            command: Command::from_name(command),
            name: command.to_owned(),
            payload,
            magic: 0,
            checksum: [0; 4],
        }
    }

    #[test]
    fn command_table_roundtrip() {
        for (cmd, name) in COMMANDS {
            assert_eq!(Command::from_name(name), cmd);
            assert_eq!(cmd.name(), Some(name));
            assert_eq!(Command::from(&cmd.as_bytes()), cmd);
        }
        assert_eq!(Command::from_name("inv"), Command::Unknown);
        assert_eq!(Command::Unknown.name(), None);
        assert_eq!(Command::Unknown.as_bytes(), [0u8; 12]);
    }

    #[test]
    fn command_match_is_by_exact_name() {
        assert_eq!(Command::from_name("VERACK"), Command::Unknown);
        assert_eq!(Command::from(b"verack\0\0\0\0\0x"), Command::Unknown);
    }

    #[test]
    fn message_from_verack_raw() {
        assert_eq!(Message::try_from(raw("verack", vec![])).unwrap(), Message::Verack);
    }

    #[test]
    fn message_from_version_raw_yields_decoded_struct() {
        let v = VersionMessage::new(Services::NODE_NETWORK, 8333).with_best_height(42);
        let Message::Version(decoded) =
            Message::try_from(raw("version", v.encode().unwrap())).unwrap()
        else {
            panic!("expected Message::Version");
        };
        assert_eq!(decoded.best_height, 42);
        assert_eq!(decoded.services, Services::NODE_NETWORK);
    }

    #[test]
    fn malformed_version_payload_is_an_error() {
        assert!(Message::try_from(raw("version", vec![1, 2, 3])).is_err());
    }

    #[test]
    fn unknown_command_keeps_name_and_payload() {
        let msg = Message::try_from(raw("wtxidrelay", vec![0xAB])).unwrap();
        assert_eq!(msg.command(), Command::Unknown);
        assert_eq!(msg.command_name(), "wtxidrelay");
        assert_eq!(msg.encode_payload().unwrap(), vec![0xAB]);
    }

    #[test]
    fn command_names_of_known_messages() {
        assert_eq!(Message::Verack.command_name(), "verack");
        assert_eq!(Message::SendAddrV2.command_name(), "sendaddrv2");
        assert!(Message::SendAddrV2.encode_payload().unwrap().is_empty());
    }
}
