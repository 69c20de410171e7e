use std::io::{self, Read, Write};

use crate::wire::constants::HEADER_SIZE;
use crate::wire::error::{WireError, WireResult};
use crate::wire::header::MessageHeader;
use crate::wire::message::{Message, RawMessage};

/// Builds a complete frame: 24-byte header followed by `payload`.
///
/// ```
/// use btc_handshake::wire::codec;
/// use btc_handshake::wire::network::MAIN_NET_MAGIC;
///
/// let frame = codec::frame(MAIN_NET_MAGIC, "verack", &[]).unwrap();
/// assert_eq!(frame.len(), 24);
/// assert_eq!(&frame[20..24], &[0x5d, 0xf6, 0xe0, 0xe2]);
/// ```
///
/// # Errors
///
/// [`WireError::CommandTooLong`] when `command` exceeds 12 bytes.
pub fn frame(magic: u32, command: &str, payload: &[u8]) -> WireResult<Vec<u8>> {
    let header = MessageHeader::new(magic, command, payload)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Writes a complete Bitcoin P2P message frame to the given writer.
///
/// ```text
/// +------------+--------------+---------------+------------+
/// | magic (4)  | command (12) | length (4 LE) | checksum(4)|
/// +------------+--------------+---------------+------------+
/// | payload (variable)                                ...  |
/// +----------------------------------------------------------
/// ```
///
/// # Arguments
///
/// * `writer`  - Any type implementing [`Write`] (e.g. `TcpStream`,
///   `Cursor<Vec<u8>>`, `BufWriter`)
/// * `magic`   - Network magic of the peer's network
/// * `command` - Command name, at most 12 ASCII bytes
/// * `payload` - The raw payload bytes
///
/// The frame is written with a single `write_all` and then flushed, so a
/// buffered writer never holds half a message.
pub fn write_message<W: Write>(
    writer: &mut W,
    magic: u32,
    command: &str,
    payload: &[u8],
) -> WireResult<()> {
    writer.write_all(&frame(magic, command, payload)?)?;
    writer.flush()?;
    Ok(())
}

/// Encodes `message` and writes it as one frame.
pub fn send<W: Write>(writer: &mut W, magic: u32, message: &Message) -> WireResult<()> {
    let payload = message.encode_payload()?;
    write_message(writer, magic, message.command_name(), &payload)
}

/// Reads one frame from any [`Read`] source.
///
/// This function:
/// 1. Reads the 24-byte header
/// 2. Rejects a declared length above `MAX_PAYLOAD`
/// 3. Reads exactly `length` payload bytes
/// 4. Rejects a foreign magic, then verifies the payload checksum
///
/// Magic and checksum failures are reported only after the whole payload
/// has been consumed, so the stream stays aligned on the next frame.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use btc_handshake::wire::codec;
/// use btc_handshake::wire::message::Command;
/// use btc_handshake::wire::network::MAIN_NET_MAGIC;
///
/// let bytes = codec::frame(MAIN_NET_MAGIC, "verack", &[]).unwrap();
/// let mut cursor = Cursor::new(bytes);
///
/// let raw = codec::read_message(&mut cursor, MAIN_NET_MAGIC).unwrap();
/// assert_eq!(raw.command, Command::Verack);
/// assert!(raw.payload.is_empty());
/// ```
pub fn read_message<R: Read>(reader: &mut R, magic: u32) -> WireResult<RawMessage> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let header = MessageHeader::parse(&header)?;

    if header.magic != magic {
        skip_payload(reader, &header)?;
        return Err(mismatch(&header, magic));
    }

    let mut payload = vec![0u8; header.payload_len()];
    reader.read_exact(&mut payload)?;
    header.verify_payload(&payload)?;

    Ok(raw_message(&header, payload))
}

/// Decodes one frame from the front of `bytes`.
///
/// Returns the message and the number of bytes it occupied. Fails with
/// [`WireError::TruncatedInput`] while the buffer does not yet hold the
/// whole frame. Any other failure concerns a complete frame: skip
/// [`frame_len`] bytes to reach the next one.
pub fn decode_frame(bytes: &[u8], magic: u32) -> WireResult<(RawMessage, usize)> {
    let total = frame_len(bytes)?;
    let header = MessageHeader::parse(bytes)?;

    let payload = bytes.get(HEADER_SIZE..total).ok_or(WireError::TruncatedInput {
        context: "message payload",
        needed: total,
        available: bytes.len(),
    })?;
    if header.magic != magic {
        return Err(mismatch(&header, magic));
    }
    header.verify_payload(payload)?;

    Ok((raw_message(&header, payload.to_vec()), total))
}

/// Total size, header included, of the frame at the front of `bytes`, as
/// declared by its header.
pub fn frame_len(bytes: &[u8]) -> WireResult<usize> {
    Ok(HEADER_SIZE + MessageHeader::parse(bytes)?.payload_len())
}

fn skip_payload<R: Read>(reader: &mut R, header: &MessageHeader) -> WireResult<()> {
    let len = u64::from(header.length);
    let skipped = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if skipped < len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

fn mismatch(header: &MessageHeader, expected: u32) -> WireError {
    WireError::MagicMismatch {
        expected,
        actual: header.magic,
    }
}

fn raw_message(header: &MessageHeader, payload: Vec<u8>) -> RawMessage {
    RawMessage {
        command: header.command(),
        name: header.command_name(),
        payload,
        magic: header.magic,
        checksum: header.checksum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::MAX_PAYLOAD;
    use crate::wire::message::Command;
    use crate::wire::network::{MAIN_NET_MAGIC, TEST_NET_MAGIC};
    use crate::wire::services::Services;
    use crate::wire::version::VersionMessage;
    use std::io::Cursor;

    /// Builds a frame by hand, with a caller-chosen checksum.
    fn build_frame(cmd_str: &[u8], payload: &[u8], checksum: [u8; 4]) -> Vec<u8> {
        let mut bytes = vec![];
        bytes.extend_from_slice(&MAIN_NET_MAGIC.to_le_bytes());
        let mut cmd = [0u8; 12];
        cmd[..cmd_str.len()].copy_from_slice(cmd_str);
        bytes.extend_from_slice(&cmd);
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&checksum);
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn write_then_read_version() {
        let version = VersionMessage::new(Services::NODE_NETWORK, 8333);
        let mut buffer = Vec::new();
        send(&mut buffer, MAIN_NET_MAGIC, &Message::Version(version.clone())).unwrap();

        let raw = read_message(&mut Cursor::new(buffer), MAIN_NET_MAGIC).unwrap();
        assert_eq!(raw.command, Command::Version);
        assert_eq!(raw.name, "version");
        assert_eq!(Message::try_from(raw).unwrap(), Message::Version(version));
    }

    #[test]
    fn frame_rejects_long_command() {
        assert!(matches!(
            frame(MAIN_NET_MAGIC, "much_too_long_cmd", &[]),
            Err(WireError::CommandTooLong(_))
        ));
    }

    #[test]
    fn read_message_rejects_foreign_magic() {
        let bytes = frame(TEST_NET_MAGIC, "verack", &[]).unwrap();
        assert!(matches!(
            read_message(&mut Cursor::new(bytes), MAIN_NET_MAGIC),
            Err(WireError::MagicMismatch { .. })
        ));
    }

    #[test]
    fn read_message_oversized_length_fails_before_reading_payload() {
        let mut bytes = build_frame(b"version", &[], [0; 4]);
        bytes[16..20].copy_from_slice(&((MAX_PAYLOAD as u32) + 1).to_le_bytes());

        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_message(&mut cursor, MAIN_NET_MAGIC),
            Err(WireError::MalformedPayload(_))
        ));
        assert_eq!(cursor.position(), 24);
    }

    #[test]
    fn bad_checksum_does_not_desync_stream() {
        let mut stream = build_frame(b"ping", &[1, 2, 3, 4, 5, 6, 7, 8], [0xDE, 0xAD, 0xBE, 0xEF]);
        stream.extend(frame(MAIN_NET_MAGIC, "verack", &[]).unwrap());

        let mut cursor = Cursor::new(stream);
        assert!(matches!(
            read_message(&mut cursor, MAIN_NET_MAGIC),
            Err(WireError::ChecksumMismatch { .. })
        ));
        let next = read_message(&mut cursor, MAIN_NET_MAGIC).unwrap();
        assert_eq!(next.command, Command::Verack);
    }

    #[test]
    fn foreign_magic_does_not_desync_stream() {
        let mut stream = frame(TEST_NET_MAGIC, "ping", &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        stream.extend(frame(MAIN_NET_MAGIC, "verack", &[]).unwrap());

        let mut cursor = Cursor::new(stream);
        assert!(matches!(
            read_message(&mut cursor, MAIN_NET_MAGIC),
            Err(WireError::MagicMismatch {
                actual: TEST_NET_MAGIC,
                ..
            })
        ));
        assert_eq!(cursor.position(), 32);
        let next = read_message(&mut cursor, MAIN_NET_MAGIC).unwrap();
        assert_eq!(next.command, Command::Verack);
    }

    #[test]
    fn foreign_magic_with_short_payload_is_io_error() {
        let mut bytes = frame(TEST_NET_MAGIC, "ping", &[0u8; 8]).unwrap();
        bytes.truncate(28);
        assert!(matches!(
            read_message(&mut Cursor::new(bytes), MAIN_NET_MAGIC),
            Err(WireError::Io(_))
        ));
    }

    #[test]
    fn read_message_unknown_command_preserved_in_payload() {
        let bytes = frame(MAIN_NET_MAGIC, "wtfmessage", &[1, 2, 3]).unwrap();
        let raw = read_message(&mut Cursor::new(bytes), MAIN_NET_MAGIC).unwrap();
        assert_eq!(raw.command, Command::Unknown);
        assert_eq!(raw.name, "wtfmessage");
        assert_eq!(raw.payload, vec![1, 2, 3]);
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let mut bytes = frame(MAIN_NET_MAGIC, "ping", &[0u8; 8]).unwrap();
        bytes.truncate(28);
        assert!(matches!(
            read_message(&mut Cursor::new(bytes), MAIN_NET_MAGIC),
            Err(WireError::Io(_))
        ));
    }

    #[test]
    fn decode_frame_reports_consumed_bytes() {
        let mut buf = frame(MAIN_NET_MAGIC, "sendaddrv2", &[]).unwrap();
        buf.extend(frame(MAIN_NET_MAGIC, "verack", &[]).unwrap());

        let (first, used) = decode_frame(&buf, MAIN_NET_MAGIC).unwrap();
        assert_eq!(first.command, Command::SendAddrV2);
        assert_eq!(used, 24);

        let (second, used2) = decode_frame(&buf[used..], MAIN_NET_MAGIC).unwrap();
        assert_eq!(second.command, Command::Verack);
        assert_eq!(used + used2, buf.len());
    }

    #[test]
    fn decode_frame_rejected_frame_can_be_skipped() {
        let mut buf = frame(TEST_NET_MAGIC, "ping", &[9u8; 8]).unwrap();
        buf.extend(frame(MAIN_NET_MAGIC, "verack", &[]).unwrap());

        assert!(matches!(
            decode_frame(&buf, MAIN_NET_MAGIC),
            Err(WireError::MagicMismatch { .. })
        ));
        let skip = frame_len(&buf).unwrap();
        assert_eq!(skip, 32);

        let (next, used) = decode_frame(&buf[skip..], MAIN_NET_MAGIC).unwrap();
        assert_eq!(next.command, Command::Verack);
        assert_eq!(skip + used, buf.len());
    }

    #[test]
    fn decode_frame_waits_for_full_payload() {
        let buf = frame(MAIN_NET_MAGIC, "ping", &[0u8; 8]).unwrap();
        assert!(matches!(
            decode_frame(&buf[..10], MAIN_NET_MAGIC),
            Err(WireError::TruncatedInput { needed: 24, .. })
        ));
        assert!(matches!(
            decode_frame(&buf[..30], MAIN_NET_MAGIC),
            Err(WireError::TruncatedInput { needed: 32, .. })
        ));
    }
}
