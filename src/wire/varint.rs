//! CompactSize ("VarInt") encoding.
//!
//! ```text
//! value                 bytes on the wire
//! 0x00 ..= 0xFC         [value]
//! 0xFD ..= 0xFFFF       [0xFD, u16 LE]
//! 0x1_0000 ..= u32::MAX [0xFE, u32 LE]
//! above                 [0xFF, u64 LE]
//! ```
//!
//! Reference:
//! https://developer.bitcoin.org/reference/transactions.html#compactsize-unsigned-integers

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::wire::error::{WireError, WireResult};

const MARKER_U16: u8 = 0xFD;
const MARKER_U32: u8 = 0xFE;
const MARKER_U64: u8 = 0xFF;

/// Encodes `value` with the minimal CompactSize width.
///
/// ```
/// use btc_handshake::wire::varint;
///
/// assert_eq!(varint::encode(252), vec![0xFC]);
/// assert_eq!(varint::encode(253), vec![0xFD, 0xFD, 0x00]);
/// ```
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(MARKER_U16);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(MARKER_U32);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(MARKER_U64);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

/// Writes `value` as a CompactSize to `w`.
pub fn write_varint<W: Write + ?Sized>(value: u64, w: &mut W) -> std::io::Result<()> {
    match value {
        0..=0xFC => w.write_u8(value as u8),
        0xFD..=0xFFFF => {
            w.write_u8(MARKER_U16)?;
            w.write_u16::<LittleEndian>(value as u16)
        }
        0x1_0000..=0xFFFF_FFFF => {
            w.write_u8(MARKER_U32)?;
            w.write_u32::<LittleEndian>(value as u32)
        }
        _ => {
            w.write_u8(MARKER_U64)?;
            w.write_u64::<LittleEndian>(value)
        }
    }
}

/// Number of bytes [`encode`] produces for `value`.
pub const fn encoded_len(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Decodes a CompactSize starting at `offset`.
///
/// Returns the value and the number of bytes consumed (marker included).
/// Truncated input fails with [`WireError::TruncatedInput`]; a value
/// encoded wider than necessary fails with [`WireError::MalformedPayload`].
pub fn decode(buf: &[u8], offset: usize) -> WireResult<(u64, usize)> {
    let available = buf.len().saturating_sub(offset);
    let first = *buf.get(offset).ok_or(WireError::TruncatedInput {
        context: "varint marker",
        needed: 1,
        available,
    })?;

    let (width, min) = match first {
        MARKER_U16 => (2, 0xFD),
        MARKER_U32 => (4, 0x1_0000),
        MARKER_U64 => (8, 0x1_0000_0000),
        n => return Ok((n as u64, 1)),
    };

    let body = buf
        .get(offset + 1..offset + 1 + width)
        .ok_or(WireError::TruncatedInput {
            context: "varint body",
            needed: 1 + width,
            available,
        })?;

    let mut le = [0u8; 8];
    le[..width].copy_from_slice(body);
    let value = u64::from_le_bytes(le);

    if value < min {
        return Err(WireError::malformed(format!(
            "non-canonical varint: {value} encoded with marker {first:#04x}"
        )));
    }

    Ok((value, 1 + width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_boundaries() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(252), vec![0xFC]);
        assert_eq!(encode(253), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(encode(0xFFFF), vec![0xFD, 0xFF, 0xFF]);
        assert_eq!(encode(0x1_0000), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(
            encode(1 << 32),
            vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(encode(u64::MAX), {
            let mut v = vec![0xFF];
            v.extend_from_slice(&[0xFF; 8]);
            v
        });
    }

    #[test]
    fn decode_reports_bytes_consumed() {
        assert_eq!(decode(&[0x2A], 0).unwrap(), (42, 1));
        assert_eq!(decode(&[0x00, 0xFD, 0x00, 0x01], 1).unwrap(), (256, 3));
    }

    #[test]
    fn decode_truncated_body_fails() {
        let err = decode(&[0xFE, 0x01, 0x02], 0).unwrap_err();
        assert!(matches!(
            err,
            WireError::TruncatedInput {
                needed: 5,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn decode_empty_input_fails() {
        assert!(matches!(
            decode(&[], 0),
            Err(WireError::TruncatedInput { .. })
        ));
        assert!(matches!(
            decode(&[0x01], 4),
            Err(WireError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn decode_rejects_non_canonical() {
        // 5 fits in one byte, so the 0xFD form is not minimal.
        assert!(matches!(
            decode(&[0xFD, 0x05, 0x00], 0),
            Err(WireError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode(&[0xFE, 0xFF, 0xFF, 0x00, 0x00], 0),
            Err(WireError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00], 0),
            Ok((0x1_0000_0000, 9))
        ));
    }

    proptest! {
        #[test]
        fn roundtrip(v in any::<u64>()) {
            let bytes = encode(v);
            prop_assert_eq!(bytes.len(), encoded_len(v));
            prop_assert_eq!(decode(&bytes, 0).unwrap(), (v, bytes.len()));
        }

        #[test]
        fn writer_matches_encode(v in any::<u64>()) {
            let mut written = Vec::new();
            write_varint(v, &mut written).unwrap();
            prop_assert_eq!(written, encode(v));
        }
    }
}
