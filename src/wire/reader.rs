//! Bounded cursor over a message payload.
//!
//! Every read checks the requested length against [`MAX_PAYLOAD`] and
//! against the bytes left in the buffer before touching them. This is the
//! only thing standing between a peer's claimed length and an allocation,
//! so decoders must go through [`Reader`] rather than index the payload.

use crate::wire::constants::MAX_PAYLOAD;
use crate::wire::error::{WireError, WireResult};
use crate::wire::varint;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.buf.len()
    }

    fn check(&self, len: usize, what: &str) -> WireResult<()> {
        if len > MAX_PAYLOAD {
            return Err(WireError::malformed(format!(
                "{what}: claimed length {len} exceeds {MAX_PAYLOAD}"
            )));
        }
        if len > self.remaining() {
            return Err(WireError::malformed(format!(
                "{what}: needs {len} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        self.check(len, "bytes")?;
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        self.check(N, "array")?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        self.check(1, "u8")?;
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Ports are the one big-endian field in the protocol.
    pub fn read_u16_be(&mut self) -> WireResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> WireResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> WireResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64_le(&mut self) -> WireResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_varint(&mut self) -> WireResult<u64> {
        let (value, used) = varint::decode(self.buf, self.pos).map_err(|e| match e {
            e @ WireError::TruncatedInput { .. } => {
                WireError::malformed(format!("varint at offset {}: {e}", self.pos))
            }
            other => other,
        })?;
        self.pos += used;
        Ok(value)
    }

    /// Reads a CompactSize length followed by that many bytes.
    pub fn read_length_prefixed_bytes(&mut self) -> WireResult<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| WireError::malformed(format!("length {len} does not fit in memory")))?;
        self.check(len, "length-prefixed bytes")?;
        self.read_bytes(len)
    }

    /// Reads a CompactSize-prefixed string. Invalid UTF-8 sequences become
    /// U+FFFD; peers put arbitrary bytes in their user agent.
    pub fn read_string(&mut self) -> WireResult<String> {
        let bytes = self.read_length_prefixed_bytes()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixed_width_fields_in_order() {
        let mut buf = vec![];
        buf.extend_from_slice(&70016i32.to_le_bytes());
        buf.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        buf.extend_from_slice(&8333u16.to_be_bytes());
        buf.push(7);

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_i32_le().unwrap(), 70016);
        assert_eq!(r.read_u32_le().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64_le().unwrap(), u64::MAX);
        assert_eq!(r.read_u16_be().unwrap(), 8333);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert!(!r.has_more());
    }

    #[test]
    fn read_past_end_fails_without_advancing() {
        let buf = [1u8, 2, 3];
        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_u32_le(), Err(WireError::MalformedPayload(_))));
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_bytes(3).unwrap(), &[1, 2, 3]);
        assert!(matches!(r.read_u8(), Err(WireError::MalformedPayload(_))));
    }

    #[test]
    fn claimed_length_above_max_payload_is_rejected() {
        // 0xFE marker, length MAX_PAYLOAD + 1
        let mut buf = vec![0xFE];
        buf.extend_from_slice(&((MAX_PAYLOAD as u32) + 1).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);

        let mut r = Reader::new(&buf);
        let err = r.read_length_prefixed_bytes().unwrap_err();
        assert!(matches!(err, WireError::MalformedPayload(ref m) if m.contains("exceeds")));
    }

    #[test]
    fn length_prefix_running_past_buffer_is_rejected() {
        let buf = [5u8, b'a', b'b'];
        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_string(), Err(WireError::MalformedPayload(_))));
    }

    #[test]
    fn reads_strings() {
        let mut buf = vec![16u8];
        buf.extend_from_slice(b"/Satoshi:25.0.0/");
        buf.push(0);

        let mut r = Reader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "/Satoshi:25.0.0/");
        assert_eq!(r.read_string().unwrap(), "");
    }

    #[test]
    fn invalid_utf8_string_is_replaced_not_rejected() {
        let buf = [2u8, 0xC3, 0x28, 0xAA];
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_string().unwrap(), "\u{FFFD}(");
        assert_eq!(r.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn truncated_varint_is_malformed_payload() {
        let buf = [0xFD, 0x01];
        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_varint(), Err(WireError::MalformedPayload(_))));
    }
}
