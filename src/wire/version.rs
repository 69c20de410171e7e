use std::net::{IpAddr, Ipv4Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, WriteBytesExt};
use rand::Rng;

use crate::wire::address::{AddressVersion, PeerAddress};
use crate::wire::constants::PROTOCOL_VERSION;
use crate::wire::error::WireResult;
use crate::wire::message::{Decode, Encode};
use crate::wire::reader::Reader;
use crate::wire::services::Services;
use crate::wire::varint::write_varint;

/// User agent announced by this crate, BIP-14 style.
pub const USER_AGENT: &str = concat!("/btc-handshake:", env!("CARGO_PKG_VERSION"), "/");

/// The `version` message: the first thing each side sends.
///
/// The payload layout is:
///
/// ```text
/// int32    version
/// uint64   services        written as two u32 LE halves (low, high)
/// int64    timestamp       written as two u32 LE halves (low, high)
/// net_addr addr_recv       legacy format, no timestamp
/// net_addr addr_from       legacy format, no timestamp
/// uint64   nonce           two u32 LE halves
/// var_str  user_agent
/// uint32   start_height
/// bool     relay
/// ```
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: Services,
    pub timestamp: i64,
    pub receiving: PeerAddress,
    pub from: PeerAddress,
    /// Self-connection detection nonce. Zero unless the caller opts in
    /// with [`VersionMessage::with_random_nonce`].
    pub nonce: u64,
    pub user_agent: String,
    pub best_height: u32,
    /// Whether the sender wants transactions relayed before it installs a
    /// bloom filter (BIP37).
    pub relay: bool,
}

impl VersionMessage {
    /// A version announcement stamped with the current time.
    ///
    /// Both address fields point at `127.0.0.1` on `port`: peers ignore
    /// them and discovering our external address is out of scope.
    pub fn new(services: Services, port: u16) -> Self {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);

        Self {
            version: PROTOCOL_VERSION,
            services,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            receiving: PeerAddress::new(localhost, port, Services::NONE),
            from: PeerAddress::new(localhost, port, Services::NONE),
            nonce: 0,
            user_agent: USER_AGENT.to_owned(),
            best_height: 0,
            relay: true,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_receiving(mut self, addr: PeerAddress) -> Self {
        self.receiving = addr;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_best_height(mut self, height: u32) -> Self {
        self.best_height = height;
        self
    }

    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_random_nonce(mut self) -> Self {
        self.nonce = rand::thread_rng().r#gen();
        self
    }
}

impl Encode for VersionMessage {
    fn encode(&self) -> WireResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(86 + self.user_agent.len());

        buf.write_i32::<LittleEndian>(self.version)?;

        let (lo, hi) = self.services.split();
        buf.write_u32::<LittleEndian>(lo)?;
        buf.write_u32::<LittleEndian>(hi)?;

        buf.write_u32::<LittleEndian>(self.timestamp as u32)?;
        buf.write_u32::<LittleEndian>((self.timestamp >> 32) as u32)?;

        self.receiving.encode(AddressVersion::V0, &mut buf)?;
        self.from.encode(AddressVersion::V0, &mut buf)?;

        buf.write_u32::<LittleEndian>(self.nonce as u32)?;
        buf.write_u32::<LittleEndian>((self.nonce >> 32) as u32)?;

        write_varint(self.user_agent.len() as u64, &mut buf)?;
        buf.extend_from_slice(self.user_agent.as_bytes());

        buf.write_u32::<LittleEndian>(self.best_height)?;
        buf.write_u8(u8::from(self.relay))?;

        Ok(buf)
    }
}

impl Decode for VersionMessage {
    fn decode(payload: &[u8]) -> WireResult<Self> {
        let mut r = Reader::new(payload);

        let version = r.read_i32_le()?;
        let services = Services::new(r.read_u64_le()?);
        let timestamp = r.read_i64_le()?;
        let receiving = PeerAddress::decode(&mut r, AddressVersion::V0)?;
        let from = PeerAddress::decode(&mut r, AddressVersion::V0)?;
        let nonce = r.read_u64_le()?;
        let user_agent = r.read_string()?;
        let best_height = r.read_u32_le()?;
        // BIP37: peers that omit the flag expect relay.
        let relay = if r.has_more() { r.read_u8()? != 0 } else { true };

        Ok(VersionMessage {
            version,
            services,
            timestamp,
            receiving,
            from,
            nonce,
            user_agent,
            best_height,
            relay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes a single NetAddr field as used in version payloads.
    fn net_addr_bytes(services: u64, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&services.to_le_bytes());
        b.extend_from_slice(&[0u8; 10]);
        b.extend_from_slice(&[0xFF, 0xFF]);
        b.extend_from_slice(&ip);
        b.extend_from_slice(&port.to_be_bytes());
        b
    }

    /// Realistic version payload for protocol v70016 (/Satoshi:25.0.0/).
    /// services = NODE_NETWORK(1) | NODE_WITNESS(8) | NODE_NETWORK_LIMITED(1024) = 1033
    fn version_payload_v70016() -> Vec<u8> {
        let mut p = vec![];
        p.extend_from_slice(&70016i32.to_le_bytes());
        p.extend_from_slice(&1033u64.to_le_bytes());
        p.extend_from_slice(&1700000000i64.to_le_bytes());
        p.extend(net_addr_bytes(1033, [192, 168, 1, 1], 8333)); // addr_recv
        p.extend(net_addr_bytes(1033, [10, 0, 0, 1], 8333)); // addr_from
        p.extend_from_slice(&0x1234567890abcdefu64.to_le_bytes()); // nonce
        let ua = b"/Satoshi:25.0.0/";
        p.push(ua.len() as u8);
        p.extend_from_slice(ua);
        p.extend_from_slice(&820000u32.to_le_bytes()); // start_height (~late 2023)
        p.push(1); // relay = true
        p
    }

    #[test]
    fn decode_version_v70016_all_fields() {
        let msg = VersionMessage::decode(&version_payload_v70016()).unwrap();

        assert_eq!(msg.version, 70016);
        assert_eq!(msg.services.bits(), 1033);
        assert_eq!(msg.timestamp, 1700000000);
        assert_eq!(msg.nonce, 0x1234567890abcdef);
        assert_eq!(msg.user_agent, "/Satoshi:25.0.0/");
        assert_eq!(msg.best_height, 820000);
        assert!(msg.relay);
        assert_eq!(msg.receiving.port(), 8333);
        assert_eq!(
            msg.receiving.addr(),
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
        );
        assert_eq!(msg.from.addr(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert_eq!(msg.from.time(), -1);
    }

    #[test]
    fn encode_matches_reference_layout() {
        let decoded = VersionMessage::decode(&version_payload_v70016()).unwrap();
        assert_eq!(decoded.encode().unwrap(), version_payload_v70016());
    }

    #[test]
    fn encode_splits_services_and_time_into_u32_halves() {
        let mut msg = VersionMessage::new(Services::new(0x0000_0001_0000_0409), 18333);
        msg.timestamp = 0x0000_0001_6553_F100;
        let bytes = msg.encode().unwrap();

        assert_eq!(&bytes[4..8], &0x0000_0409u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0x6553_F100u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1u32.to_le_bytes());
    }

    #[test]
    fn new_message_defaults() {
        let msg = VersionMessage::new(Services::NONE, 18333);
        let bytes = msg.encode().unwrap();

        // 4 + 8 + 8 + 26 + 26 + 8 + varstr + 4 + 1
        assert_eq!(bytes.len(), 85 + 1 + USER_AGENT.len());
        // nonce slot is zero by default
        assert_eq!(&bytes[72..80], &[0u8; 8]);
        assert_eq!(*bytes.last().unwrap(), 1);
        assert_eq!(msg.receiving.port(), 18333);

        let back = VersionMessage::decode(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn random_nonce_is_written() {
        let msg = VersionMessage::new(Services::NONE, 8333).with_random_nonce();
        let back = VersionMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(back.nonce, msg.nonce);
    }

    #[test]
    fn relay_defaults_to_true_when_byte_missing() {
        let mut payload = version_payload_v70016();
        *payload.last_mut().unwrap() = 0;
        assert!(!VersionMessage::decode(&payload).unwrap().relay);

        payload.pop();
        assert!(VersionMessage::decode(&payload).unwrap().relay);
    }

    #[test]
    fn non_utf8_user_agent_still_decodes() {
        let mut p = vec![];
        p.extend_from_slice(&70016i32.to_le_bytes());
        p.extend_from_slice(&1u64.to_le_bytes());
        p.extend_from_slice(&1700000000i64.to_le_bytes());
        p.extend(net_addr_bytes(1, [192, 168, 1, 1], 8333));
        p.extend(net_addr_bytes(1, [10, 0, 0, 1], 8333));
        p.extend_from_slice(&7u64.to_le_bytes());
        p.extend_from_slice(&[2, 0xC3, 0x28]);
        p.extend_from_slice(&820000u32.to_le_bytes());
        p.push(1);

        let msg = VersionMessage::decode(&p).unwrap();
        assert_eq!(msg.user_agent, "\u{FFFD}(");
        assert_eq!(msg.best_height, 820000);
        assert_eq!(msg.nonce, 7);
    }

    #[test]
    fn truncated_payload_returns_error() {
        assert!(VersionMessage::decode(&[0u8; 10]).is_err());

        let mut payload = version_payload_v70016();
        payload.truncate(90);
        assert!(VersionMessage::decode(&payload).is_err());
    }
}
