//! Peer network addresses in the legacy and BIP-155 wire formats.
//!
//! Legacy (`addr`, `version`) entries:
//!
//! ```text
//! [u32 LE time]       only when the format version is >= 1
//! u64 LE  services
//! 16      address     IPv6, IPv4-mapped IPv4, or OnionCat TORv2
//! u16 BE  port
//! ```
//!
//! BIP-155 (`addrv2`) entries:
//!
//! ```text
//! u32 LE  time
//! varint  services
//! u8      network id
//! varint  address length, then the address bytes
//! u16 BE  port
//! ```
//!
//! Both formats decode into the same [`PeerAddress`], so an address read
//! from an `addr` message compares equal to the one read from `addrv2`.
//!
//! https://github.com/bitcoin/bips/blob/master/bip-0155.mediawiki

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use data_encoding::BASE32_NOPAD;
use sha3::{Digest, Sha3_256};

use crate::wire::constants::{
    MAX_ADDRV2_ADDR_LEN, ONION_CHECKSUM_CONTEXT, ONIONCAT_PREFIX, TORV3_VERSION,
};
use crate::wire::error::{WireError, WireResult};
use crate::wire::reader::Reader;
use crate::wire::services::Services;
use crate::wire::varint::write_varint;

const ONION_SUFFIX: &str = ".onion";
const TORV2_LEN: usize = 10;
const TORV3_KEY_LEN: usize = 32;
const TORV3_BLOB_LEN: usize = TORV3_KEY_LEN + 2 + 1;

/// Address serialization format, negotiated per connection.
///
/// * `V0`: legacy, no timestamp (the `version` message).
/// * `V1`: legacy with a leading timestamp (`addr`).
/// * `V2`: BIP-155 (`addrv2`), after both peers sent `sendaddrv2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressVersion {
    V0 = 0,
    V1 = 1,
    V2 = 2,
}

impl AddressVersion {
    pub const fn has_time(self) -> bool {
        !matches!(self, AddressVersion::V0)
    }

    pub const fn is_bip155(self) -> bool {
        matches!(self, AddressVersion::V2)
    }
}

impl TryFrom<u8> for AddressVersion {
    type Error = WireError;

    fn try_from(value: u8) -> WireResult<Self> {
        match value {
            0 => Ok(AddressVersion::V0),
            1 => Ok(AddressVersion::V1),
            2 => Ok(AddressVersion::V2),
            other => Err(WireError::UnencodableAddress(format!(
                "invalid address format version {other}"
            ))),
        }
    }
}

/// BIP-155 network ids.
///
/// | ID   | Network | Length |
/// |------|---------|--------|
/// | 0x01 | IPv4    | 4      |
/// | 0x02 | IPv6    | 16     |
/// | 0x03 | TORv2   | 10     |
/// | 0x04 | TORv3   | 32     |
/// | 0x05 | I2P     | 32     |
/// | 0x06 | CJDNS   | 16     |
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkId {
    Ipv4 = 1,
    Ipv6 = 2,
    TorV2 = 3,
    TorV3 = 4,
    I2p = 5,
    Cjdns = 6,
}

impl NetworkId {
    pub const fn address_len(self) -> usize {
        match self {
            NetworkId::Ipv4 => 4,
            NetworkId::Ipv6 | NetworkId::Cjdns => 16,
            NetworkId::TorV2 => TORV2_LEN,
            NetworkId::TorV3 | NetworkId::I2p => 32,
        }
    }
}

impl TryFrom<u8> for NetworkId {
    type Error = WireError;

    fn try_from(value: u8) -> WireResult<Self> {
        match value {
            1 => Ok(NetworkId::Ipv4),
            2 => Ok(NetworkId::Ipv6),
            3 => Ok(NetworkId::TorV2),
            4 => Ok(NetworkId::TorV3),
            5 => Ok(NetworkId::I2p),
            6 => Ok(NetworkId::Cjdns),
            other => Err(WireError::UnknownNetworkId(other)),
        }
    }
}

/// A peer endpoint: IP address or onion hostname, plus port, services and
/// the time it was last advertised.
///
/// At most one of `addr` and `hostname` is set. Neither is set for
/// networks this crate does not implement (I2P, CJDNS, unknown ids).
///
/// Equality and hashing ignore `time`.
#[derive(Debug, Clone)]
pub struct PeerAddress {
    addr: Option<IpAddr>,
    hostname: Option<String>,
    port: u16,
    services: Services,
    time: i64,
}

impl PeerAddress {
    /// An IP address stamped with the current time.
    pub fn new(addr: IpAddr, port: u16, services: Services) -> Self {
        Self {
            addr: Some(addr),
            hostname: None,
            port,
            services,
            time: unix_now(),
        }
    }

    pub fn from_socket_addr(sock: SocketAddr, services: Services) -> Self {
        Self::new(sock.ip(), sock.port(), services)
    }

    /// An onion-service address (`<base32>.onion`) stamped with the
    /// current time. The hostname is validated when encoded.
    pub fn onion(hostname: impl Into<String>, port: u16, services: Services) -> Self {
        Self {
            addr: None,
            hostname: Some(hostname.into()),
            port,
            services,
            time: unix_now(),
        }
    }

    pub fn addr(&self) -> Option<IpAddr> {
        self.addr
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn services(&self) -> Services {
        self.services
    }

    /// Advertisement time in UNIX seconds, `-1` when the wire format had
    /// no timestamp.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// True for addresses of networks that decode without an endpoint.
    pub fn is_placeholder(&self) -> bool {
        self.addr.is_none() && self.hostname.is_none()
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr.map(|ip| SocketAddr::new(ip, self.port))
    }

    /// Serializes into a fresh buffer.
    pub fn to_bytes(&self, version: AddressVersion) -> WireResult<Vec<u8>> {
        let mut out = Vec::with_capacity(30);
        self.encode(version, &mut out)?;
        Ok(out)
    }

    pub fn encode<W: Write + ?Sized>(&self, version: AddressVersion, w: &mut W) -> WireResult<()> {
        if version.has_time() {
            w.write_u32::<LittleEndian>(u32::try_from(self.time).unwrap_or(0))?;
        }

        if version.is_bip155() {
            self.encode_bip155(w)?;
        } else {
            self.encode_legacy(w)?;
        }

        // Unlike every other integer in the protocol, the port is big-endian.
        w.write_u16::<BigEndian>(self.port)?;
        Ok(())
    }

    fn encode_legacy<W: Write + ?Sized>(&self, w: &mut W) -> WireResult<()> {
        w.write_u64::<LittleEndian>(self.services.bits())?;

        let field: [u8; 16] = match (&self.addr, &self.hostname) {
            (Some(IpAddr::V4(v4)), _) => v4.to_ipv6_mapped().octets(),
            (Some(IpAddr::V6(v6)), _) => v6.octets(),
            (None, Some(host)) => {
                let id = onion_bytes(host)?;
                if id.len() != TORV2_LEN {
                    return Err(WireError::UnencodableAddress(format!(
                        "{host}: only TORv2 onion addresses fit the legacy format"
                    )));
                }
                let mut field = [0u8; 16];
                field[..6].copy_from_slice(&ONIONCAT_PREFIX);
                field[6..].copy_from_slice(&id);
                field
            }
            (None, None) => {
                return Err(WireError::UnencodableAddress(
                    "address has neither IP nor hostname".into(),
                ));
            }
        };

        w.write_all(&field)?;
        Ok(())
    }

    fn encode_bip155<W: Write + ?Sized>(&self, w: &mut W) -> WireResult<()> {
        write_varint(self.services.bits(), w)?;

        let (id, bytes): (NetworkId, Vec<u8>) = match (&self.addr, &self.hostname) {
            (Some(IpAddr::V4(v4)), _) => (NetworkId::Ipv4, v4.octets().to_vec()),
            (Some(IpAddr::V6(v6)), _) => (NetworkId::Ipv6, v6.octets().to_vec()),
            (None, Some(host)) => {
                let blob = onion_bytes(host)?;
                match blob.len() {
                    TORV2_LEN => (NetworkId::TorV2, blob),
                    TORV3_BLOB_LEN => (NetworkId::TorV3, torv3_key(&blob)?.to_vec()),
                    actual => {
                        return Err(WireError::InvalidLength {
                            context: "onion address",
                            expected: TORV3_BLOB_LEN,
                            actual,
                        });
                    }
                }
            }
            (None, None) => {
                return Err(WireError::UnencodableAddress(
                    "address has neither IP nor hostname".into(),
                ));
            }
        };

        w.write_u8(id as u8)?;
        write_varint(bytes.len() as u64, w)?;
        w.write_all(&bytes)?;
        Ok(())
    }

    /// Decodes one address from `r` in the given format.
    pub fn decode(r: &mut Reader<'_>, version: AddressVersion) -> WireResult<Self> {
        let time = if version.has_time() {
            r.read_u32_le()? as i64
        } else {
            -1
        };

        let (services, addr, hostname) = if version.is_bip155() {
            decode_bip155(r)?
        } else {
            decode_legacy(r)?
        };

        let port = r.read_u16_be()?;

        Ok(Self {
            addr,
            hostname,
            port,
            services,
            time,
        })
    }

    /// Decodes from a standalone buffer; trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8], version: AddressVersion) -> WireResult<Self> {
        Self::decode(&mut Reader::new(bytes), version)
    }
}

type Endpoint = (Services, Option<IpAddr>, Option<String>);

fn decode_legacy(r: &mut Reader<'_>) -> WireResult<Endpoint> {
    let services = Services::new(r.read_u64_le()?);
    let field: [u8; 16] = r.read_array()?;

    if field[..6] == ONIONCAT_PREFIX {
        return Ok((services, None, Some(onion_hostname(&field[6..]))));
    }

    let v6 = Ipv6Addr::from(field);
    let ip = match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    };
    Ok((services, Some(ip), None))
}

fn decode_bip155(r: &mut Reader<'_>) -> WireResult<Endpoint> {
    let services = Services::new(r.read_varint()?);
    let raw_id = r.read_u8()?;

    let len = r.read_varint()?;
    if len > MAX_ADDRV2_ADDR_LEN as u64 {
        return Err(WireError::InvalidLength {
            context: "addrv2 address",
            expected: MAX_ADDRV2_ADDR_LEN,
            actual: usize::try_from(len).unwrap_or(usize::MAX),
        });
    }
    let bytes = r.read_bytes(len as usize)?;

    let id = match NetworkId::try_from(raw_id) {
        Ok(id) => id,
        // Future network ids must not break parsing of the message.
        Err(WireError::UnknownNetworkId(_)) => return Ok((services, None, None)),
        Err(e) => return Err(e),
    };

    if matches!(id, NetworkId::I2p | NetworkId::Cjdns) {
        return Ok((services, None, None));
    }

    if bytes.len() != id.address_len() {
        return Err(WireError::InvalidLength {
            context: network_name(id),
            expected: id.address_len(),
            actual: bytes.len(),
        });
    }

    let endpoint = match id {
        NetworkId::Ipv4 => {
            let octets: [u8; 4] = [bytes[0], bytes[1], bytes[2], bytes[3]];
            (Some(IpAddr::V4(Ipv4Addr::from(octets))), None)
        }
        NetworkId::Ipv6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            (Some(IpAddr::V6(Ipv6Addr::from(octets))), None)
        }
        NetworkId::TorV2 => (None, Some(onion_hostname(bytes))),
        NetworkId::TorV3 => {
            let mut key = [0u8; TORV3_KEY_LEN];
            key.copy_from_slice(bytes);
            (None, Some(torv3_hostname(&key)))
        }
        NetworkId::I2p | NetworkId::Cjdns => (None, None),
    };

    Ok((services, endpoint.0, endpoint.1))
}

fn network_name(id: NetworkId) -> &'static str {
    match id {
        NetworkId::Ipv4 => "IPv4 address",
        NetworkId::Ipv6 => "IPv6 address",
        NetworkId::TorV2 => "TORv2 address",
        NetworkId::TorV3 => "TORv3 address",
        NetworkId::I2p => "I2P address",
        NetworkId::Cjdns => "CJDNS address",
    }
}

/// First two bytes of `SHA3-256(".onion checksum" || pubkey || version)`.
pub fn onion_checksum(pubkey: &[u8; 32], version: u8) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(ONION_CHECKSUM_CONTEXT);
    hasher.update(pubkey);
    hasher.update([version]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn torv3_hostname(pubkey: &[u8; 32]) -> String {
    let mut blob = Vec::with_capacity(TORV3_BLOB_LEN);
    blob.extend_from_slice(pubkey);
    blob.extend_from_slice(&onion_checksum(pubkey, TORV3_VERSION));
    blob.push(TORV3_VERSION);
    onion_hostname(&blob)
}

/// Validates a decoded 35-byte TORv3 blob and returns its public key.
fn torv3_key(blob: &[u8]) -> WireResult<[u8; 32]> {
    let mut key = [0u8; TORV3_KEY_LEN];
    key.copy_from_slice(&blob[..TORV3_KEY_LEN]);
    let checksum = &blob[TORV3_KEY_LEN..TORV3_KEY_LEN + 2];
    let version = blob[TORV3_BLOB_LEN - 1];

    if version != TORV3_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }

    let expected = onion_checksum(&key, version);
    if checksum != expected {
        return Err(WireError::ChecksumMismatch {
            context: "TORv3 address",
            expected: hex::encode(expected),
            actual: hex::encode(checksum),
        });
    }

    Ok(key)
}

fn onion_hostname(bytes: &[u8]) -> String {
    let mut label = BASE32_NOPAD.encode(bytes);
    label.make_ascii_lowercase();
    format!("{label}{ONION_SUFFIX}")
}

/// Decodes the label of a `.onion` hostname: RFC 4648 base32 without
/// padding, either letter case.
fn onion_bytes(host: &str) -> WireResult<Vec<u8>> {
    let split = host.len().checked_sub(ONION_SUFFIX.len());
    let label = match split {
        Some(at) if host.is_char_boundary(at) && host[at..].eq_ignore_ascii_case(ONION_SUFFIX) => {
            &host[..at]
        }
        _ => {
            return Err(WireError::UnencodableAddress(format!(
                "{host}: not an onion hostname"
            )));
        }
    };

    BASE32_NOPAD
        .decode(label.to_ascii_uppercase().as_bytes())
        .map_err(|e| WireError::UnencodableAddress(format!("{host}: invalid onion label: {e}")))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
            && self.hostname == other.hostname
            && self.port == other.port
            && self.services == other.services
    }
}

impl Eq for PeerAddress {}

impl Hash for PeerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
        self.hostname.hash(state);
        self.port.hash(state);
        self.services.hash(state);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.hostname, &self.addr) {
            (Some(host), _) => write!(f, "[{host}]:{}", self.port),
            (None, Some(ip)) => write!(f, "[{ip}]:{}", self.port),
            (None, None) => write!(f, "[ PeerAddress of unsupported type ]:{}", self.port),
        }
    }
}
