//! Per-network parameters: header magic and default P2P port.
//!
//! The codec never hardcodes a network; callers pass the magic of the
//! network they are talking to.

use std::fmt;
use std::str::FromStr;

use crate::wire::constants::PROTOCOL_VERSION;

/// Network magic value used in the Bitcoin P2P message header.
///
/// The first 4 bytes of every Bitcoin P2P message identify the
/// network and act as a message boundary marker in the TCP stream.
/// They are written little-endian, so mainnet `0xD9B4BEF9` appears on
/// the wire as `F9 BE B4 D9`.
///
/// You can also see how Bitcoin Core maps magic values to networks
/// in `GetNetworkForMagic`:
/// https://github.com/bitcoin/bitcoin/blob/master/src/kernel/chainparams.cpp#L703-L723
pub const MAIN_NET_MAGIC: u32 = 0xD9B4BEF9;
pub const TEST_NET_MAGIC: u32 = 0x0709110B;
pub const REG_TEST_MAGIC: u32 = 0xDAB5BFFA;
pub const SIG_NET_MAGIC: u32 = 0x40CF030A;

/// A logical Bitcoin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
    Signet,
}

impl Network {
    pub const fn magic(self) -> u32 {
        match self {
            Network::Mainnet => MAIN_NET_MAGIC,
            Network::Testnet => TEST_NET_MAGIC,
            Network::Regtest => REG_TEST_MAGIC,
            Network::Signet => SIG_NET_MAGIC,
        }
    }

    pub const fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet => 18333,
            Network::Regtest => 18444,
            Network::Signet => 38333,
        }
    }

    /// Maps a header magic back to its network, if known.
    pub fn from_magic(magic: u32) -> Option<Self> {
        [
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Signet,
        ]
        .into_iter()
        .find(|n| n.magic() == magic)
    }

    pub fn params(self) -> NetworkParams {
        NetworkParams {
            network: self,
            magic: self.magic(),
            port: self.default_port(),
            protocol_version: PROTOCOL_VERSION,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
            Network::Signet => "signet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" | "testnet3" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            "signet" => Ok(Network::Signet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Everything the codec and handshake need to know about a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    pub magic: u32,
    pub port: u16,
    pub protocol_version: i32,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Network::default().params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_magic_is_little_endian_on_the_wire() {
        assert_eq!(
            Network::Mainnet.magic().to_le_bytes(),
            [0xF9, 0xBE, 0xB4, 0xD9]
        );
    }

    #[test]
    fn magic_maps_back_to_network() {
        for n in [
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Signet,
        ] {
            assert_eq!(Network::from_magic(n.magic()), Some(n));
        }
        assert_eq!(Network::from_magic(0xDEADBEEF), None);
    }

    #[test]
    fn parses_network_names() {
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("REGTEST".parse::<Network>().unwrap(), Network::Regtest);
        assert!("moonnet".parse::<Network>().is_err());
    }

    #[test]
    fn params_carry_default_port() {
        let params = Network::Testnet.params();
        assert_eq!(params.port, 18333);
        assert_eq!(params.magic, TEST_NET_MAGIC);
    }
}
