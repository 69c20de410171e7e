use std::fmt::{Debug, Display, Formatter, Result};

/// Service flags as defined by the Bitcoin P2P protocol.
///
/// This is a bitfield (`u64`) carried in the `version` message and in
/// every network address. Each bit represents a capability.
///
/// Official reference:
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
///
/// The flags are forward-compatible: unknown bits must be preserved.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Services(u64);

impl Services {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: Services) -> Services {
        Services(self.0 | other.0)
    }

    /// Low and high 32-bit halves, in that order.
    ///
    /// The `version` payload writes services as two little-endian `u32`s.
    pub const fn split(self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32)
    }

    /// Not a full node; may only relay its own transactions.
    pub const NONE: Services = Services(0x00);

    /// NODE_NETWORK: full node, can serve full blocks.
    pub const NODE_NETWORK: Services = Services(1 << 0);

    /// NODE_GETUTXO (BIP64).
    pub const NODE_GETUTXO: Services = Services(1 << 1);

    /// NODE_BLOOM (BIP111).
    pub const NODE_BLOOM: Services = Services(1 << 2);

    /// NODE_WITNESS (BIP144).
    pub const NODE_WITNESS: Services = Services(1 << 3);

    /// NODE_XTHIN, never formally proposed and discontinued.
    pub const NODE_XTHIN: Services = Services(1 << 4);

    /// NODE_BITCOIN_CASH, set by Bitcoin Cash nodes to be told apart.
    pub const NODE_BITCOIN_CASH: Services = Services(1 << 5);

    /// NODE_COMPACT_FILTERS (BIP157).
    pub const NODE_COMPACT_FILTERS: Services = Services(1 << 6);

    /// NODE_NETWORK_LIMITED (BIP159): keeps at least the last 288 blocks.
    pub const NODE_NETWORK_LIMITED: Services = Services(1 << 10);

    const NAMED: [(Services, &'static str); 8] = [
        (Self::NODE_NETWORK, "NODE_NETWORK"),
        (Self::NODE_GETUTXO, "NODE_GETUTXO"),
        (Self::NODE_BLOOM, "NODE_BLOOM"),
        (Self::NODE_WITNESS, "NODE_WITNESS"),
        (Self::NODE_XTHIN, "NODE_XTHIN"),
        (Self::NODE_BITCOIN_CASH, "NODE_BITCOIN_CASH"),
        (Self::NODE_COMPACT_FILTERS, "NODE_COMPACT_FILTERS"),
        (Self::NODE_NETWORK_LIMITED, "NODE_NETWORK_LIMITED"),
    ];

    pub fn names(self) -> Vec<&'static str> {
        if self.is_empty() {
            return vec!["NONE"];
        }

        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl std::ops::BitOr for Services {
    type Output = Services;

    fn bitor(self, rhs: Services) -> Services {
        self.union(rhs)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.is_empty() {
            return write!(f, "Services(NONE)");
        }

        write!(f, "Services({}) [0x{:016x}]", self.names().join(" | "), self.bits())
    }
}

impl Display for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_list_known_flags() {
        let s = Services::NODE_NETWORK | Services::NODE_WITNESS | Services::NODE_NETWORK_LIMITED;
        assert_eq!(s.bits(), 1033);
        assert_eq!(
            s.names(),
            vec!["NODE_NETWORK", "NODE_WITNESS", "NODE_NETWORK_LIMITED"]
        );
        assert_eq!(Services::NONE.names(), vec!["NONE"]);
    }

    #[test]
    fn split_halves() {
        let s = Services::new(0x1122_3344_5566_7788);
        assert_eq!(s.split(), (0x5566_7788, 0x1122_3344));
    }

    #[test]
    fn unknown_bits_preserved() {
        let s = Services::new(1 << 63);
        assert!(s.names().is_empty());
        assert_eq!(s.bits(), 1 << 63);
    }
}
