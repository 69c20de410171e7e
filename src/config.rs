//! Command line arguments and the node configuration derived from them.

use std::time::Duration;

use clap::Parser;

use crate::wire::services::Services;
use crate::wire::version::{USER_AGENT, VersionMessage};
use crate::wire::network::{Network, NetworkParams};

#[derive(Parser, Debug)]
#[command(name = "btc-handshake", version, about = "Bitcoin P2P handshake client")]
pub struct Args {
    /// Network whose magic and default port are used.
    #[arg(long, default_value = "mainnet")]
    pub network: Network,

    /// Peer to connect to, `host` or `host:port`. Repeatable.
    #[arg(long = "peer", required = true)]
    pub peers: Vec<String>,

    #[arg(long, default_value_t = 30)]
    pub connect_timeout_secs: u64,

    /// Per-read and per-write socket timeout.
    #[arg(long, default_value_t = 10)]
    pub io_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    pub handshake_timeout_secs: u64,

    #[arg(long, default_value = USER_AGENT)]
    pub user_agent: String,

    /// Service bits advertised in our version message.
    #[arg(long, default_value_t = 0)]
    pub services: u64,

    #[arg(long, default_value_t = 0)]
    pub best_height: u32,

    /// Ask peers not to relay transactions.
    #[arg(long)]
    pub no_relay: bool,

    /// Do not send `sendaddrv2` before our verack.
    #[arg(long)]
    pub no_addrv2: bool,

    /// Send a random nonce instead of zero.
    #[arg(long)]
    pub random_nonce: bool,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Everything a session needs to know about the local node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub network: Network,
    pub peers: Vec<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub handshake_timeout: Duration,
    pub user_agent: String,
    pub services: Services,
    pub best_height: u32,
    pub relay: bool,
    pub send_addrv2: bool,
    pub random_nonce: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            peers: Vec::new(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(60),
            user_agent: USER_AGENT.to_owned(),
            services: Services::NONE,
            best_height: 0,
            relay: true,
            send_addrv2: true,
            random_nonce: false,
        }
    }
}

impl NodeConfig {
    pub fn params(&self) -> NetworkParams {
        self.network.params()
    }

    pub fn magic(&self) -> u32 {
        self.params().magic
    }

    /// Appends the network's default port to peers given without one.
    pub fn peer_address(&self, peer: &str) -> String {
        let has_port = match peer.rsplit_once(':') {
            // bare IPv6 literals contain colons but no brackets
            Some((host, port)) => {
                port.parse::<u16>().is_ok() && (!host.contains(':') || host.ends_with(']'))
            }
            None => false,
        };

        if has_port {
            peer.to_owned()
        } else if peer.contains(':') && !peer.starts_with('[') {
            format!("[{peer}]:{}", self.params().port)
        } else {
            format!("{peer}:{}", self.params().port)
        }
    }

    /// The version message this node announces to a peer listening on
    /// `peer_port`.
    pub fn version_message(&self, peer_port: u16) -> VersionMessage {
        let msg = VersionMessage::new(self.services, peer_port)
            .with_version(self.params().protocol_version)
            .with_user_agent(self.user_agent.clone())
            .with_best_height(self.best_height)
            .with_relay(self.relay);

        if self.random_nonce {
            msg.with_random_nonce()
        } else {
            msg
        }
    }
}

impl From<Args> for NodeConfig {
    fn from(args: Args) -> Self {
        let io_timeout = Duration::from_secs(args.io_timeout_secs);

        Self {
            network: args.network,
            peers: args.peers,
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            read_timeout: io_timeout,
            write_timeout: io_timeout,
            handshake_timeout: Duration::from_secs(args.handshake_timeout_secs),
            user_agent: args.user_agent,
            services: Services::new(args.services),
            best_height: args.best_height,
            relay: !args.no_relay,
            send_addrv2: !args.no_addrv2,
            random_nonce: args.random_nonce,
        }
    }
}
