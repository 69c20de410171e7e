//! The `version`/`verack` exchange as a pure state machine.
//!
//! [`Handshake`] never touches a socket: it is fed decoded messages and
//! answers with the messages to send back. [`crate::session::Session`]
//! does the I/O.
//!
//! https://developer.bitcoin.org/devguide/p2p_network.html#connecting-to-peers
//! The handshake expects:
//! 1. version messages exchanged between peers
//! 2. optional feature negotiation (`sendaddrv2`, BIP-155)
//! 3. verack messages

use std::fmt;

use thiserror::Error;

use crate::wire::address::AddressVersion;
use crate::wire::message::Message;
use crate::wire::version::VersionMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    Idle,
    /// Our `version` is out; waiting for the peer's.
    VersionSent,
    /// Peer's `version` arrived. Transient: our replies are queued in the
    /// same step, which moves on to `VerackExchanged`.
    VersionReceived,
    /// Our `verack` is queued; waiting for the peer's.
    VerackExchanged,
    Ready,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::VersionSent => "version sent",
            HandshakeState::VersionReceived => "version received",
            HandshakeState::VerackExchanged => "verack exchanged",
            HandshakeState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// A message that the handshake cannot accept in its current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected `{command}` while {state}")]
pub struct UnexpectedMessage {
    pub command: String,
    pub state: HandshakeState,
}

#[derive(Debug, Clone)]
pub struct Handshake {
    state: HandshakeState,
    local: VersionMessage,
    send_addrv2: bool,
    peer_version: Option<VersionMessage>,
    peer_wants_addrv2: bool,
}

impl Handshake {
    /// `local` is announced on [`start`](Self::start); `send_addrv2`
    /// controls whether we signal BIP-155 support before our verack.
    pub fn new(local: VersionMessage, send_addrv2: bool) -> Self {
        Self {
            state: HandshakeState::Idle,
            local,
            send_addrv2,
            peer_version: None,
            peer_wants_addrv2: false,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    /// The peer's `version`, once received.
    pub fn peer_version(&self) -> Option<&VersionMessage> {
        self.peer_version.as_ref()
    }

    pub fn local_version(&self) -> &VersionMessage {
        &self.local
    }

    /// Address format to use when sending addresses to this peer.
    pub fn negotiated_address_version(&self) -> AddressVersion {
        if self.peer_wants_addrv2 {
            AddressVersion::V2
        } else {
            AddressVersion::V1
        }
    }

    /// Opens the handshake. Returns our `version`.
    pub fn start(&mut self) -> Result<Message, UnexpectedMessage> {
        if self.state != HandshakeState::Idle {
            return Err(UnexpectedMessage {
                command: "version".to_owned(),
                state: self.state,
            });
        }
        self.state = HandshakeState::VersionSent;
        Ok(Message::Version(self.local.clone()))
    }

    /// Feeds one message from the peer and returns what to send back, in
    /// order.
    ///
    /// Once [`Ready`](HandshakeState::Ready) every message is passed over;
    /// it belongs to the application, not the handshake.
    pub fn receive(&mut self, msg: &Message) -> Result<Vec<Message>, UnexpectedMessage> {
        use HandshakeState::*;

        let unexpected = |state| UnexpectedMessage {
            command: msg.command_name().to_owned(),
            state,
        };

        match (self.state, msg) {
            (Ready, _) => Ok(Vec::new()),
            (Idle, _) => Err(unexpected(Idle)),

            (VersionSent, Message::Version(peer)) => {
                self.peer_version = Some(peer.clone());
                self.state = VersionReceived;

                let mut replies = Vec::with_capacity(2);
                // sendaddrv2 is only valid before verack
                if self.send_addrv2 {
                    replies.push(Message::SendAddrV2);
                }
                replies.push(Message::Verack);

                self.state = VerackExchanged;
                Ok(replies)
            }
            (VersionSent, Message::Verack) => Err(unexpected(VersionSent)),
            (state, Message::Version(_)) => Err(unexpected(state)),

            (VerackExchanged, Message::Verack) => {
                self.state = Ready;
                Ok(Vec::new())
            }

            // only counts between the peer's version and its verack
            (VerackExchanged, Message::SendAddrV2) => {
                self.peer_wants_addrv2 = true;
                Ok(Vec::new())
            }
            _ => Ok(Vec::new()),
        }
    }
}
