//! Peer call framing.
//!
//! Every datagram carries exactly one [`Message`] wrapped in a small versioned frame and
//! serialized with bincode (fixed-width integers, no trailing bytes allowed).

use std::fmt;

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier of one outstanding ping.
pub type Tag = u64;

/// Version byte written into every frame.
pub const WIRE_VERSION: u8 = 1;

/// Largest frame the peer server will accept.
pub const MAX_FRAME_SIZE: usize = 64;

/// Calls exchanged between two peers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerCall {
    /// Sent by the pinging side; the receiver must answer with `Ack` carrying the same tag.
    Pong { tag: Tag },
    /// Resolves a previously sent ping.
    Ack { tag: Tag },
}

impl PeerCall {
    /// Names of every call kind a peer understands.
    pub const NAMES: [&'static str; 2] = ["pong", "ack"];

    pub fn tag(&self) -> Tag {
        match *self {
            PeerCall::Pong { tag } | PeerCall::Ack { tag } => tag,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PeerCall::Pong { .. } => "pong",
            PeerCall::Ack { .. } => "ack",
        }
    }
}

impl fmt::Display for PeerCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.tag())
    }
}

/// Requests an operator sends to a running node. Answered with a [`ControlReply`] to the
/// requesting address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ControlCall {
    /// Send one ping to the node's peer now.
    Trigger,
    /// Read the current roundtrip statistics.
    Stats,
}

/// Read-only roundtrip statistics as seen by a remote poller.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_roundtrips: u64,
    pub avg_roundtrip_ms: f64,
    pub worst_roundtrip_ms: f64,
    pub pending_pings: u64,
}

/// Answers to a [`ControlCall`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControlReply {
    /// The ping went out with this tag, or `None` when no peer is configured.
    Triggered { tag: Option<Tag> },
    /// The ping could not be sent.
    Failed { reason: String },
    Stats(StatsReport),
}

impl fmt::Display for ControlReply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControlReply::Triggered { tag: Some(tag) } => write!(f, "Ping sent with tag {}", tag),
            ControlReply::Triggered { tag: None } => write!(f, "No peer configured, nothing sent"),
            ControlReply::Failed { reason } => write!(f, "Ping failed: {}", reason),
            ControlReply::Stats(s) => write!(
                f,
                "Total: {}, Avg: {:.4} ms, Worst: {:.4} ms, Pending: {}",
                s.total_roundtrips, s.avg_roundtrip_ms, s.worst_roundtrip_ms, s.pending_pings
            ),
        }
    }
}

/// Anything that may travel in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Peer(PeerCall),
    Control(ControlCall),
    Reply(ControlReply),
}

impl From<PeerCall> for Message {
    fn from(call: PeerCall) -> Self {
        Message::Peer(call)
    }
}

impl From<ControlCall> for Message {
    fn from(call: ControlCall) -> Self {
        Message::Control(call)
    }
}

impl From<ControlReply> for Message {
    fn from(reply: ControlReply) -> Self {
        Message::Reply(reply)
    }
}

#[derive(Serialize, Deserialize)]
struct Frame {
    version: u8,
    message: Message,
}

/// Errors raised while encoding or decoding a frame.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Frame codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Unsupported frame version {0}")]
    UnsupportedVersion(u8),
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serializes a message into a datagram payload.
pub fn encode(message: impl Into<Message>) -> Result<Vec<u8>, WireError> {
    let frame = Frame {
        version: WIRE_VERSION,
        message: message.into(),
    };
    Ok(codec().serialize(&frame)?)
}

/// Parses a datagram payload back into a message.
pub fn decode(data: &[u8]) -> Result<Message, WireError> {
    let frame: Frame = codec().deserialize(data)?;
    if frame.version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(frame.version));
    }
    Ok(frame.message)
}
