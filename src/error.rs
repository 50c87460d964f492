use thiserror::Error;

use crate::wire::{PeerCall, Tag, WireError};

/// Failures of the underlying peer transport.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("Cannot resolve peer: {0}")]
    Resolve(String),
    #[error("No reply within {0:?}")]
    Timeout(std::time::Duration),
    #[error("Unexpected reply from {0}")]
    UnexpectedReply(std::net::SocketAddr),
}

/// Conditions raised by the roundtrip engine.
///
/// None of them is fatal: each is logged where it surfaces and the caller carries on.
#[derive(Error, Debug)]
pub enum Error {
    /// No resolved handle for the peer; the send is skipped.
    #[error("Peer {peer} is not available")]
    PeerUnavailable { peer: String },
    /// Resolving the peer name failed; `connected` stays false.
    #[error("Failed to connect to peer {peer}: {source}")]
    ConnectFailure {
        peer: String,
        #[source]
        source: LinkError,
    },
    /// The call reached the transport but was not delivered.
    #[error("Failed to send {call}: {source}")]
    SendFailure {
        call: PeerCall,
        #[source]
        source: LinkError,
    },
    /// Ack for a tag that is not pending (duplicate, stale or forged).
    #[error("Received ack with unknown tag: {0}")]
    UnknownTag(Tag),
}
