//! Transport seam between a node and its configured peer.
//!
//! [`PeerResolver`] turns a peer name into a [`PeerLink`]; the link only knows how to
//! deliver a single [`PeerCall`]. The UDP implementation sends bincode frames to a
//! `host:port` peer name.
//!
//! [`request_control`] is the operator side of the same transport: it sends one
//! [`ControlCall`] to a running node and waits for its [`ControlReply`].

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::{
    error::LinkError,
    wire::{self, ControlCall, ControlReply, Message, PeerCall},
};

/// Delivers calls to one resolved peer.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Sends a call. May fail transiently; no retry and no deadline.
    async fn send(&self, call: PeerCall) -> Result<(), LinkError>;

    /// Call kinds the peer accepts.
    async fn capabilities(&self) -> Result<Vec<String>, LinkError> {
        Ok(PeerCall::NAMES.iter().map(|n| n.to_string()).collect())
    }
}

/// Resolves a configured peer name into a usable link.
#[async_trait]
pub trait PeerResolver: Send + Sync {
    async fn resolve(&self, peer_name: &str) -> Result<Arc<dyn PeerLink>, LinkError>;
}

/// Link sending frames over a connected UDP socket.
pub struct UdpPeerLink {
    socket: UdpSocket,
    remote_addr: SocketAddr,
}

impl UdpPeerLink {
    /// Binds an ephemeral socket of the matching address family and connects it to `remote_addr`.
    pub async fn connect(remote_addr: SocketAddr) -> Result<Self, LinkError> {
        let local_addr: SocketAddr = if remote_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(remote_addr).await?;
        Ok(UdpPeerLink {
            socket,
            remote_addr,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Sends a control call and waits up to `wait` for the reply.
    pub async fn request(
        &self,
        call: ControlCall,
        wait: Duration,
    ) -> Result<ControlReply, LinkError> {
        let buf = wire::encode(call)?;
        self.socket.send(&buf).await?;

        let mut buf = [0u8; wire::MAX_FRAME_SIZE];
        let len = tokio::time::timeout(wait, self.socket.recv(&mut buf))
            .await
            .map_err(|_| LinkError::Timeout(wait))??;
        match wire::decode(&buf[..len])? {
            Message::Reply(reply) => Ok(reply),
            other => {
                log::debug!("Expected a reply from {}, got {:?}", self.remote_addr, other);
                Err(LinkError::UnexpectedReply(self.remote_addr))
            }
        }
    }
}

#[async_trait]
impl PeerLink for UdpPeerLink {
    async fn send(&self, call: PeerCall) -> Result<(), LinkError> {
        let buf = wire::encode(call)?;
        self.socket.send(&buf).await?;
        Ok(())
    }
}

/// Resolves `host:port` names through the system resolver.
#[derive(Default)]
pub struct UdpResolver;

#[async_trait]
impl PeerResolver for UdpResolver {
    async fn resolve(&self, peer_name: &str) -> Result<Arc<dyn PeerLink>, LinkError> {
        let link = UdpPeerLink::connect(lookup(peer_name).await?).await?;
        Ok(Arc::new(link))
    }
}

async fn lookup(peer_name: &str) -> Result<SocketAddr, LinkError> {
    tokio::net::lookup_host(peer_name)
        .await?
        .next()
        .ok_or_else(|| LinkError::Resolve(format!("no address for {}", peer_name)))
}

/// Sends one control call to the node listening at `target` and returns its reply.
pub async fn request_control(
    target: &str,
    call: ControlCall,
    wait: Duration,
) -> Result<ControlReply, LinkError> {
    let link = UdpPeerLink::connect(lookup(target).await?).await?;
    link.request(call, wait).await
}
