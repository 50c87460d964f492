use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{net::UdpSocket, sync::Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{
    node::PingPongNode,
    wire::{self, Message},
};

/// Default cap on calls being handled at once.
pub const MAX_IN_FLIGHT: usize = 256;

/// Pause after a failed receive before reading the socket again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Receives peer and control calls on a UDP socket and hands each one to the node.
pub struct PeerServer {
    socket: Arc<UdpSocket>,
    max_in_flight: usize,
}

impl PeerServer {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(PeerServer {
            socket: Arc::new(socket),
            max_in_flight: MAX_IN_FLIGHT,
        })
    }

    /// Limits how many calls may be handled concurrently. Datagrams arriving above the
    /// limit are dropped.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serves until `cancel` fires.
    ///
    /// Every call runs in its own task, so handlers may overlap with each other and with
    /// the dispatcher. Control calls are answered to the address they came from.
    pub async fn run(self, node: Arc<PingPongNode>, cancel: CancellationToken) {
        let in_flight = Arc::new(Semaphore::new(self.max_in_flight));
        let mut buf = [0u8; 1024];

        loop {
            let (len, src) = tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP errors from earlier sends surface here on some platforms.
                        log::debug!("Receive error: {}", e);
                        tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                        continue;
                    }
                },
                _ = cancel.cancelled() => break,
            };

            if len > wire::MAX_FRAME_SIZE {
                log::warn!("Dropping oversized datagram ({} bytes) from {}", len, src);
                continue;
            }

            let message = match wire::decode(&buf[..len]) {
                Ok(message) => message,
                Err(e) => {
                    log::warn!("Dropping malformed datagram from {}: {}", src, e);
                    continue;
                }
            };

            let permit = match in_flight.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    log::warn!(
                        "{} calls in flight, dropping {:?} from {}",
                        self.max_in_flight,
                        message,
                        src
                    );
                    continue;
                }
            };

            match message {
                Message::Peer(call) => {
                    log::debug!("Received {} from {}", call, src);
                    let node = node.clone();
                    tokio::spawn(async move {
                        node.handle_call(call).await;
                        drop(permit);
                    });
                }
                Message::Control(call) => {
                    log::debug!("Received {:?} request from {}", call, src);
                    let node = node.clone();
                    let socket = self.socket.clone();
                    tokio::spawn(async move {
                        let reply = node.handle_control(call).await;
                        drop(permit);
                        match wire::encode(reply) {
                            Ok(buf) => {
                                if let Err(e) = socket.send_to(&buf, src).await {
                                    log::warn!("Cannot answer {:?} request from {}: {}", call, src, e);
                                }
                            }
                            Err(e) => log::error!("Cannot encode reply to {}: {}", src, e),
                        }
                    });
                }
                Message::Reply(reply) => {
                    log::warn!("Dropping unsolicited reply from {}: {}", src, reply);
                }
            }
        }
        log::debug!("Peer server stopped");
    }
}
