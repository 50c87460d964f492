use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    error::Error,
    link::{PeerLink, PeerResolver},
    wire::PeerCall,
};

/// Whether `peer_name` names a peer at all. Blank names disable outbound calls.
pub fn peer_configured(peer_name: &str) -> bool {
    !peer_name.trim().is_empty()
}

/// Handle to the configured peer.
#[derive(Default)]
pub struct ConnectionState {
    link: Option<Arc<dyn PeerLink>>,
    connected: bool,
}

/// Resolves the configured peer lazily and forwards calls to it.
///
/// The first successful resolution is the only automatic state transition. A peer that
/// stops answering stays "connected" until [`ConnectionManager::reset`] is called.
pub struct ConnectionManager {
    peer_name: String,
    resolver: Arc<dyn PeerResolver>,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(peer_name: impl Into<String>, resolver: Arc<dyn PeerResolver>) -> Self {
        ConnectionManager {
            peer_name: peer_name.into(),
            resolver,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    /// Returns false when no peer is configured, i.e. outbound calls are disabled.
    pub fn is_enabled(&self) -> bool {
        peer_configured(&self.peer_name)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    /// Resolves the peer if not connected yet. Makes at most one attempt per call.
    ///
    /// The state lock is not held while resolving, so concurrent sends are never stuck
    /// behind a slow lookup.
    pub async fn ensure_connected(&self) -> Result<(), Error> {
        if !self.is_enabled() || self.is_connected().await {
            return Ok(());
        }

        let link = self
            .resolver
            .resolve(&self.peer_name)
            .await
            .map_err(|source| Error::ConnectFailure {
                peer: self.peer_name.clone(),
                source,
            })?;

        {
            let mut state = self.state.lock().await;
            if state.connected {
                // Another caller won the race; keep its handle.
                return Ok(());
            }
            state.link = Some(link.clone());
            state.connected = true;
        }

        log::info!("Successfully connected to {}", self.peer_name);
        match link.capabilities().await {
            Ok(calls) => log::info!(
                "Available commands on {}: {:?}",
                self.peer_name,
                calls
            ),
            Err(e) => log::debug!("Cannot query commands of {}: {}", self.peer_name, e),
        }
        Ok(())
    }

    /// Forwards a call to the peer handle.
    pub async fn send(&self, call: PeerCall) -> Result<(), Error> {
        let link = self
            .state
            .lock()
            .await
            .link
            .clone()
            .ok_or_else(|| Error::PeerUnavailable {
                peer: self.peer_name.clone(),
            })?;

        link.send(call)
            .await
            .map_err(|source| Error::SendFailure { call, source })
    }

    /// Drops the peer handle so that the next `ensure_connected` resolves again.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if state.connected {
            log::info!("Dropping connection to {}", self.peer_name);
        }
        *state = ConnectionState::default();
    }
}
