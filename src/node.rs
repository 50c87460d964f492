//! Peer-facing entry points.
//!
//! A node plays both roles at once: it pings its configured peer and echoes the peer's
//! pings back. One instance is shared (behind an `Arc`) by the dispatcher and by every
//! inbound call handler.

use crate::{
    connection::ConnectionManager,
    correlator::RoundtripCorrelator,
    error::Error,
    stats::{MetricsAggregator, RecordOutcome, StatsSnapshot},
    wire::{ControlCall, ControlReply, PeerCall, StatsReport, Tag},
};

pub struct PingPongNode {
    connection: ConnectionManager,
    correlator: RoundtripCorrelator,
    metrics: MetricsAggregator,
}

impl PingPongNode {
    pub fn new(
        connection: ConnectionManager,
        correlator: RoundtripCorrelator,
        metrics: MetricsAggregator,
    ) -> Self {
        PingPongNode {
            connection,
            correlator,
            metrics,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn correlator(&self) -> &RoundtripCorrelator {
        &self.correlator
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.metrics.snapshot(self.correlator.pending_len())
    }

    /// Sends one ping to the peer.
    ///
    /// Returns `Ok(None)` when no peer is configured. The tag is registered before the
    /// call goes out; on `SendFailure` it stays pending.
    pub async fn trigger_ping(&self) -> Result<Option<Tag>, Error> {
        if !self.connection.is_enabled() {
            return Ok(None);
        }

        self.connection.ensure_connected().await?;
        if !self.connection.is_connected().await {
            return Err(Error::PeerUnavailable {
                peer: self.connection.peer_name().to_string(),
            });
        }

        let tag = self.correlator.new_ping();
        self.connection.send(PeerCall::Pong { tag }).await?;
        Ok(Some(tag))
    }

    /// The peer received our ping: echo its tag back as an ack.
    pub async fn on_pong(&self, tag: Tag) -> Result<(), Error> {
        self.connection.ensure_connected().await?;
        self.connection.send(PeerCall::Ack { tag }).await
    }

    /// Our ping came back: close the roundtrip and fold it into the metrics.
    pub fn on_ack(&self, tag: Tag) -> Result<RecordOutcome, Error> {
        let resolved = self.correlator.resolve(tag)?;
        Ok(self
            .metrics
            .record(resolved.tag, resolved.elapsed_ms, resolved.sent_at))
    }

    /// Routes an inbound call. Errors are logged here and never propagate.
    pub async fn handle_call(&self, call: PeerCall) {
        let result = match call {
            PeerCall::Pong { tag } => self.on_pong(tag).await,
            PeerCall::Ack { tag } => self.on_ack(tag).map(|_| ()),
        };

        match result {
            Ok(()) => {}
            Err(e @ Error::UnknownTag(_)) => log::warn!("{}", e),
            Err(e) => log::error!("Cannot handle {}: {}", call, e),
        }
    }

    /// Answers an operator request. Never fails: send errors come back as `Failed`.
    pub async fn handle_control(&self, call: ControlCall) -> ControlReply {
        match call {
            ControlCall::Trigger => match self.trigger_ping().await {
                Ok(tag) => ControlReply::Triggered { tag },
                Err(e) => {
                    log::error!("Triggered ping failed: {}", e);
                    ControlReply::Failed {
                        reason: e.to_string(),
                    }
                }
            },
            ControlCall::Stats => {
                let snapshot = self.snapshot();
                ControlReply::Stats(StatsReport {
                    total_roundtrips: snapshot.total_roundtrips,
                    avg_roundtrip_ms: snapshot.avg_roundtrip_ms,
                    worst_roundtrip_ms: snapshot.worst_roundtrip_ms,
                    pending_pings: snapshot.pending_pings as u64,
                })
            }
        }
    }
}
