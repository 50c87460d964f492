//! Pingpong Suite - tagged ping/ack roundtrip latency measurement.
//!
//! Two cooperating peers exchange `pong(tag)` / `ack(tag)` calls over UDP. Each side
//! correlates acks with the pings it sent and keeps running roundtrip statistics
//! (count, average, worst) with a throttled log summary.
//!
//! # Usage
//!
//! Run a pinging peer:
//! ```bash
//! pingpong --local-addr 0.0.0.0:4850 --peer-name 192.168.1.2:4850 --ping-interval-ms 100
//! ```
//!
//! Run the echoing peer:
//! ```bash
//! pingpong --local-addr 0.0.0.0:4850 --peer-name 192.168.1.1:4850
//! ```
//!
//! Ask a running peer for its statistics, or make it send one ping now:
//! ```bash
//! pingpong --peer-name 192.168.1.1:4850 --control stats
//! pingpong --peer-name 192.168.1.1:4850 --control trigger
//! ```

/// Command-line configuration and validation.
pub mod configuration;
/// Lazy peer resolution and call forwarding.
pub mod connection;
/// Tag sequence and pending ping table.
pub mod correlator;
/// Background periodic ping loop.
pub mod dispatcher;
/// Error taxonomy of the roundtrip engine.
pub mod error;
/// Peer transport abstraction and its UDP implementation.
pub mod link;
/// Peer-facing entry points.
pub mod node;
/// UDP server feeding inbound peer and control calls to the node.
pub mod server;
/// Roundtrip statistics aggregation and output.
pub mod stats;
/// Peer call framing.
pub mod wire;
