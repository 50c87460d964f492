pub use clap::Parser;
use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::{
    connection::peer_configured, dispatcher::DispatchSettings, server::MAX_IN_FLIGHT,
    stats::OutputFormat, wire::ControlCall,
};

/// Errors detected while validating the configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("A control request needs the node address in --peer-name")]
    ControlWithoutPeer,
    #[error("Pending max age ({max_age_ms} ms) must not be shorter than the ping interval ({interval_ms} ms)")]
    MaxAgeBelowInterval { max_age_ms: u64, interval_ms: u64 },
}

#[derive(Parser, Debug)]
#[clap(author = "Piotr Olszewski", version, about, long_about = None)]
pub struct Configuration {
    /// Address (host:port) of the peer to ping; empty disables outbound pinging
    #[clap(short, long, default_value = "")]
    pub peer_name: String,
    /// Ping period in milliseconds; 0 disables the background dispatcher
    #[clap(short = 'i', long, default_value_t = 0)]
    pub ping_interval_ms: u64,
    /// Local address to listen on for peer calls
    #[clap(short, long, default_value = "0.0.0.0:4850")]
    pub local_addr: SocketAddr,
    /// Drop pending pings older than this many milliseconds; 0 keeps them forever
    #[clap(long, default_value_t = 0)]
    pub pending_max_age_ms: u64,
    /// Format of the summary printed on shutdown
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,
    /// Most inbound calls handled at once; extra datagrams are dropped
    #[clap(long, default_value_t = MAX_IN_FLIGHT)]
    pub max_in_flight: usize,
    /// Send this request to the node at --peer-name, print the reply and exit
    #[clap(long, value_enum)]
    pub control: Option<ControlCall>,
    /// How long to wait for the reply to --control, in milliseconds
    #[clap(long, default_value_t = 2000)]
    pub control_timeout_ms: u64,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.control.is_some() && !self.has_peer() {
            return Err(ConfigurationError::ControlWithoutPeer);
        }

        if self.pending_max_age_ms > 0 && self.pending_max_age_ms < self.ping_interval_ms {
            return Err(ConfigurationError::MaxAgeBelowInterval {
                max_age_ms: self.pending_max_age_ms,
                interval_ms: self.ping_interval_ms,
            });
        }

        Ok(())
    }

    pub fn has_peer(&self) -> bool {
        peer_configured(&self.peer_name)
    }

    /// The dispatcher will run but every cycle is a no-op.
    pub fn interval_without_peer(&self) -> bool {
        self.ping_interval_ms > 0 && !self.has_peer()
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings::from_millis(self.ping_interval_ms, self.pending_max_age_ms)
    }
}
