use std::net::SocketAddr;

use thiserror::Error;

/// Fatal at startup — the process must not begin broadcasting with a
/// malformed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("update_rate_ms must be greater than zero")]
    ZeroUpdateRate,

    #[error("parameter {0} has no OSC addresses configured")]
    NoAddresses(&'static str),

    #[error("invalid OSC address {address:?} for parameter {parameter}: must start with '/'")]
    InvalidAddress {
        parameter: &'static str,
        address: String,
    },

    #[error("invalid custom-port host {0:?}: not an IP address")]
    InvalidHost(String),
}

/// Probe/query failure. Recovered locally: the candidate is rejected and
/// the discovery cycle continues.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("probe request to {url} failed: {reason}")]
    Probe { url: String, reason: String },

    #[error("response from {url} is not a valid OSCQuery document: {reason}")]
    MalformedTree { url: String, reason: String },

    #[error("capability marker {marker} not present in address space")]
    MarkerAbsent { marker: String },
}

/// Send failure. Recovered locally: swallowed per-destination, the next
/// tick naturally retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect UDP socket to {dest}")]
    Connect {
        dest: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send to {dest}")]
    Send {
        dest: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode OSC message for {addr}: {reason}")]
    Encode { addr: String, reason: String },
}
