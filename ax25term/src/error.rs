use ax25core::address::AddressError;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TermError {
    #[error("unable to reach the TNC at {addr}: {cause}")]
    ConnectFailed { addr: String, cause: String },

    #[error("the connection to the TNC was lost")]
    TransportDown,

    #[error("'{callsign}' is not a valid callsign: {reason}")]
    InvalidCallsign {
        callsign: String,
        reason: AddressError,
    },

    #[error("no connection is established")]
    NotConnected,

    #[error("line is too long to transmit (limit {limit} bytes)")]
    LineTooLong { limit: usize },

    #[error("transmit queue is full; wait for the peer to catch up")]
    QueueFull,

    #[error("usage: {0}")]
    Usage(&'static str),
}
