use ax25core::address::Callsign;

/// Link-level happenings a front end will want to tell the operator about.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LinkStatus {
    Connecting(Callsign),
    Connected(Callsign),
    Disconnected,
    /// The peer released the link.
    PeerDisconnected,
    /// The peer answered our connect request with DM.
    PeerRefused,
    ConnectTimedOut { attempts: u8 },
    LinkLost,
    ProtocolError,
    TransportDown,
    UnprotoSent(Callsign),
}

/// Callbacks from the session dispatcher to the terminal front end.
///
/// Called on the dispatcher thread; implementations should hand off promptly
/// rather than block the protocol engine.
pub trait Terminal: Send + 'static {
    /// Payload of a delivered I-frame, or of an inbound UI frame.
    fn rx(&mut self, source: &Callsign, pid: u8, text: &[u8]);

    /// A change in link state worth reporting.
    fn status(&mut self, status: LinkStatus);

    /// An informational line from the engine (command feedback, status
    /// summaries).
    fn notice(&mut self, text: &str);

    /// Whether remote pager output is awaiting operator input. Polled before
    /// each keepalive opportunity; while true the T3 poll stays parked.
    fn pager_pending(&mut self) -> bool;
}

/// A terminal that reports nothing and never has a pager pending.
pub struct NullTerminal;

impl Terminal for NullTerminal {
    fn rx(&mut self, _source: &Callsign, _pid: u8, _text: &[u8]) {}
    fn status(&mut self, _status: LinkStatus) {}
    fn notice(&mut self, _text: &str) {}
    fn pager_pending(&mut self) -> bool {
        false
    }
}
