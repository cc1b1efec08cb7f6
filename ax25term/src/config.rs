use ax25core::address::Callsign;
use ax25core::link::LinkConfig;

/// Everything the session dispatcher needs to know at startup.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SessionConfig {
    pub mycall: Callsign,
    pub link: LinkConfig,
    /// Terminate transmitted lines with CRLF instead of the customary CR.
    pub crlf: bool,
}

impl SessionConfig {
    pub fn new(mycall: Callsign) -> Self {
        Self {
            mycall,
            link: LinkConfig::default(),
            crlf: false,
        }
    }
}
