//! Connection state as seen by the provider

/// State of the provider's coordination session
///
/// Driven by the coordination client's event stream, not by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session, or the transport dropped
    #[default]
    Disconnected,
    /// A connection attempt is in progress
    Connecting,
    /// Session established and usable
    Connected,
    /// The service expired the session; the next use opens a new one
    SessionExpired,
}

impl ConnectionState {
    /// Upper-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::SessionExpired => "SESSION_EXPIRED",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
