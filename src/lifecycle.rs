//! Provider lifecycle state machine.

/// Lifecycle of a [`VersionedStateProvider`](crate::VersionedStateProvider).
///
/// ```text
/// Uninitialized --initialize--> Initialized --enable--> Enabled
///                                                          |
///                         ShutDown <--shutdown-- Disabled <-+ disable
/// ```
///
/// Data operations are only accepted while `Enabled`. `ShutDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Created, no configuration yet
    #[default]
    Uninitialized,
    /// Configuration validated and stored
    Initialized,
    /// Session open, accepting data operations
    Enabled,
    /// Rejecting data operations; session still open
    Disabled,
    /// Session closed; terminal
    ShutDown,
}

impl LifecycleState {
    /// Upper-case name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "UNINITIALIZED",
            LifecycleState::Initialized => "INITIALIZED",
            LifecycleState::Enabled => "ENABLED",
            LifecycleState::Disabled => "DISABLED",
            LifecycleState::ShutDown => "SHUT_DOWN",
        }
    }

    /// State that must precede `self`, `None` for the initial state
    pub(crate) fn predecessor(&self) -> Option<LifecycleState> {
        match self {
            LifecycleState::Uninitialized => None,
            LifecycleState::Initialized => Some(LifecycleState::Uninitialized),
            LifecycleState::Enabled => Some(LifecycleState::Initialized),
            LifecycleState::Disabled => Some(LifecycleState::Enabled),
            LifecycleState::ShutDown => Some(LifecycleState::Disabled),
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
