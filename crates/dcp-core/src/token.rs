//! Token-ring mutual exclusion state

/// Per-process state of the token protocol
///
/// The only legal cycle is `Idle -> Requesting -> InCriticalSection ->
/// Releasing -> Idle`. At most one process in the system may be
/// `InCriticalSection` at any instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TokenState {
    #[default]
    Idle,
    Requesting,
    InCriticalSection,
    Releasing,
}

impl TokenState {
    /// Check whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: TokenState) -> bool {
        matches!(
            (self, next),
            (TokenState::Idle, TokenState::Requesting)
                | (TokenState::Requesting, TokenState::InCriticalSection)
                | (TokenState::InCriticalSection, TokenState::Releasing)
                | (TokenState::Releasing, TokenState::Idle)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenState::Idle => "idle",
            TokenState::Requesting => "requesting",
            TokenState::InCriticalSection => "in-critical-section",
            TokenState::Releasing => "releasing",
        }
    }
}
