//! Token gate - the per-process side of the token-ring protocol
//!
//! The application thread moves `Idle -> Requesting` and
//! `InCriticalSection -> Releasing`; the token handler moves
//! `Requesting -> InCriticalSection` and `Releasing -> Idle`.
//! Each side condition-waits for the other's transition.

use parking_lot::{Condvar, Mutex};

use dcp_core::{DcpError, DcpResult, TokenState};

struct GateState {
    token: TokenState,
    interrupted: bool,
}

impl GateState {
    fn advance(&mut self, next: TokenState) -> DcpResult<()> {
        if !self.token.can_transition_to(next) {
            return Err(DcpError::ProtocolMisuse(format!(
                "cannot move from {} to {}",
                self.token.name(),
                next.name()
            )));
        }
        self.token = next;
        Ok(())
    }
}

pub(crate) struct TokenGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl TokenGate {
    pub(crate) fn new() -> Self {
        TokenGate {
            state: Mutex::new(GateState {
                token: TokenState::Idle,
                interrupted: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> TokenState {
        self.state.lock().token
    }

    /// `Idle -> Requesting`, then wait for the grant.
    ///
    /// A request right after a release waits for the holder thread to pass
    /// the token on and settle back to `Idle` first.
    pub(crate) fn request_and_wait(&self) -> DcpResult<()> {
        let mut state = self.state.lock();
        while state.token == TokenState::Releasing && !state.interrupted {
            self.changed.wait(&mut state);
        }
        if state.interrupted {
            return Err(DcpError::Interrupted);
        }
        state.advance(TokenState::Requesting)?;

        while state.token != TokenState::InCriticalSection {
            if state.interrupted {
                // Withdraw: a token arriving later just passes through.
                state.token = TokenState::Idle;
                return Err(DcpError::Interrupted);
            }
            self.changed.wait(&mut state);
        }
        Ok(())
    }

    /// `Requesting -> InCriticalSection`. Returns `false` when nobody asked.
    pub(crate) fn grant(&self) -> bool {
        let mut state = self.state.lock();
        if state.token != TokenState::Requesting {
            return false;
        }
        state.token = TokenState::InCriticalSection;
        self.changed.notify_all();
        true
    }

    /// `InCriticalSection -> Releasing`
    pub(crate) fn release(&self) -> DcpResult<()> {
        let mut state = self.state.lock();
        state.advance(TokenState::Releasing)?;
        self.changed.notify_all();
        Ok(())
    }

    /// Wait for `Releasing`, then settle back to `Idle`
    pub(crate) fn wait_for_release(&self) -> DcpResult<()> {
        let mut state = self.state.lock();
        while state.token != TokenState::Releasing {
            if state.interrupted {
                return Err(DcpError::Interrupted);
            }
            self.changed.wait(&mut state);
        }
        state.advance(TokenState::Idle)?;
        self.changed.notify_all();
        Ok(())
    }

    pub(crate) fn interrupt(&self) {
        self.state.lock().interrupted = true;
        self.changed.notify_all();
    }
}
