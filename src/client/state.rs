// ABOUTME: Session state machine: Disconnected -> Connected -> Bound(mode)
// ABOUTME: Gates every engine operation on the minimum state it requires

use crate::client::error::{SmppError, SmppResult};
use crate::datatypes::BindMode;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
    Bound(BindMode),
}

impl SessionState {
    pub fn is_bound(self) -> bool {
        matches!(self, SessionState::Bound(_))
    }

    pub fn is_connected(self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Connected => f.write_str("connected"),
            SessionState::Bound(mode) => write!(f, "bound ({mode:?})"),
        }
    }
}

/// Engine entry points, each with the state it needs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Bind,
    Unbind,
    Submit,
    SubmitMulti,
    Query,
    Cancel,
    Replace,
    Enquire,
    /// Responses to peer requests (enquire_link_resp, deliver_sm_resp,
    /// unbind_resp, generic_nack).
    Respond,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Bind => "bind",
            Operation::Unbind => "unbind",
            Operation::Submit => "submit_sm",
            Operation::SubmitMulti => "submit_multi",
            Operation::Query => "query_sm",
            Operation::Cancel => "cancel_sm",
            Operation::Replace => "replace_sm",
            Operation::Enquire => "enquire_link",
            Operation::Respond => "response",
        }
    }

    fn permitted_in(self, state: SessionState) -> bool {
        match self {
            Operation::Bind => state == SessionState::Connected,
            Operation::Respond => state.is_connected(),
            Operation::Unbind
            | Operation::Submit
            | Operation::SubmitMulti
            | Operation::Query
            | Operation::Cancel
            | Operation::Replace
            | Operation::Enquire => state.is_bound(),
        }
    }
}

/// Tracks the session state. Only the engine mutates it, from its own entry
/// points and its incoming-PDU dispatcher.
#[derive(Debug, Default)]
pub struct BindStateMachine {
    state: SessionState,
}

impl BindStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fails with `NotAuthorized` when `op` needs a higher state.
    pub fn require(&self, op: Operation) -> SmppResult<()> {
        if op.permitted_in(self.state) {
            Ok(())
        } else {
            Err(SmppError::NotAuthorized {
                operation: op.name(),
                state: self.state,
            })
        }
    }

    pub fn connected(&mut self) {
        self.state = SessionState::Connected;
    }

    pub fn bound(&mut self, mode: BindMode) {
        self.state = SessionState::Bound(mode);
    }

    /// Bound -> Connected after an unbind in either direction.
    pub fn unbound(&mut self) {
        if self.state.is_bound() {
            self.state = SessionState::Connected;
        }
    }

    pub fn disconnected(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUND_ONLY: [Operation; 7] = [
        Operation::Unbind,
        Operation::Submit,
        Operation::SubmitMulti,
        Operation::Query,
        Operation::Cancel,
        Operation::Replace,
        Operation::Enquire,
    ];

    #[test]
    fn starts_disconnected_and_permits_nothing() {
        let sm = BindStateMachine::new();
        assert_eq!(sm.state(), SessionState::Disconnected);
        assert!(sm.require(Operation::Bind).is_err());
        assert!(sm.require(Operation::Respond).is_err());
        for op in BOUND_ONLY {
            assert!(sm.require(op).is_err());
        }
    }

    #[test]
    fn bind_needs_connected_only() {
        let mut sm = BindStateMachine::new();
        sm.connected();
        assert!(sm.require(Operation::Bind).is_ok());
        for op in BOUND_ONLY {
            let err = sm.require(op).unwrap_err();
            assert!(matches!(
                err,
                SmppError::NotAuthorized {
                    state: SessionState::Connected,
                    ..
                }
            ));
        }

        sm.bound(BindMode::Transceiver);
        assert!(sm.require(Operation::Bind).is_err());
        for op in BOUND_ONLY {
            assert!(sm.require(op).is_ok());
        }
    }

    #[test]
    fn unbind_and_failure_transitions() {
        let mut sm = BindStateMachine::new();
        sm.connected();
        sm.bound(BindMode::Transmitter);
        sm.unbound();
        assert_eq!(sm.state(), SessionState::Connected);
        sm.disconnected();
        assert_eq!(sm.state(), SessionState::Disconnected);
        // unbound from disconnected stays put
        sm.unbound();
        assert_eq!(sm.state(), SessionState::Disconnected);
    }
}
