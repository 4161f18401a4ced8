//! Envelope definitions
//!
//! An envelope (ε) is the unit published on the transport. All four kinds
//! share a header (sender, logical timestamp). Application envelopes
//! (broadcast, dedicated) carry an opaque payload and may be stamped;
//! control envelopes (token, barrier) are never stamped.

use crate::ProcessId;

/// Timestamp carried by envelopes that do not take part in causal ordering
pub const UNSTAMPED: u64 = 0;

/// Barrier phase - only the arrival request exists
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BarrierPhase {
    Request,
}

/// The mutual-exclusion permit. Exactly one circulates system-wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    /// Process entitled to act on the token
    pub holder: ProcessId,
}

impl Token {
    pub fn new(holder: ProcessId) -> Self {
        Token { holder }
    }

    /// Readdress the token to `next`
    #[inline]
    pub fn pass_to(&mut self, next: ProcessId) {
        self.holder = next;
    }
}

/// Envelope variants
#[derive(Clone, Debug, PartialEq)]
pub enum EnvelopeKind<T> {
    /// Delivered to every process except the sender
    Broadcast { payload: T },
    /// Delivered only to `receiver`
    Dedicated { receiver: ProcessId, payload: T },
    /// Token in flight, addressed by its holder
    Token(Token),
    /// Barrier arrival
    Barrier(BarrierPhase),
}

/// Envelope published on the transport
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<T> {
    pub sender: ProcessId,
    /// Lamport timestamp, [`UNSTAMPED`] for system envelopes
    pub timestamp: u64,
    pub kind: EnvelopeKind<T>,
}

impl<T> Envelope<T> {
    pub fn broadcast(sender: ProcessId, timestamp: u64, payload: T) -> Self {
        Envelope {
            sender,
            timestamp,
            kind: EnvelopeKind::Broadcast { payload },
        }
    }

    pub fn dedicated(sender: ProcessId, receiver: ProcessId, timestamp: u64, payload: T) -> Self {
        Envelope {
            sender,
            timestamp,
            kind: EnvelopeKind::Dedicated { receiver, payload },
        }
    }

    pub fn token(sender: ProcessId, token: Token) -> Self {
        Envelope {
            sender,
            timestamp: UNSTAMPED,
            kind: EnvelopeKind::Token(token),
        }
    }

    pub fn barrier(sender: ProcessId, phase: BarrierPhase) -> Self {
        Envelope {
            sender,
            timestamp: UNSTAMPED,
            kind: EnvelopeKind::Barrier(phase),
        }
    }

    /// Token and barrier envelopes belong to the control plane
    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(self.kind, EnvelopeKind::Token(_) | EnvelopeKind::Barrier(_))
    }

    #[inline]
    pub fn is_stamped(&self) -> bool {
        self.timestamp != UNSTAMPED
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            EnvelopeKind::Broadcast { .. } => "broadcast",
            EnvelopeKind::Dedicated { .. } => "dedicated",
            EnvelopeKind::Token(_) => "token",
            EnvelopeKind::Barrier(_) => "barrier",
        }
    }

    /// Convert an application envelope into a mailbox message.
    /// Control envelopes yield `None`.
    pub fn into_message(self) -> Option<Message<T>> {
        let (receiver, payload) = match self.kind {
            EnvelopeKind::Broadcast { payload } => (None, payload),
            EnvelopeKind::Dedicated { receiver, payload } => (Some(receiver), payload),
            EnvelopeKind::Token(_) | EnvelopeKind::Barrier(_) => return None,
        };
        Some(Message {
            sender: self.sender,
            receiver,
            timestamp: self.timestamp,
            payload,
        })
    }
}

/// Application message accepted into a mailbox
#[derive(Clone, Debug, PartialEq)]
pub struct Message<T> {
    pub sender: ProcessId,
    /// `None` for broadcasts
    pub receiver: Option<ProcessId>,
    pub timestamp: u64,
    pub payload: T,
}

impl<T> Message<T> {
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.receiver.is_none()
    }

    #[inline]
    pub fn is_from(&self, sender: ProcessId) -> bool {
        self.sender == sender
    }
}
