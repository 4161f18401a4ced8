//! Per-process inbox of accepted application messages

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use dcp_core::{DcpError, DcpResult, Message, ProcessId};

struct Inbox<T> {
    messages: VecDeque<Message<T>>,
    closed: bool,
}

/// FIFO mailbox
///
/// Appended to by the delivery callback, drained by the owning process.
/// Blocking retrievals wake on every append and return
/// [`DcpError::Interrupted`] once the mailbox is closed.
pub struct Mailbox<T> {
    inbox: Mutex<Inbox<T>>,
    arrived: Condvar,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Mailbox {
            inbox: Mutex::new(Inbox {
                messages: VecDeque::new(),
                closed: false,
            }),
            arrived: Condvar::new(),
        }
    }

    /// Append in arrival order and wake blocked readers
    pub fn push(&self, message: Message<T>) {
        self.inbox.lock().messages.push_back(message);
        self.arrived.notify_all();
    }

    /// Remove the oldest message without blocking
    pub fn try_take_first(&self) -> DcpResult<Message<T>> {
        self.inbox.lock().messages.pop_front().ok_or(DcpError::Empty)
    }

    /// Remove the oldest message, blocking until one exists
    pub fn take_first(&self) -> DcpResult<Message<T>> {
        self.take_first_matching(|_| true)
    }

    /// Remove the oldest message from `sender`, blocking until one exists.
    /// Other pending messages keep their order.
    pub fn take_first_from(&self, sender: ProcessId) -> DcpResult<Message<T>> {
        self.take_first_matching(|m| m.is_from(sender))
    }

    /// Remove the oldest message satisfying `predicate`, blocking until one exists
    pub fn take_first_matching<P>(&self, mut predicate: P) -> DcpResult<Message<T>>
    where
        P: FnMut(&Message<T>) -> bool,
    {
        let mut inbox = self.inbox.lock();
        loop {
            if let Some(pos) = inbox.messages.iter().position(&mut predicate) {
                if let Some(message) = inbox.messages.remove(pos) {
                    return Ok(message);
                }
            }
            if inbox.closed {
                return Err(DcpError::Interrupted);
            }
            self.arrived.wait(&mut inbox);
        }
    }

    /// Remove the oldest message satisfying `predicate` without blocking
    pub fn remove_where<P>(&self, predicate: P) -> Option<Message<T>>
    where
        P: FnMut(&Message<T>) -> bool,
    {
        let mut inbox = self.inbox.lock();
        let pos = inbox.messages.iter().position(predicate)?;
        inbox.messages.remove(pos)
    }

    pub fn remove_at(&self, index: usize) -> Option<Message<T>> {
        self.inbox.lock().messages.remove(index)
    }

    pub fn is_empty(&self) -> bool {
        self.inbox.lock().messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inbox.lock().messages.len()
    }

    /// Release every blocked reader with `Interrupted`.
    /// Pending messages stay retrievable.
    pub fn close(&self) {
        self.inbox.lock().closed = true;
        self.arrived.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.lock().closed
    }
}

impl<T: Clone> Mailbox<T> {
    /// Copy of all pending messages, oldest first
    pub fn snapshot(&self) -> Vec<Message<T>> {
        self.inbox.lock().messages.iter().cloned().collect()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
