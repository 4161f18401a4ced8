//! Process identity
//!
//! Processes are numbered densely in creation order, `0..N`, and the
//! numbering never changes for the lifetime of a system.

use std::fmt;

/// Process identity - index in creation order
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProcessId(pub u32);

impl ProcessId {
    #[inline]
    pub fn new(id: u32) -> Self {
        ProcessId(id)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Human-readable process name, `P<id>`
    pub fn name(self) -> String {
        format!("P{}", self.0)
    }

    /// Parse a name produced by [`ProcessId::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        let digits = name.strip_prefix('P').or_else(|| name.strip_prefix('p'))?;
        digits.parse().ok().map(ProcessId)
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process(P{})", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}
