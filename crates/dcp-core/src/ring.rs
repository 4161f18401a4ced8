//! Ring topology for token circulation
//!
//! The ring is fixed at construction: `next(id) = (id + 1) mod N`.
//! Membership never changes at runtime.

use crate::{DcpError, DcpResult, ProcessId};

/// Fixed-size logical ring of processes `P0..P(N-1)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ring {
    size: u32,
}

impl Ring {
    /// Create a ring of `size` processes
    pub fn new(size: usize) -> DcpResult<Self> {
        if size == 0 {
            return Err(DcpError::InvalidConfig(
                "ring needs at least one process".into(),
            ));
        }
        let size = u32::try_from(size)
            .map_err(|_| DcpError::InvalidConfig(format!("ring size {size} too large")))?;
        Ok(Ring { size })
    }

    /// Number of processes in the ring
    #[inline]
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Successor of `id` in token order
    #[inline]
    pub fn next(&self, id: ProcessId) -> ProcessId {
        ProcessId(((u64::from(id.0) + 1) % u64::from(self.size)) as u32)
    }

    #[inline]
    pub fn contains(&self, id: ProcessId) -> bool {
        id.0 < self.size
    }

    /// All members in id order
    pub fn members(&self) -> impl Iterator<Item = ProcessId> {
        (0..self.size).map(ProcessId)
    }

    /// All members except `id`
    pub fn peers_of(&self, id: ProcessId) -> impl Iterator<Item = ProcessId> {
        self.members().filter(move |p| *p != id)
    }

    /// Endless walk of the ring starting at `start`
    pub fn walk_from(&self, start: ProcessId) -> impl Iterator<Item = ProcessId> {
        let ring = *self;
        std::iter::successors(Some(start), move |id| Some(ring.next(*id)))
    }
}
