//! Barrier wait-set
//!
//! Arrivals are counted per peer. A round completes once every peer has at
//! least one arrival recorded; completing consumes exactly one arrival per
//! peer, so a fast peer's arrival for the next round survives the reset.

use std::collections::BTreeMap;

use parking_lot::{Condvar, Mutex};

use dcp_core::{DcpError, DcpResult, ProcessId, Ring};

struct Arrivals {
    counts: BTreeMap<ProcessId, u32>,
    interrupted: bool,
}

pub(crate) struct WaitSet {
    ring: Ring,
    owner: ProcessId,
    arrivals: Mutex<Arrivals>,
    complete: Condvar,
}

impl Arrivals {
    fn round_complete(&self, ring: &Ring, owner: ProcessId) -> bool {
        ring.peers_of(owner)
            .all(|peer| self.counts.get(&peer).copied().unwrap_or(0) > 0)
    }

    fn consume_round(&mut self, ring: &Ring, owner: ProcessId) {
        for peer in ring.peers_of(owner) {
            if let Some(count) = self.counts.get_mut(&peer) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&peer);
                }
            }
        }
    }
}

impl WaitSet {
    pub(crate) fn new(ring: Ring, owner: ProcessId) -> Self {
        WaitSet {
            ring,
            owner,
            arrivals: Mutex::new(Arrivals {
                counts: BTreeMap::new(),
                interrupted: false,
            }),
            complete: Condvar::new(),
        }
    }

    /// Record an arrival from `peer`. Returns `true` when this arrival
    /// completed the round.
    pub(crate) fn arrive(&self, peer: ProcessId) -> bool {
        if peer == self.owner || !self.ring.contains(peer) {
            return false;
        }
        let mut arrivals = self.arrivals.lock();
        *arrivals.counts.entry(peer).or_insert(0) += 1;

        let complete = arrivals.round_complete(&self.ring, self.owner);
        if complete {
            self.complete.notify_all();
        }
        complete
    }

    /// Block until every peer has arrived, then consume one round
    pub(crate) fn wait_round(&self) -> DcpResult<()> {
        let mut arrivals = self.arrivals.lock();
        loop {
            if arrivals.round_complete(&self.ring, self.owner) {
                arrivals.consume_round(&self.ring, self.owner);
                return Ok(());
            }
            if arrivals.interrupted {
                return Err(DcpError::Interrupted);
            }
            self.complete.wait(&mut arrivals);
        }
    }

    /// Peers with an arrival recorded but not yet consumed
    pub(crate) fn pending(&self) -> Vec<ProcessId> {
        let arrivals = self.arrivals.lock();
        arrivals
            .counts
            .iter()
            .flat_map(|(peer, count)| std::iter::repeat(*peer).take(*count as usize))
            .collect()
    }

    pub(crate) fn interrupt(&self) {
        self.arrivals.lock().interrupted = true;
        self.complete.notify_all();
    }
}
