//! Observation tools
//!
//! [`TraceRecorder`] subscribes to the bus like any process and records
//! every control envelope it sees. [`CriticalSectionProbe`] is entered by
//! application code inside its critical section and counts overlaps.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use dcp_core::{Envelope, EnvelopeKind, ProcessId};
use dcp_transport::Subscriber;

/// One token hand-off as published on the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenHop {
    pub from: ProcessId,
    pub to: ProcessId,
}

#[derive(Default)]
struct Observed {
    hops: Vec<TokenHop>,
    barrier_arrivals: HashMap<ProcessId, usize>,
    application: usize,
}

/// Bus observer
#[derive(Default)]
pub struct TraceRecorder {
    observed: Mutex<Observed>,
    changed: Condvar,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All token hops so far, in publication order
    pub fn hops(&self) -> Vec<TokenHop> {
        self.observed.lock().hops.clone()
    }

    pub fn hop_count(&self) -> usize {
        self.observed.lock().hops.len()
    }

    /// Sequence of processes the token was addressed to
    pub fn holders(&self) -> Vec<ProcessId> {
        self.observed.lock().hops.iter().map(|h| h.to).collect()
    }

    pub fn barrier_arrivals(&self, sender: ProcessId) -> usize {
        self.observed
            .lock()
            .barrier_arrivals
            .get(&sender)
            .copied()
            .unwrap_or(0)
    }

    pub fn application_envelopes(&self) -> usize {
        self.observed.lock().application
    }

    /// Wait until at least `count` hops were seen and return the first `count`.
    /// `None` on timeout.
    pub fn wait_for_hops(&self, count: usize, timeout: Duration) -> Option<Vec<TokenHop>> {
        let deadline = Instant::now() + timeout;
        let mut observed = self.observed.lock();
        while observed.hops.len() < count {
            if self.changed.wait_until(&mut observed, deadline).timed_out() {
                return None;
            }
        }
        Some(observed.hops[..count].to_vec())
    }
}

impl<T> Subscriber<T> for TraceRecorder {
    fn deliver(&self, envelope: Envelope<T>) {
        let mut observed = self.observed.lock();
        match envelope.kind {
            EnvelopeKind::Token(token) => observed.hops.push(TokenHop {
                from: envelope.sender,
                to: token.holder,
            }),
            EnvelopeKind::Barrier(_) => {
                *observed
                    .barrier_arrivals
                    .entry(envelope.sender)
                    .or_insert(0) += 1;
            }
            EnvelopeKind::Broadcast { .. } | EnvelopeKind::Dedicated { .. } => {
                observed.application += 1;
            }
        }
        self.changed.notify_all();
    }
}

#[derive(Default)]
struct Occupancy {
    holder: Option<ProcessId>,
    entries: Vec<ProcessId>,
    violations: usize,
}

/// Shared detector for overlapping critical sections
#[derive(Default)]
pub struct CriticalSectionProbe {
    occupancy: Mutex<Occupancy>,
}

/// Marks the critical section as occupied until dropped
pub struct ProbeGuard<'a> {
    probe: &'a CriticalSectionProbe,
    id: ProcessId,
}

impl CriticalSectionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self, id: ProcessId) -> ProbeGuard<'_> {
        let mut occupancy = self.occupancy.lock();
        if occupancy.holder.is_some() {
            occupancy.violations += 1;
        }
        occupancy.holder = Some(id);
        occupancy.entries.push(id);
        ProbeGuard { probe: self, id }
    }

    /// Number of times a process entered while another was inside
    pub fn violations(&self) -> usize {
        self.occupancy.lock().violations
    }

    /// Entry order across all processes
    pub fn entries(&self) -> Vec<ProcessId> {
        self.occupancy.lock().entries.clone()
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        let mut occupancy = self.probe.occupancy.lock();
        if occupancy.holder == Some(self.id) {
            occupancy.holder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_core::{BarrierPhase, Token};

    #[test]
    fn test_recorder_classifies_envelopes() {
        let recorder = TraceRecorder::new();
        let deliver = |e: Envelope<u8>| Subscriber::<u8>::deliver(&recorder, e);

        deliver(Envelope::token(ProcessId(2), Token::new(ProcessId(0))));
        deliver(Envelope::barrier(ProcessId(1), BarrierPhase::Request));
        deliver(Envelope::broadcast(ProcessId(0), 1, 7));

        assert_eq!(
            recorder.hops(),
            vec![TokenHop {
                from: ProcessId(2),
                to: ProcessId(0)
            }]
        );
        assert_eq!(recorder.barrier_arrivals(ProcessId(1)), 1);
        assert_eq!(recorder.barrier_arrivals(ProcessId(0)), 0);
        assert_eq!(recorder.application_envelopes(), 1);
    }

    #[test]
    fn test_wait_for_hops_times_out() {
        let recorder = TraceRecorder::new();
        assert!(recorder
            .wait_for_hops(1, Duration::from_millis(10))
            .is_none());
    }

    #[test]
    fn test_probe_counts_overlap() {
        let probe = CriticalSectionProbe::new();
        {
            let _a = probe.enter(ProcessId(0));
        }
        assert_eq!(probe.violations(), 0);

        let _a = probe.enter(ProcessId(0));
        let _b = probe.enter(ProcessId(1));
        assert_eq!(probe.violations(), 1);
        assert_eq!(
            probe.entries(),
            vec![ProcessId(0), ProcessId(0), ProcessId(1)]
        );
    }
}
