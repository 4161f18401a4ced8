//! Mixed workload driver
//!
//! Each round a process broadcasts a greeting, meets every other process at
//! the barrier, collects the round's greetings, then takes one turn in the
//! critical section.

use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dcp_core::{DcpResult, ProcessId};
use dcp_runtime::Coordinator;

use crate::CriticalSectionProbe;

/// Payload exchanged by the workload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Greeting {
    pub from: ProcessId,
    pub round: usize,
}

#[derive(Clone, Debug)]
pub struct WorkloadConfig {
    pub rounds: usize,
    /// Upper bound of the random time spent inside the critical section
    pub max_hold: Duration,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            rounds: 5,
            max_hold: Duration::from_millis(5),
            seed: 0x5EED,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadReport {
    pub rounds: usize,
    pub greetings_received: usize,
    pub critical_sections: usize,
    /// Greetings whose timestamp was not below the receiver's clock
    pub causality_violations: usize,
}

/// Drive one process through `config.rounds` rounds
pub fn run_workload(
    coordinator: &Coordinator<Greeting>,
    probe: &CriticalSectionProbe,
    config: &WorkloadConfig,
) -> DcpResult<WorkloadReport> {
    let id = coordinator.id();
    let peers = coordinator.ring().size() - 1;
    let mut rng = StdRng::seed_from_u64(config.seed ^ u64::from(id.0));
    let mut report = WorkloadReport::default();

    for round in 0..config.rounds {
        coordinator.broadcast(Greeting { from: id, round }, false)?;
        coordinator.synchronize()?;

        // A peer may already be broadcasting for the next round, so only
        // take this round's greetings.
        for _ in 0..peers {
            let message = coordinator
                .mailbox()
                .take_first_matching(|m| m.payload.round == round)?;
            if message.timestamp >= coordinator.clock() {
                report.causality_violations += 1;
            }
            report.greetings_received += 1;
        }

        coordinator.request_critical_section()?;
        {
            let _inside = probe.enter(id);
            let max_micros = config.max_hold.as_micros() as u64;
            if max_micros > 0 {
                thread::sleep(Duration::from_micros(rng.gen_range(0..max_micros)));
            }
        }
        coordinator.release_critical_section()?;
        report.critical_sections += 1;
        report.rounds += 1;
    }

    Ok(report)
}
