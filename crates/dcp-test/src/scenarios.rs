//! End-to-end scenarios
//!
//! Multi-process runs over the in-process bus:
//! - Token circulation and hand-off
//! - Barrier rounds with late arrivals
//! - Mutual exclusion under contention
//! - Mixed workload

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dcp_core::{DcpError, DcpResult, ProcessId};

use crate::{
    run_workload, ClusterBuilder, CriticalSectionProbe, Greeting, WorkloadConfig, WorkloadReport,
};

/// How long a scenario waits for the bus before giving up
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between idle token hops inside scenarios
pub const SCENARIO_HOP_DELAY: Duration = Duration::from_millis(1);

// ============================================================================
// TOKEN CIRCULATION
// ============================================================================

/// Seed the token at `start` in an idle ring of `size` and return the first
/// `hops` holders it is addressed to.
pub fn token_circulation(size: usize, start: u32, hops: usize) -> DcpResult<Vec<ProcessId>> {
    let cluster = ClusterBuilder::new()
        .with_processes(size)
        .with_hop_delay(SCENARIO_HOP_DELAY)
        .build::<u32>()?;

    cluster.process(start).initialize_token()?;
    let observed = cluster
        .recorder()
        .wait_for_hops(hops, SCENARIO_TIMEOUT)
        .ok_or_else(|| DcpError::ProtocolMisuse("token stopped circulating".into()))?;
    Ok(observed.into_iter().map(|hop| hop.to).collect())
}

// ============================================================================
// MUTUAL EXCLUSION
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentionReport {
    pub entries: usize,
    pub violations: usize,
}

/// Every process of a `size` ring enters the critical section `turns` times
pub fn contention(size: usize, turns: usize) -> DcpResult<ContentionReport> {
    let cluster = ClusterBuilder::new()
        .with_processes(size)
        .with_hop_delay(SCENARIO_HOP_DELAY)
        .build::<u32>()?;
    let probe = Arc::new(CriticalSectionProbe::new());

    let processes = {
        let probe = Arc::clone(&probe);
        cluster.spawn_all(move |ctx| {
            let coordinator = ctx.coordinator();
            for _ in 0..turns {
                coordinator.request_critical_section()?;
                {
                    let _inside = probe.enter(coordinator.id());
                    thread::yield_now();
                }
                coordinator.release_critical_section()?;
            }
            Ok(())
        })?
    };
    cluster.process(0).initialize_token()?;

    for process in &processes {
        process.wait_stopped()?;
    }

    Ok(ContentionReport {
        entries: probe.entries().len(),
        violations: probe.violations(),
    })
}

// ============================================================================
// WORKLOAD
// ============================================================================

/// Run the mixed workload on every process of a `size` ring
pub fn workload(size: usize, config: WorkloadConfig) -> DcpResult<Vec<WorkloadReport>> {
    let cluster = ClusterBuilder::new()
        .with_processes(size)
        .with_hop_delay(SCENARIO_HOP_DELAY)
        .build::<Greeting>()?;
    let probe = Arc::new(CriticalSectionProbe::new());

    let workers: Vec<_> = cluster
        .coordinators()
        .iter()
        .map(|coordinator| {
            let coordinator = Arc::clone(coordinator);
            let probe = Arc::clone(&probe);
            let config = config.clone();
            thread::spawn(move || run_workload(&coordinator, &probe, &config))
        })
        .collect();

    let last = u32::try_from(size - 1).map_err(|e| DcpError::InvalidConfig(e.to_string()))?;
    cluster.process(last).initialize_token()?;

    let mut reports = Vec::with_capacity(size);
    for (i, worker) in workers.into_iter().enumerate() {
        let report = worker
            .join()
            .map_err(|_| DcpError::ProcessPanicked(ProcessId(i as u32)))??;
        reports.push(report);
    }
    if probe.violations() > 0 {
        return Err(DcpError::ProtocolMisuse(format!(
            "{} overlapping critical sections",
            probe.violations()
        )));
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cluster, TokenHop};
    use dcp_core::{Ring, TokenState};
    use std::sync::mpsc;
    use std::time::Instant;

    fn paced_cluster<T: Clone + Send + 'static>(size: usize) -> Cluster<T> {
        ClusterBuilder::new()
            .with_processes(size)
            .with_hop_delay(SCENARIO_HOP_DELAY)
            .build()
            .unwrap()
    }

    fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + SCENARIO_TIMEOUT;
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_token_visits_ring_in_order() {
        let holders = token_circulation(3, 2, 7).unwrap();
        let expected: Vec<_> = [0, 1, 2, 0, 1, 2, 0].into_iter().map(ProcessId).collect();
        assert_eq!(holders, expected);
    }

    #[test]
    fn test_idle_token_grants_nothing() {
        let cluster: Cluster<u32> = paced_cluster(3);
        cluster.process(2).initialize_token().unwrap();
        let hops = cluster
            .recorder()
            .wait_for_hops(9, SCENARIO_TIMEOUT)
            .unwrap();
        assert_eq!(hops[0].to, ProcessId(0));

        for p in cluster.coordinators() {
            assert_eq!(p.token_state(), TokenState::Idle);
            assert_eq!(p.stats().critical_sections, 0);
            assert!(p.stats().tokens_forwarded >= 2);
        }
    }

    #[test]
    fn test_token_walk_every_size_and_start() {
        for size in 2..=5usize {
            let ring = Ring::new(size).unwrap();
            for start in 0..size as u32 {
                let holders = token_circulation(size, start, 2 * size).unwrap();
                let expected: Vec<_> = ring
                    .walk_from(ring.next(ProcessId(start)))
                    .take(2 * size)
                    .collect();
                assert_eq!(holders, expected, "size {size}, seeded at P{start}");
            }
        }
    }

    #[test]
    fn test_token_held_until_release() {
        let cluster: Cluster<u32> = paced_cluster(3);
        let requester = {
            let p1 = Arc::clone(cluster.process(1));
            thread::spawn(move || p1.request_critical_section())
        };
        wait_until("P1 to request", || {
            cluster.process(1).token_state() == TokenState::Requesting
        });

        cluster.process(2).initialize_token().unwrap();
        requester.join().unwrap().unwrap();
        assert_eq!(
            cluster.process(1).token_state(),
            TokenState::InCriticalSection
        );

        // P2 -> P0 -> P1, then nothing while P1 is inside
        let held = 2;
        assert!(cluster
            .recorder()
            .wait_for_hops(held, SCENARIO_TIMEOUT)
            .is_some());
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cluster.recorder().hop_count(), held);

        cluster.process(1).release_critical_section().unwrap();
        let hops = cluster
            .recorder()
            .wait_for_hops(held + 1, SCENARIO_TIMEOUT)
            .unwrap();
        assert_eq!(
            hops[held],
            TokenHop {
                from: ProcessId(1),
                to: ProcessId(2)
            }
        );
    }

    #[test]
    fn test_broadcast_timestamp_and_mailboxes() {
        let cluster: Cluster<&'static str> = paced_cluster(3);
        let p0 = cluster.process(0);
        for _ in 0..3 {
            p0.tick_clock();
        }

        p0.broadcast("hello", false).unwrap();

        for id in [1, 2] {
            let msg = cluster.process(id).receive().unwrap();
            assert_eq!(msg.payload, "hello");
            assert_eq!(msg.timestamp, 4);
            assert_eq!(msg.sender, ProcessId(0));
        }
        wait_until("P0 to drop its own copy", || p0.stats().discarded == 1);
        assert!(p0.mailbox().is_empty());
    }

    #[test]
    fn test_barrier_waits_for_latecomer() {
        let cluster: Cluster<u32> = paced_cluster(3);
        let (done_tx, done_rx) = mpsc::channel();

        let early: Vec<_> = [0, 1]
            .into_iter()
            .map(|id| {
                let p = Arc::clone(cluster.process(id));
                let done = done_tx.clone();
                thread::spawn(move || {
                    let result = p.synchronize();
                    done.send(id).unwrap();
                    result
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert!(done_rx.try_recv().is_err(), "returned before P2 arrived");

        cluster.process(2).synchronize().unwrap();
        for handle in early {
            handle.join().unwrap().unwrap();
        }
        for p in cluster.coordinators() {
            assert!(p.pending_arrivals().is_empty());
        }
        assert_eq!(cluster.recorder().barrier_arrivals(ProcessId(2)), 1);
    }

    #[test]
    fn test_repeated_barrier_rounds() {
        let cluster: Cluster<u32> = paced_cluster(4);
        let rounds = 10;

        let handles: Vec<_> = cluster
            .coordinators()
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                thread::spawn(move || {
                    for _ in 0..rounds {
                        p.synchronize()?;
                    }
                    Ok::<_, DcpError>(())
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        for p in cluster.coordinators() {
            assert_eq!(p.stats().barrier_rounds, rounds);
            assert!(p.pending_arrivals().is_empty());
        }
    }

    #[test]
    fn test_broadcast_sync_delivers_before_return() {
        let cluster: Cluster<&'static str> = paced_cluster(3);

        let handles: Vec<_> = cluster
            .coordinators()
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                thread::spawn(move || p.broadcast_sync("news", ProcessId(1)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        for id in [0, 2] {
            let msg = cluster.process(id).try_receive().unwrap();
            assert_eq!(msg.payload, "news");
            assert_eq!(msg.sender, ProcessId(1));
        }
        assert_eq!(cluster.process(1).try_receive(), Err(DcpError::Empty));
    }

    #[test]
    fn test_send_to_sync_delivers_before_return() {
        let cluster: Cluster<&'static str> = paced_cluster(3);

        let sender = {
            let p0 = Arc::clone(cluster.process(0));
            thread::spawn(move || p0.send_to_sync("direct", ProcessId(2)))
        };
        let others: Vec<_> = [1, 2]
            .into_iter()
            .map(|id| {
                let p = Arc::clone(cluster.process(id));
                thread::spawn(move || p.synchronize())
            })
            .collect();

        sender.join().unwrap().unwrap();
        for handle in others {
            handle.join().unwrap().unwrap();
        }

        let msg = cluster.process(2).try_receive().unwrap();
        assert_eq!(msg.payload, "direct");
        assert_eq!(msg.receiver, Some(ProcessId(2)));
        assert!(cluster.process(1).mailbox().is_empty());
    }

    #[test]
    fn test_ping_pong_is_causal() {
        let cluster: Cluster<&'static str> = paced_cluster(2);

        let responder = {
            let p1 = Arc::clone(cluster.process(1));
            thread::spawn(move || {
                let ping = p1.receive_from(ProcessId(0))?;
                p1.send_to(ProcessId(0), "pong", false)?;
                Ok::<_, DcpError>(ping)
            })
        };

        let p0 = cluster.process(0);
        p0.send_to(ProcessId(1), "ping", false).unwrap();
        let pong = p0.receive_from(ProcessId(1)).unwrap();
        let ping = responder.join().unwrap().unwrap();

        assert_eq!(ping.payload, "ping");
        assert_eq!(pong.payload, "pong");
        assert!(ping.timestamp < pong.timestamp);
        assert!(pong.timestamp < p0.clock());
    }

    #[test]
    fn test_mutual_exclusion_under_contention() {
        let report = contention(4, 15).unwrap();
        assert_eq!(report.entries, 60);
        assert_eq!(report.violations, 0);
    }

    #[test]
    fn test_workload_completes() {
        let config = WorkloadConfig {
            rounds: 4,
            max_hold: Duration::from_millis(2),
            seed: 7,
        };
        let reports = workload(3, config).unwrap();

        assert_eq!(reports.len(), 3);
        for report in reports {
            assert_eq!(report.rounds, 4);
            assert_eq!(report.critical_sections, 4);
            assert_eq!(report.greetings_received, 8);
            assert_eq!(report.causality_violations, 0);
        }
    }
}
