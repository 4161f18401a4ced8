//! Launcher demo
//!
//! Starts N processes on one in-process bus. Every loop each process
//! broadcasts a line, meets the others at the barrier, takes a turn in the
//! critical section and drains its mailbox. After `run_for` every process is
//! stopped and joined.
//!
//! Usage: dcp-launcher [processes] [run_for_ms] [loop_interval_ms] [token_seed]

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dcp_core::{DcpError, DcpResult, ProcessId};
use dcp_runtime::{Coordinator, CoordinatorConfig, Process, ProcessContext};
use dcp_transport::LocalBus;

/// Demo settings
#[derive(Clone, Debug)]
struct LauncherConfig {
    processes: usize,
    run_for: Duration,
    loop_interval: Duration,
    /// Process that creates the token; the last one when unset
    token_seed: Option<ProcessId>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            processes: 3,
            run_for: Duration::from_secs(2),
            loop_interval: Duration::from_millis(500),
            token_seed: None,
        }
    }
}

impl LauncherConfig {
    /// Parse positional arguments; missing ones keep their default
    fn from_args(args: &[String]) -> DcpResult<Self> {
        let mut config = Self::default();

        if let Some(arg) = args.first() {
            config.processes = parse(arg, "processes")?;
        }
        if let Some(arg) = args.get(1) {
            config.run_for = Duration::from_millis(parse(arg, "run_for_ms")?);
        }
        if let Some(arg) = args.get(2) {
            config.loop_interval = Duration::from_millis(parse(arg, "loop_interval_ms")?);
        }
        if let Some(arg) = args.get(3) {
            let seed = ProcessId::from_name(arg)
                .or_else(|| arg.parse().ok().map(ProcessId))
                .ok_or_else(|| DcpError::InvalidConfig(format!("token_seed: {arg:?}")))?;
            config.token_seed = Some(seed);
        }

        Ok(config)
    }

    fn seed(&self) -> ProcessId {
        self.token_seed
            .unwrap_or(ProcessId(self.processes.saturating_sub(1) as u32))
    }

    fn coordinator_config(&self) -> CoordinatorConfig {
        // Idle token hops are paced well below the loop interval
        let hop_delay = (self.loop_interval / 50).max(Duration::from_millis(1));
        CoordinatorConfig::paced(self.processes, hop_delay)
    }
}

fn parse<N: std::str::FromStr>(arg: &str, name: &str) -> DcpResult<N> {
    arg.parse()
        .map_err(|_| DcpError::InvalidConfig(format!("{name}: {arg:?}")))
}

/// Application loop of one process
fn run(ctx: ProcessContext<String>, loop_interval: Duration) -> DcpResult<()> {
    let coordinator = ctx.coordinator();
    let id = coordinator.id();
    let mut rng = rand::thread_rng();
    let mut round = 0u64;

    while ctx.is_alive() {
        thread::sleep(loop_interval);
        info!(process = %id, round, "loop");

        coordinator.broadcast(format!("{id} says hello in round {round}"), false)?;
        coordinator.synchronize()?;

        coordinator.request_critical_section()?;
        let hold = rng.gen_range(0..=loop_interval.as_millis() as u64 / 10);
        info!(process = %id, hold_ms = hold, "working in critical section");
        thread::sleep(Duration::from_millis(hold));
        coordinator.release_critical_section()?;

        loop {
            match coordinator.try_receive() {
                Ok(message) => info!(
                    process = %id,
                    from = %message.sender,
                    timestamp = message.timestamp,
                    payload = %message.payload,
                    "read message"
                ),
                Err(DcpError::Empty) => break,
                Err(e) => return Err(e),
            }
        }
        round += 1;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = LauncherConfig::from_args(&args)?;
    let coordinator_config = config.coordinator_config();
    coordinator_config.validate()?;

    info!(
        processes = config.processes,
        run_for_ms = config.run_for.as_millis() as u64,
        seed = %config.seed(),
        "launching"
    );

    let bus = LocalBus::<String>::shared();
    let mut processes = Vec::with_capacity(config.processes);
    for i in 0..config.processes as u32 {
        let coordinator =
            Coordinator::<String>::new(ProcessId(i), coordinator_config.clone(), bus.clone())?;
        let interval = config.loop_interval;
        processes.push(Process::spawn(coordinator, move |ctx| run(ctx, interval))?);
    }

    let seed = processes
        .iter()
        .find(|p| p.id() == config.seed())
        .ok_or(DcpError::UnknownProcess(config.seed()))?;
    seed.coordinator().initialize_token()?;

    thread::sleep(config.run_for);

    for process in &processes {
        process.stop();
    }
    for process in &processes {
        if let Err(e) = process.wait_stopped() {
            warn!(process = %process.id(), error = %e, "process ended with an error");
        }
    }

    let stats = bus.stats();
    bus.close();
    info!(
        published = stats.published,
        enqueued = stats.enqueued,
        "all processes stopped"
    );
    Ok(())
}
