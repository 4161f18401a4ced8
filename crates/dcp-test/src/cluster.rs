//! Multi-process cluster on a single in-process bus

use std::sync::Arc;
use std::time::Duration;

use dcp_core::{DcpResult, ProcessId};
use dcp_runtime::{Coordinator, CoordinatorConfig, Process, ProcessContext};
use dcp_transport::{LocalBus, Transport};

use crate::TraceRecorder;

/// `N` coordinators sharing one bus, plus a recorder observing it
pub struct Cluster<T: Clone + Send + 'static> {
    bus: Arc<LocalBus<T>>,
    coordinators: Vec<Arc<Coordinator<T>>>,
    recorder: Arc<TraceRecorder>,
}

impl<T: Clone + Send + 'static> Cluster<T> {
    pub fn new(size: usize) -> DcpResult<Self> {
        Self::with_config(CoordinatorConfig::with_processes(size))
    }

    pub fn with_config(config: CoordinatorConfig) -> DcpResult<Self> {
        config.validate()?;
        let bus = LocalBus::shared();

        // Subscribe the recorder first so it observes the seed token too
        let recorder = Arc::new(TraceRecorder::new());
        bus.subscribe(recorder.clone())?;

        let coordinators = (0..config.max_processes as u32)
            .map(|i| Coordinator::<T>::new(ProcessId(i), config.clone(), bus.clone()))
            .collect::<DcpResult<Vec<_>>>()?;

        Ok(Cluster {
            bus,
            coordinators,
            recorder,
        })
    }

    pub fn size(&self) -> usize {
        self.coordinators.len()
    }

    /// Coordinator of process `P<id>`
    ///
    /// # Panics
    /// Panics if `id` is outside the cluster.
    pub fn process(&self, id: u32) -> &Arc<Coordinator<T>> {
        &self.coordinators[id as usize]
    }

    pub fn coordinators(&self) -> &[Arc<Coordinator<T>>] {
        &self.coordinators
    }

    pub fn recorder(&self) -> &TraceRecorder {
        &self.recorder
    }

    pub fn bus(&self) -> &Arc<LocalBus<T>> {
        &self.bus
    }

    /// Run `body` as the application loop of every process
    pub fn spawn_all<F>(&self, body: F) -> DcpResult<Vec<Process<T>>>
    where
        F: Fn(ProcessContext<T>) -> DcpResult<()> + Clone + Send + 'static,
    {
        self.coordinators
            .iter()
            .map(|c| Process::spawn(Arc::clone(c), body.clone()))
            .collect()
    }

    /// Stop every coordinator and close the bus
    pub fn shutdown(&self) {
        for coordinator in &self.coordinators {
            coordinator.shutdown();
        }
        self.bus.close();
    }
}

impl<T: Clone + Send + 'static> Drop for Cluster<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cluster builder
pub struct ClusterBuilder {
    processes: usize,
    hop_delay: Option<Duration>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        ClusterBuilder {
            processes: 3,
            hop_delay: None,
        }
    }

    /// Set the number of processes
    pub fn with_processes(mut self, count: usize) -> Self {
        self.processes = count;
        self
    }

    /// Pause idle token hops
    pub fn with_hop_delay(mut self, delay: Duration) -> Self {
        self.hop_delay = Some(delay);
        self
    }

    pub fn config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_processes: self.processes,
            hop_delay: self.hop_delay,
        }
    }

    pub fn build<T: Clone + Send + 'static>(self) -> DcpResult<Cluster<T>> {
        Cluster::with_config(self.config())
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_wires_every_process() {
        let cluster: Cluster<u32> = ClusterBuilder::new().with_processes(4).build().unwrap();

        assert_eq!(cluster.size(), 4);
        // four coordinators plus the recorder
        assert_eq!(cluster.bus().subscriber_count(), 5);
        for (i, c) in cluster.coordinators().iter().enumerate() {
            assert_eq!(c.id(), ProcessId(i as u32));
            assert!(c.is_attached());
        }
    }

    #[test]
    fn test_builder_config() {
        let config = ClusterBuilder::new()
            .with_processes(5)
            .with_hop_delay(Duration::from_millis(3))
            .config();
        assert_eq!(config.max_processes, 5);
        assert_eq!(config.hop_delay, Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_empty_cluster_rejected() {
        assert!(Cluster::<u32>::new(0).is_err());
    }
}
