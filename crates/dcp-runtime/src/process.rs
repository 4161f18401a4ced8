//! Process lifecycle host
//!
//! Runs a process's application loop on its own named thread and stops it
//! by interrupting every blocking wait of its coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{error, info};

use dcp_core::{DcpError, DcpResult, ProcessId};

use crate::Coordinator;

/// View of a running process handed to its application loop
pub struct ProcessContext<T> {
    coordinator: Arc<Coordinator<T>>,
    alive: Arc<AtomicBool>,
}

impl<T> ProcessContext<T> {
    pub fn coordinator(&self) -> &Coordinator<T> {
        &self.coordinator
    }

    /// `false` once [`Process::stop`] was called
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// A running process
pub struct Process<T> {
    id: ProcessId,
    coordinator: Arc<Coordinator<T>>,
    alive: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<DcpResult<()>>>>,
}

impl<T: Send + 'static> Process<T> {
    /// Start `body` on a thread named after the process
    pub fn spawn<F>(coordinator: Arc<Coordinator<T>>, body: F) -> DcpResult<Self>
    where
        F: FnOnce(ProcessContext<T>) -> DcpResult<()> + Send + 'static,
    {
        let id = coordinator.id();
        let alive = Arc::new(AtomicBool::new(true));
        let context = ProcessContext {
            coordinator: Arc::clone(&coordinator),
            alive: Arc::clone(&alive),
        };

        let handle = thread::Builder::new()
            .name(id.name())
            .spawn(move || {
                info!(process = %id, "started");
                let result = match body(context) {
                    // Being stopped mid-wait is a normal way to end.
                    Err(DcpError::Interrupted) => Ok(()),
                    other => other,
                };
                match &result {
                    Ok(()) => info!(process = %id, "stopped"),
                    Err(e) => error!(process = %id, error = %e, "process failed"),
                }
                result
            })
            .map_err(|e| DcpError::Spawn(e.to_string()))?;

        Ok(Process {
            id,
            coordinator,
            alive,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn coordinator(&self) -> &Arc<Coordinator<T>> {
        &self.coordinator
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Ask the loop to end and release any blocked wait
    pub fn stop(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            info!(process = %self.id, "stop requested");
        }
        self.coordinator.shutdown();
    }

    /// Join the process thread. Returns the loop's result; a second call
    /// returns `Ok(())`.
    pub fn wait_stopped(&self) -> DcpResult<()> {
        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };
        handle
            .join()
            .map_err(|_| DcpError::ProcessPanicked(self.id))?
    }
}
