//! In-process transport
//!
//! Each subscriber owns an unbounded queue drained by its own delivery
//! thread. `publish` never blocks on a slow subscriber, and a subscriber
//! blocked inside `deliver` only delays its own queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use dcp_core::{DcpError, DcpResult, Envelope};

use crate::{Subscriber, SubscriptionId, Transport};

struct Route<T> {
    queue: mpsc::UnboundedSender<Envelope<T>>,
    worker: JoinHandle<()>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub enqueued: u64,
    pub subscribers: usize,
}

/// In-memory fan-out bus
pub struct LocalBus<T> {
    routes: Mutex<HashMap<SubscriptionId, Route<T>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    published: AtomicU64,
    enqueued: AtomicU64,
}

impl<T: Clone + Send + 'static> LocalBus<T> {
    pub fn new() -> Self {
        LocalBus {
            routes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            published: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
        }
    }

    /// Create a bus behind an `Arc`, ready to hand to coordinators
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }

    /// Refuse further publications, drop every subscriber and join the
    /// delivery threads once their queues drain.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let routes: Vec<_> = self.routes.lock().drain().collect();
        let current = thread::current().id();

        for (id, route) in routes {
            drop(route.queue);
            if route.worker.thread().id() == current {
                continue;
            }
            if route.worker.join().is_err() {
                tracing::warn!(subscription = ?id, "delivery thread panicked");
            }
        }
        tracing::debug!("local bus closed");
    }
}

impl<T: Clone + Send + 'static> Default for LocalBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Transport<T> for LocalBus<T> {
    fn publish(&self, envelope: Envelope<T>) -> DcpResult<()> {
        if self.is_closed() {
            return Err(DcpError::Transport("bus is closed".into()));
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        // Enqueueing under the routes lock gives every subscriber the same
        // publication order.
        let routes = self.routes.lock();
        for (id, route) in routes.iter() {
            if route.queue.send(envelope.clone()).is_err() {
                tracing::warn!(subscription = ?id, "delivery thread gone, dropping envelope");
                continue;
            }
            self.enqueued.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> DcpResult<SubscriptionId> {
        if self.is_closed() {
            return Err(DcpError::Transport("bus is closed".into()));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, mut inbox) = mpsc::unbounded_channel::<Envelope<T>>();

        let worker = thread::Builder::new()
            .name(format!("bus-delivery-{}", id.0))
            .spawn(move || {
                while let Some(envelope) = inbox.blocking_recv() {
                    subscriber.deliver(envelope);
                }
            })
            .map_err(|e| DcpError::Spawn(e.to_string()))?;

        self.routes.lock().insert(id, Route { queue, worker });
        tracing::debug!(subscription = ?id, "subscriber registered");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // Dropping the sender lets the delivery thread drain and exit.
        let removed = self.routes.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscription = ?id, "subscriber removed");
        }
        removed
    }
}

impl<T> Drop for LocalBus<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        // Detach remaining delivery threads; they exit once their queue closes.
        self.routes.get_mut().clear();
    }
}
