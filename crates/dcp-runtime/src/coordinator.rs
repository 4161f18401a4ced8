//! Coordinator - one per process
//!
//! Owns the process's Lamport clock, mailbox, barrier wait-set and token
//! state, and hosts the three protocols that share them:
//! 1. Messaging (broadcast, dedicated send, Lamport stamping)
//! 2. Barrier synchronization
//! 3. Token-ring mutual exclusion
//!
//! Incoming envelopes arrive through [`Subscriber::deliver`] on the
//! transport's delivery thread, concurrently with the process's own calls.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use dcp_core::{
    BarrierPhase, DcpError, DcpResult, Envelope, EnvelopeKind, Message, ProcessId, Ring, Token,
    TokenState, UNSTAMPED,
};
use dcp_time::LamportClock;
use dcp_transport::{Subscriber, SubscriptionId, Transport};

use crate::barrier::WaitSet;
use crate::gate::TokenGate;
use crate::{CoordinatorConfig, Mailbox};

/// Counters snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Application messages accepted into the mailbox
    pub delivered: u64,
    /// Application envelopes dropped (own broadcast, other receiver)
    pub discarded: u64,
    pub tokens_forwarded: u64,
    pub critical_sections: u64,
    pub barrier_rounds: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    discarded: AtomicU64,
    tokens_forwarded: AtomicU64,
    critical_sections: AtomicU64,
    barrier_rounds: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            tokens_forwarded: self.tokens_forwarded.load(Ordering::Relaxed),
            critical_sections: self.critical_sections.load(Ordering::Relaxed),
            barrier_rounds: self.barrier_rounds.load(Ordering::Relaxed),
        }
    }
}

/// Everything needed to pass the token on, detachable from the coordinator
/// so a holder thread can own it.
struct TokenRelay<T> {
    id: ProcessId,
    ring: Ring,
    transport: Arc<dyn Transport<T>>,
    counters: Arc<Counters>,
}

impl<T> Clone for TokenRelay<T> {
    fn clone(&self) -> Self {
        TokenRelay {
            id: self.id,
            ring: self.ring,
            transport: Arc::clone(&self.transport),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T> TokenRelay<T> {
    /// Readdress the token to the successor and publish it
    fn forward(&self, mut token: Token) -> DcpResult<()> {
        let next = self.ring.next(self.id);
        token.pass_to(next);
        self.transport.publish(Envelope::token(self.id, token))?;
        Counters::bump(&self.counters.tokens_forwarded);
        debug!(process = %self.id, to = %next, "token forwarded");
        Ok(())
    }

    fn forward_or_log(&self, token: Token) {
        if let Err(e) = self.forward(token) {
            warn!(process = %self.id, error = %e, "failed to forward token");
        }
    }

    /// Keep the token until the application releases the critical section
    fn hold(&self, gate: &TokenGate, token: Token) {
        match gate.wait_for_release() {
            Ok(()) => {
                Counters::bump(&self.counters.critical_sections);
                info!(process = %self.id, "releasing the token");
                self.forward_or_log(token);
            }
            Err(e) => {
                warn!(process = %self.id, error = %e, "stopped inside critical section, token withdrawn");
            }
        }
    }
}

/// Per-process coordinator
pub struct Coordinator<T> {
    id: ProcessId,
    config: CoordinatorConfig,
    clock: LamportClock,
    mailbox: Mailbox<T>,
    wait_set: WaitSet,
    gate: Arc<TokenGate>,
    relay: TokenRelay<T>,
    subscription: Mutex<Option<SubscriptionId>>,
    token_seeded: AtomicBool,
}

impl<T: Send + 'static> Coordinator<T> {
    /// Create the coordinator for process `id` and subscribe it to `transport`
    pub fn new(
        id: ProcessId,
        config: CoordinatorConfig,
        transport: Arc<dyn Transport<T>>,
    ) -> DcpResult<Arc<Self>> {
        let ring = config.ring()?;
        if !ring.contains(id) {
            return Err(DcpError::UnknownProcess(id));
        }

        let coordinator = Arc::new(Coordinator {
            id,
            config,
            clock: LamportClock::new(),
            mailbox: Mailbox::new(),
            wait_set: WaitSet::new(ring, id),
            gate: Arc::new(TokenGate::new()),
            relay: TokenRelay {
                id,
                ring,
                transport: Arc::clone(&transport),
                counters: Arc::new(Counters::default()),
            },
            subscription: Mutex::new(None),
            token_seeded: AtomicBool::new(false),
        });

        let subscriber: Arc<dyn Subscriber<T>> = coordinator.clone();
        let subscription = transport.subscribe(subscriber)?;
        *coordinator.subscription.lock() = Some(subscription);

        info!(process = %id, processes = ring.size(), "coordinator started");
        Ok(coordinator)
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> String {
        self.id.name()
    }

    pub fn ring(&self) -> Ring {
        self.relay.ring
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn mailbox(&self) -> &Mailbox<T> {
        &self.mailbox
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.relay.counters.snapshot()
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    /// Current Lamport time
    pub fn clock(&self) -> u64 {
        self.clock.get()
    }

    /// Record a local event
    pub fn tick_clock(&self) -> u64 {
        self.clock.increment()
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Publish to every other process.
    ///
    /// Application broadcasts (`system == false`) advance the clock and are
    /// stamped under the clock's lock; system broadcasts carry no timestamp.
    pub fn broadcast(&self, payload: T, system: bool) -> DcpResult<()> {
        let id = self.id;
        let timestamp = self.emit(system, move |ts| Envelope::broadcast(id, ts, payload))?;
        info!(process = %id, timestamp, system, "broadcasting message");
        Ok(())
    }

    /// Publish to `receiver` only. Same stamping rule as [`Self::broadcast`].
    pub fn send_to(&self, receiver: ProcessId, payload: T, system: bool) -> DcpResult<()> {
        if !self.relay.ring.contains(receiver) {
            return Err(DcpError::UnknownProcess(receiver));
        }
        let id = self.id;
        let timestamp =
            self.emit(system, move |ts| Envelope::dedicated(id, receiver, ts, payload))?;
        info!(process = %id, to = %receiver, timestamp, system, "sending message");
        Ok(())
    }

    /// Broadcast from `from`, then rendezvous with everyone.
    ///
    /// Every process calls this with the same `from`; only that process
    /// publishes `payload`, the others just join the barrier round. On
    /// return the payload is in every receiver's mailbox, since a sender's
    /// envelopes reach each subscriber in publication order.
    pub fn broadcast_sync(&self, payload: T, from: ProcessId) -> DcpResult<()> {
        if self.id == from {
            self.broadcast(payload, false)?;
        }
        self.synchronize()
    }

    /// Send to `dest`, then rendezvous with everyone
    pub fn send_to_sync(&self, payload: T, dest: ProcessId) -> DcpResult<()> {
        self.send_to(dest, payload, false)?;
        self.synchronize()
    }

    /// Oldest pending message, blocking
    pub fn receive(&self) -> DcpResult<Message<T>> {
        self.mailbox.take_first()
    }

    /// Oldest pending message, or [`DcpError::Empty`]
    pub fn try_receive(&self) -> DcpResult<Message<T>> {
        self.mailbox.try_take_first()
    }

    /// Oldest pending message from `sender`, blocking
    pub fn receive_from(&self, sender: ProcessId) -> DcpResult<Message<T>> {
        self.mailbox.take_first_from(sender)
    }

    fn emit<F>(&self, system: bool, build: F) -> DcpResult<u64>
    where
        F: FnOnce(u64) -> Envelope<T>,
    {
        let transport = &self.relay.transport;
        if system {
            transport.publish(build(UNSTAMPED))?;
            return Ok(UNSTAMPED);
        }
        // Publishes under the clock lock; the transport delivers on its own
        // threads, so our `deliver` never re-enters this lock.
        self.clock
            .stamp(|ts| transport.publish(build(ts)).map(|()| ts))
    }

    // ------------------------------------------------------------------
    // Barrier
    // ------------------------------------------------------------------

    /// Announce arrival and block until every other process has arrived.
    ///
    /// Precondition: one outstanding round per process. Overlapping calls on
    /// the same coordinator are not supported.
    pub fn synchronize(&self) -> DcpResult<()> {
        self.relay
            .transport
            .publish(Envelope::barrier(self.id, BarrierPhase::Request))?;

        if let Err(e) = self.wait_set.wait_round() {
            warn!(process = %self.id, error = %e, "barrier wait interrupted");
            return Err(e);
        }
        Counters::bump(&self.relay.counters.barrier_rounds);
        info!(process = %self.id, "synchronized with all other processes");
        Ok(())
    }

    /// Peers whose barrier arrival is recorded but not yet consumed
    pub fn pending_arrivals(&self) -> Vec<ProcessId> {
        self.wait_set.pending()
    }

    // ------------------------------------------------------------------
    // Token ring
    // ------------------------------------------------------------------

    pub fn token_state(&self) -> TokenState {
        self.gate.state()
    }

    /// Block until the token grants this process the critical section
    pub fn request_critical_section(&self) -> DcpResult<()> {
        info!(process = %self.id, "requesting critical section");
        match self.gate.request_and_wait() {
            Ok(()) => {
                info!(process = %self.id, "entered critical section");
                Ok(())
            }
            Err(e) => {
                warn!(process = %self.id, error = %e, "critical section request abandoned");
                Err(e)
            }
        }
    }

    /// Leave the critical section; the held token moves on to the successor
    pub fn release_critical_section(&self) -> DcpResult<()> {
        self.gate.release()?;
        info!(process = %self.id, "left critical section");
        Ok(())
    }

    /// Create the system's single token and start circulation.
    ///
    /// Exactly one process in the whole system may call this, once. A second
    /// call on the same coordinator is refused; calls on two different
    /// coordinators cannot be detected and break mutual exclusion.
    pub fn initialize_token(&self) -> DcpResult<()> {
        if self.token_seeded.swap(true, Ordering::AcqRel) {
            return Err(DcpError::ProtocolMisuse(
                "token already initialized by this process".into(),
            ));
        }
        info!(process = %self.id, "initializing token");
        self.relay.forward(Token::new(self.id))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Unsubscribe and release every blocked wait with `Interrupted`
    pub fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            self.relay.transport.unsubscribe(subscription);
        }
        self.mailbox.close();
        self.wait_set.interrupt();
        self.gate.interrupt();
        info!(process = %self.id, "coordinator stopped");
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn accept(&self, message: Message<T>, stamped: bool) {
        debug!(
            process = %self.id,
            from = %message.sender,
            timestamp = message.timestamp,
            stamped,
            "message received"
        );
        self.mailbox.push(message);
        Counters::bump(&self.relay.counters.delivered);
    }

    fn discard(&self, kind: &'static str, sender: ProcessId) {
        debug!(process = %self.id, kind, from = %sender, "envelope discarded");
        Counters::bump(&self.relay.counters.discarded);
    }

    fn on_token(&self, token: Token) {
        if token.holder != self.id {
            return;
        }

        if self.gate.grant() {
            info!(process = %self.id, "received the token");
            self.park_token(token);
            return;
        }

        if let Some(delay) = self.config.hop_delay {
            thread::sleep(delay);
        }
        self.relay.forward_or_log(token);
    }

    /// Hand the token to a holder thread that waits for the release, keeping
    /// the delivery thread free for other envelopes.
    fn park_token(&self, token: Token) {
        let gate = Arc::clone(&self.gate);
        let relay = self.relay.clone();

        let spawned = thread::Builder::new()
            .name(format!("{}-token", self.id))
            .spawn(move || relay.hold(&gate, token));

        if let Err(e) = spawned {
            warn!(process = %self.id, error = %e, "no holder thread, holding token on delivery thread");
            self.relay.hold(&self.gate, token);
        }
    }

    fn on_barrier(&self, sender: ProcessId, _phase: BarrierPhase) {
        if sender == self.id {
            return;
        }
        debug!(process = %self.id, from = %sender, "barrier arrival");
        if self.wait_set.arrive(sender) {
            debug!(process = %self.id, "barrier round complete");
        }
    }
}

impl<T: Send + 'static> Subscriber<T> for Coordinator<T> {
    fn deliver(&self, envelope: Envelope<T>) {
        let kind_label = envelope.label();
        let stamped = envelope.is_stamped();
        let Envelope {
            sender,
            timestamp,
            kind,
        } = envelope;

        match kind {
            EnvelopeKind::Broadcast { payload } => {
                self.clock.update(timestamp);
                if sender == self.id {
                    self.discard(kind_label, sender);
                    return;
                }
                self.accept(
                    Message {
                        sender,
                        receiver: None,
                        timestamp,
                        payload,
                    },
                    stamped,
                );
            }
            EnvelopeKind::Dedicated { receiver, payload } => {
                self.clock.update(timestamp);
                if receiver != self.id {
                    self.discard(kind_label, sender);
                    return;
                }
                self.accept(
                    Message {
                        sender,
                        receiver: Some(receiver),
                        timestamp,
                        payload,
                    },
                    stamped,
                );
            }
            EnvelopeKind::Token(token) => self.on_token(token),
            EnvelopeKind::Barrier(phase) => self.on_barrier(sender, phase),
        }
    }
}
