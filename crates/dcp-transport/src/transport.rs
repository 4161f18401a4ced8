//! Transport contract

use std::fmt;
use std::sync::Arc;

use dcp_core::{DcpResult, Envelope};

/// Handle returned by [`Transport::subscribe`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Delivery callback, invoked once per published envelope.
///
/// Calls for different envelopes may run on a different thread than the
/// subscriber's own application logic, so implementations guard their state.
pub trait Subscriber<T>: Send + Sync {
    fn deliver(&self, envelope: Envelope<T>);
}

/// Publish/subscribe transport
///
/// Every published envelope reaches every current subscriber at least once.
/// No ordering is promised across different senders.
pub trait Transport<T>: Send + Sync {
    /// Fire-and-forget publication to all current subscribers.
    ///
    /// Must not call [`Subscriber::deliver`] on the publishing thread: callers
    /// may publish while holding a lock that their own `deliver` takes.
    fn publish(&self, envelope: Envelope<T>) -> DcpResult<()>;

    /// Register a delivery callback
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> DcpResult<SubscriptionId>;

    /// Deregister a delivery callback. Returns `false` if it was unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
