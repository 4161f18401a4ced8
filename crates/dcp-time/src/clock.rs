//! Lamport clock

use parking_lot::Mutex;

/// Lamport logical clock
/// INVARIANT: the value never decreases
///
/// Every operation runs under the clock's own lock, so at most one is in
/// progress at a time per instance.
#[derive(Debug, Default)]
pub struct LamportClock {
    value: Mutex<u64>,
}

impl LamportClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at `value`
    pub fn with_value(value: u64) -> Self {
        LamportClock {
            value: Mutex::new(value),
        }
    }

    /// Current value
    pub fn get(&self) -> u64 {
        *self.value.lock()
    }

    /// Local event: `value += 1`
    /// Returns the new value
    pub fn increment(&self) -> u64 {
        let mut value = self.value.lock();
        *value = value.saturating_add(1);
        *value
    }

    /// Delivery of a timestamp: `value = max(value, received) + 1`
    /// Returns the new value
    pub fn update(&self, received: u64) -> u64 {
        let mut value = self.value.lock();
        *value = (*value).max(received).saturating_add(1);
        *value
    }

    /// Increment and hand the new value to `f` while still holding the lock.
    ///
    /// Two concurrent stamps on the same clock never observe the same value,
    /// and no `update` can slip between the increment and whatever `f` does
    /// with the timestamp.
    pub fn stamp<R>(&self, f: impl FnOnce(u64) -> R) -> R {
        let mut value = self.value.lock();
        *value = value.saturating_add(1);
        f(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    enum ClockOp {
        Increment,
        Update(u64),
        Stamp,
    }

    fn arb_op() -> impl Strategy<Value = ClockOp> {
        prop_oneof![
            Just(ClockOp::Increment),
            (0u64..1_000_000).prop_map(ClockOp::Update),
            Just(ClockOp::Stamp),
        ]
    }

    #[test]
    fn test_clock_starts_at_zero() {
        assert_eq!(LamportClock::new().get(), 0);
    }

    #[test]
    fn test_increment() {
        let clock = LamportClock::new();
        assert_eq!(clock.increment(), 1);
        assert_eq!(clock.increment(), 2);
        assert_eq!(clock.get(), 2);
    }

    #[test]
    fn test_update_takes_max_plus_one() {
        let clock = LamportClock::with_value(3);

        // Received older timestamp
        assert_eq!(clock.update(1), 4);
        // Received newer timestamp
        assert_eq!(clock.update(10), 11);
        // Received equal timestamp
        assert_eq!(clock.update(11), 12);
    }

    #[test]
    fn test_stamp_passes_new_value() {
        let clock = LamportClock::with_value(3);
        let seen = clock.stamp(|ts| ts);
        assert_eq!(seen, 4);
        assert_eq!(clock.get(), 4);
    }

    #[test]
    fn test_concurrent_stamps_are_unique() {
        let clock = Arc::new(LamportClock::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let clock = Arc::clone(&clock);
            handles.push(std::thread::spawn(move || {
                (0..250).map(|_| clock.stamp(|ts| ts)).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for ts in handle.join().unwrap() {
                assert!(seen.insert(ts), "timestamp {ts} handed out twice");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(clock.get(), 1000);
    }

    proptest! {
        #[test]
        fn clock_is_monotonic(ops in proptest::collection::vec(arb_op(), 0..200)) {
            let clock = LamportClock::new();
            let mut last = clock.get();

            for op in ops {
                let before = clock.get();
                let after = match op {
                    ClockOp::Increment => {
                        let v = clock.increment();
                        prop_assert_eq!(v, before + 1);
                        v
                    }
                    ClockOp::Update(received) => {
                        let v = clock.update(received);
                        prop_assert_eq!(v, before.max(received) + 1);
                        v
                    }
                    ClockOp::Stamp => clock.stamp(|ts| ts),
                };
                prop_assert!(after > last);
                last = after;
            }
        }
    }
}
