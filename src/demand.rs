//! Outstanding-demand accounting.
//!
//! [`DemandCounter`] is the single source of truth for how many items a
//! publisher may still emit. Requests add to it, every emission takes one
//! unit with an atomic compare-and-decrement. A publisher that observes a
//! positive counter and then decrements it can never race another taker
//! past zero.
//!
//! Additions saturate. Once the counter reaches [`UNBOUNDED`] it stays
//! there and emissions stop decrementing it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{FlowError, Result};

/// Demand value meaning "emit without limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Atomic counter of units a publisher may emit without further permission.
#[derive(Debug, Default)]
pub struct DemandCounter {
    outstanding: AtomicU64,
    granted: AtomicU64,
    emitted: AtomicU64,
}

impl DemandCounter {
    /// Create a counter with zero outstanding demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` units of demand and return the new outstanding value.
    ///
    /// Fails with [`FlowError::InvalidDemand`] when `n == 0`; the counter is
    /// left untouched in that case.
    pub fn request(&self, n: u64) -> Result<u64> {
        if n == 0 {
            return Err(FlowError::InvalidDemand { requested: n });
        }

        let _ = self
            .granted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |g| {
                Some(g.saturating_add(n))
            });
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                Some(c.saturating_add(n))
            })
            .unwrap_or_else(|c| c);
        Ok(previous.saturating_add(n))
    }

    /// Take one unit of demand.
    ///
    /// Returns `false` when no demand is outstanding. Unbounded demand is
    /// never decremented.
    pub fn try_take(&self) -> bool {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| match c {
                0 => None,
                UNBOUNDED => Some(UNBOUNDED),
                c => Some(c - 1),
            })
            .is_ok()
    }

    /// Units the publisher may still emit.
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Whether demand has saturated to [`UNBOUNDED`].
    pub fn is_unbounded(&self) -> bool {
        self.outstanding() == UNBOUNDED
    }

    /// Total units granted since creation, saturating at [`UNBOUNDED`].
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Acquire)
    }

    /// Total emissions recorded since creation.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }

    /// Record one delivered item.
    ///
    /// # Panics
    ///
    /// Panics if emissions exceed the demand ever granted. That can only
    /// happen through a bug in the publisher, never through caller misuse.
    pub fn record_emission(&self) {
        let emitted = self.emitted.fetch_add(1, Ordering::AcqRel) + 1;
        let granted = self.granted();
        assert!(
            granted == UNBOUNDED || emitted <= granted,
            "emission exceeded demand: emitted {emitted}, granted {granted}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let demand = DemandCounter::new();
        assert_eq!(demand.outstanding(), 0);
        assert!(!demand.try_take());
    }

    #[test]
    fn take_stops_at_zero() {
        let demand = DemandCounter::new();
        assert_eq!(demand.request(2).unwrap(), 2);
        assert!(demand.try_take());
        assert!(demand.try_take());
        assert!(!demand.try_take());
        assert_eq!(demand.outstanding(), 0);
    }

    #[test]
    fn saturates_to_unbounded() {
        let demand = DemandCounter::new();
        demand.request(5).unwrap();
        assert_eq!(demand.request(UNBOUNDED - 1).unwrap(), UNBOUNDED);
        assert!(demand.is_unbounded());
        for _ in 0..100 {
            assert!(demand.try_take());
        }
        assert!(demand.is_unbounded());
    }

    #[test]
    #[should_panic(expected = "emission exceeded demand")]
    fn emission_past_grant_is_fatal() {
        let demand = DemandCounter::new();
        demand.request(1).unwrap();
        demand.record_emission();
        demand.record_emission();
    }
}
