//! Observable lifecycle and counters of a [`BoundedConsumer`](super::BoundedConsumer).

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Lifecycle of a bounded consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Built, not yet attached to a publisher.
    Unsubscribed,
    /// Holds a subscription, first demand not yet issued.
    Subscribed,
    /// First window requested; counting items.
    Active,
    /// Terminated by `on_complete`.
    Completed,
    /// Terminated by `on_error`.
    Errored,
}

impl ConsumerState {
    /// Whether no further signal will be processed.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConsumerState::Completed | ConsumerState::Errored)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConsumerState::Unsubscribed,
            1 => ConsumerState::Subscribed,
            2 => ConsumerState::Active,
            3 => ConsumerState::Completed,
            _ => ConsumerState::Errored,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConsumerState::Unsubscribed => 0,
            ConsumerState::Subscribed => 1,
            ConsumerState::Active => 2,
            ConsumerState::Completed => 3,
            ConsumerState::Errored => 4,
        }
    }
}

/// Counters shared between a consumer and whoever holds a handle to them.
///
/// Updated by the consumer from the emission task; readable from anywhere.
#[derive(Debug)]
pub struct ConsumerStats {
    state: AtomicU8,
    items_received: AtomicU64,
    demand_requests: AtomicU64,
    completions: AtomicU64,
    errors: AtomicU64,
}

impl Default for ConsumerStats {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(ConsumerState::Unsubscribed.as_u8()),
            items_received: AtomicU64::new(0),
            demand_requests: AtomicU64::new(0),
            completions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

impl ConsumerStats {
    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn items_received(&self) -> u64 {
        self.items_received.load(Ordering::Acquire)
    }

    /// Accepted `request(batch_size)` calls, including the initial one.
    pub fn demand_requests(&self) -> u64 {
        self.demand_requests.load(Ordering::Acquire)
    }

    pub fn completions(&self) -> u64 {
        self.completions.load(Ordering::Acquire)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Acquire)
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            state: self.state(),
            items_received: self.items_received(),
            demand_requests: self.demand_requests(),
            completions: self.completions(),
            errors: self.errors(),
        }
    }

    pub(crate) fn set_state(&self, state: ConsumerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn record_item(&self) {
        self.items_received.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_request(&self) {
        self.demand_requests.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::AcqRel);
    }
}

/// Plain copy of [`ConsumerStats`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub state: ConsumerState,
    pub items_received: u64,
    pub demand_requests: u64,
    pub completions: u64,
    pub errors: u64,
}
