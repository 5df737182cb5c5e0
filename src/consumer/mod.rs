//! Fixed-window subscriber.
//!
//! [`BoundedConsumer`] keeps exactly one batch of demand outstanding: it
//! requests `batch_size` items on subscription, counts what arrives, and
//! requests another `batch_size` once the window is used up. It never asks
//! for more before it has consumed what it was granted, so the publisher is
//! at most one window ahead of the handler.
//!
//! Stream errors end the consumer, are logged, and are handed to the
//! handler's [`ItemHandler::on_error`] hook. They are never re-raised.

mod stats;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, trace};

use crate::publisher::Subscription;
use crate::traits::Subscriber;
use crate::{FlowError, Result};

pub use stats::{ConsumerState, ConsumerStats, StatsSnapshot};

/// Processing hook for items delivered to a [`BoundedConsumer`].
///
/// Any `FnMut(T) + Send` closure is an item handler with no-op terminal hooks.
pub trait ItemHandler<T>: Send {
    /// Process one item.
    fn on_item(&mut self, item: T);

    /// Finalize after the stream completed. Called at most once.
    fn on_complete(&mut self) {}

    /// Observe the error that ended the stream. Called at most once.
    fn on_error(&mut self, _error: &FlowError) {}
}

impl<T, F> ItemHandler<T> for F
where
    F: FnMut(T) + Send,
{
    fn on_item(&mut self, item: T) {
        self(item)
    }
}

/// Subscriber that re-requests a fixed batch each time the previous one is consumed.
pub struct BoundedConsumer<H> {
    batch_size: u64,
    consumed: u64,
    state: ConsumerState,
    subscription: Option<Subscription>,
    handler: H,
    stats: Arc<ConsumerStats>,
}

impl<H> fmt::Debug for BoundedConsumer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedConsumer")
            .field("batch_size", &self.batch_size)
            .field("consumed", &self.consumed)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<H> BoundedConsumer<H> {
    /// Create a consumer with a window of `batch_size` items.
    ///
    /// Fails with [`FlowError::InvalidDemand`] when `batch_size == 0`.
    pub fn new(batch_size: u64, handler: H) -> Result<Self> {
        if batch_size == 0 {
            return Err(FlowError::InvalidDemand {
                requested: batch_size,
            });
        }
        Ok(Self {
            batch_size,
            consumed: 0,
            state: ConsumerState::Unsubscribed,
            subscription: None,
            handler,
            stats: Arc::default(),
        })
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Items consumed in the current window.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Shared counters, still readable after the consumer moves into a publisher.
    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    fn transition(&mut self, state: ConsumerState) {
        trace!(from = ?self.state, to = ?state, "consumer state");
        self.state = state;
        self.stats.set_state(state);
    }

    fn request_window(&mut self) {
        let Some(subscription) = &self.subscription else {
            return;
        };
        match subscription.request(self.batch_size) {
            Ok(()) => self.stats.record_request(),
            // batch_size > 0 is checked at construction
            Err(e) => error!(error = %e, "window request rejected"),
        }
    }
}

impl<T, H> Subscriber<T> for BoundedConsumer<H>
where
    H: ItemHandler<T>,
{
    fn on_subscribe(&mut self, subscription: Subscription) {
        if self.state != ConsumerState::Unsubscribed {
            debug!(state = ?self.state, "already subscribed, cancelling new subscription");
            subscription.cancel();
            return;
        }

        self.subscription = Some(subscription);
        self.consumed = 0;
        self.transition(ConsumerState::Subscribed);

        self.request_window();
        self.transition(ConsumerState::Active);
    }

    fn on_next(&mut self, item: T) {
        if self.state != ConsumerState::Active {
            trace!(state = ?self.state, "ignoring item outside active state");
            return;
        }

        self.handler.on_item(item);
        self.stats.record_item();

        self.consumed += 1;
        if self.consumed == self.batch_size {
            self.consumed = 0;
            self.request_window();
        }
    }

    fn on_error(&mut self, error: FlowError) {
        if self.state.is_terminal() {
            trace!(%error, "ignoring error after termination");
            return;
        }

        self.transition(ConsumerState::Errored);
        self.stats.record_error();
        error!(%error, items = self.stats.items_received(), "stream terminated with error");
        self.handler.on_error(&error);
        self.subscription = None;
    }

    fn on_complete(&mut self) {
        if self.state.is_terminal() {
            trace!("ignoring completion after termination");
            return;
        }

        self.transition(ConsumerState::Completed);
        self.stats.record_completion();
        info!(
            items = self.stats.items_received(),
            requests = self.stats.demand_requests(),
            "stream completed"
        );
        self.handler.on_complete();
        self.subscription = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pin the item type; `on_subscribe` and the terminal signals don't mention it.
    fn driver<'a, H: ItemHandler<i64> + 'a>(
        consumer: &'a mut BoundedConsumer<H>,
    ) -> &'a mut (dyn Subscriber<i64> + 'a) {
        consumer
    }

    #[test]
    fn zero_batch_is_rejected() {
        let err = BoundedConsumer::new(0, |_: i64| {}).unwrap_err();
        assert_eq!(err, FlowError::InvalidDemand { requested: 0 });
    }

    #[test]
    fn subscribe_requests_first_window() {
        let mut consumer = BoundedConsumer::new(3, |_: i64| {}).unwrap();
        let subscription = Subscription::detached();

        driver(&mut consumer).on_subscribe(subscription.clone());

        assert_eq!(consumer.state(), ConsumerState::Active);
        assert_eq!(subscription.outstanding(), 3);
        assert_eq!(consumer.stats().demand_requests(), 1);
    }

    #[test]
    fn window_is_renewed_after_batch() {
        let mut consumer = BoundedConsumer::new(2, |_: i64| {}).unwrap();
        let subscription = Subscription::detached();
        driver(&mut consumer).on_subscribe(subscription.clone());

        driver(&mut consumer).on_next(1);
        assert_eq!(consumer.consumed(), 1);
        assert_eq!(consumer.stats().demand_requests(), 1);

        driver(&mut consumer).on_next(2);
        assert_eq!(consumer.consumed(), 0);
        assert_eq!(consumer.stats().demand_requests(), 2);
        // detached: nothing was taken, so both grants are still outstanding
        assert_eq!(subscription.outstanding(), 4);
    }

    #[test]
    fn signals_after_termination_are_ignored() {
        let mut seen = Vec::new();
        let mut consumer = BoundedConsumer::new(5, |item: i64| seen.push(item)).unwrap();
        let stats = consumer.stats();
        {
            let sub = driver(&mut consumer);
            sub.on_subscribe(Subscription::detached());
            sub.on_next(1);
            sub.on_complete();
            sub.on_next(2);
            sub.on_error(FlowError::source("late"));
            sub.on_complete();
        }
        drop(consumer);

        assert_eq!(stats.state(), ConsumerState::Completed);
        assert_eq!(stats.completions(), 1);
        assert_eq!(stats.errors(), 0);
        assert_eq!(stats.items_received(), 1);
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn error_terminates_once() {
        let mut consumer = BoundedConsumer::new(2, |_: i64| {}).unwrap();
        {
            let sub = driver(&mut consumer);
            sub.on_subscribe(Subscription::detached());
            sub.on_error(FlowError::source("boom"));
            sub.on_error(FlowError::source("again"));
            sub.on_complete();
        }
        let stats = consumer.stats();
        assert_eq!(stats.state(), ConsumerState::Errored);
        assert_eq!(stats.errors(), 1);
        assert_eq!(stats.completions(), 0);
    }

    #[test]
    fn items_before_subscription_are_ignored() {
        let mut consumer = BoundedConsumer::new(1, |_: i64| {}).unwrap();
        driver(&mut consumer).on_next(7);
        assert_eq!(consumer.stats().items_received(), 0);
        assert_eq!(consumer.state(), ConsumerState::Unsubscribed);
    }

    #[test]
    fn second_subscription_is_cancelled() {
        let mut consumer = BoundedConsumer::new(1, |_: i64| {}).unwrap();
        driver(&mut consumer).on_subscribe(Subscription::detached());

        let second = Subscription::detached();
        driver(&mut consumer).on_subscribe(second.clone());
        assert!(second.is_cancelled());
        assert_eq!(second.outstanding(), 0);
    }
}
