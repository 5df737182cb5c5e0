//! Demand-driven publisher.
//!
//! A [`Publisher`] wraps a fallible source stream and pushes its items to a
//! single [`Subscriber`], never faster than the subscriber asked for.
//!
//! # Scheduling
//!
//! Each subscription gets its own tokio task. The task pulls one item from
//! the source, parks on a [`Notify`](tokio::sync::Notify) until a unit of
//! demand is available, then delivers it. At most one item is held ahead of
//! demand. Completion and errors are delivered as soon as the source yields
//! them, demand or not. Demand lives in
//! an atomic [`DemandCounter`](crate::demand::DemandCounter), so requests may
//! arrive from any thread, including from inside the subscriber's own
//! callbacks.
//!
//! # Example
//!
//! ```rust,no_run
//! use demandflow::{BoundedConsumer, Publisher};
//!
//! # async fn run() -> demandflow::Result<()> {
//! let consumer = BoundedConsumer::new(2, |item: i64| println!("{item}"))?;
//! Publisher::range(1, 10)?.subscribe(consumer).join().await?;
//! # Ok(())
//! # }
//! ```

mod subscription;

use std::ops::RangeInclusive;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::{self, Either};
use futures_util::{FutureExt, Stream, StreamExt, pin_mut, stream};
use tracing::{debug, trace, warn};

use crate::telemetry;
use crate::traits::Subscriber;
use crate::{FlowError, Result};

pub use subscription::{Subscription, SubscriptionHandle};

pub(crate) use subscription::{Delivery, Shared, panic_message};

/// Boxed fallible item source.
pub type BoxSource<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Single-subscriber publisher over a fallible source.
pub struct Publisher<T> {
    source: BoxSource<T>,
}

impl<T: Send + 'static> Publisher<T> {
    /// Publish the items of any fallible stream. The first `Err` terminates.
    pub fn from_stream<S>(source: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Self {
            source: Box::pin(source),
        }
    }

    /// Publish the items of an iterator, then complete.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(stream::iter(items.into_iter().map(Ok)))
    }

    /// Publish items and faults from an iterator. The first `Err` terminates.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<T>>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(stream::iter(results))
    }

    /// A publisher that completes immediately.
    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// A publisher that fails immediately.
    pub fn failed(error: FlowError) -> Self {
        Self::from_stream(stream::once(async move { Err(error) }))
    }

    /// Register `subscriber` and start the emission task.
    ///
    /// `on_subscribe` runs on the calling thread before this returns. No item
    /// is emitted until demand is requested, either by the subscriber or
    /// through the returned handle. Terminal signals need no demand.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn subscribe<S>(self, mut subscriber: S) -> SubscriptionHandle
    where
        S: Subscriber<T> + 'static,
    {
        let shared = Arc::new(Shared::default());
        let subscription = Subscription::new(shared.clone());

        debug!("on_subscribe");
        let handed = subscription.clone();
        let fault = match shared.deliver(|| subscriber.on_subscribe(handed)) {
            Delivery::Panicked(message) => Some(FlowError::Aborted(format!(
                "subscriber panicked in on_subscribe: {message}"
            ))),
            Delivery::Done | Delivery::Cancelled => None,
        };

        let task = tokio::spawn(emit(self.source, subscriber, shared, fault));
        SubscriptionHandle::new(subscription, task)
    }
}

impl Publisher<i64> {
    /// Publish `count` consecutive integers starting at `start`.
    ///
    /// Fails with [`FlowError::Configuration`] when the last value would not
    /// fit in an `i64`.
    pub fn range(start: i64, count: u64) -> Result<Self> {
        Ok(Self::from_iter(checked_range(start, count)?))
    }
}

/// The `count` consecutive values starting at `start`.
pub(crate) fn checked_range(start: i64, count: u64) -> Result<RangeInclusive<i64>> {
    let Some(span) = count.checked_sub(1) else {
        // empty
        return Ok(RangeInclusive::new(1, 0));
    };
    i64::try_from(i128::from(start) + i128::from(span))
        .map(|last| start..=last)
        .map_err(|_| {
            FlowError::Configuration(format!("range of {count} values from {start} overflows i64"))
        })
}

enum Terminal {
    Complete,
    Error(FlowError),
}

/// Emission loop.
///
/// Pulls one item at a time and holds it until a unit of demand is
/// available. Exhaustion and faults are signalled as soon as the source
/// reports them.
async fn emit<T, S>(
    mut source: BoxSource<T>,
    mut subscriber: S,
    shared: Arc<Shared>,
    fault: Option<FlowError>,
) where
    S: Subscriber<T>,
{
    let status = match fault {
        Some(error) => terminate::<T, S>(&shared, &mut subscriber, Terminal::Error(error)),
        None => loop {
            let next = {
                let pull = AssertUnwindSafe(source.next()).catch_unwind();
                let cancelled = shared.cancelled();
                pin_mut!(pull, cancelled);
                match future::select(pull, cancelled).await {
                    Either::Left((next, _)) => next,
                    Either::Right(_) => break CANCELLED,
                }
            };

            let terminal = match next {
                Ok(Some(Ok(item))) => {
                    if !shared.acquire().await {
                        break CANCELLED;
                    }
                    shared.demand.record_emission();
                    trace!(outstanding = shared.demand.outstanding(), "on_next");
                    match shared.deliver(|| subscriber.on_next(item)) {
                        Delivery::Done => {
                            metrics::counter!(telemetry::ITEMS_EMITTED_TOTAL).increment(1);
                            continue;
                        }
                        Delivery::Cancelled => break CANCELLED,
                        Delivery::Panicked(message) => Terminal::Error(FlowError::Aborted(
                            format!("subscriber panicked in on_next: {message}"),
                        )),
                    }
                }
                Ok(Some(Err(error))) => Terminal::Error(error),
                Ok(None) => Terminal::Complete,
                Err(payload) => Terminal::Error(FlowError::Aborted(format!(
                    "source panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            };
            break terminate::<T, S>(&shared, &mut subscriber, terminal);
        },
    };

    if status == CANCELLED {
        debug!(emitted = shared.demand.emitted(), "emission stopped by cancel");
    }
    metrics::counter!(telemetry::STREAMS_TERMINATED_TOTAL, "status" => status).increment(1);
}

const CANCELLED: &str = "cancelled";

/// Deliver the terminal signal; returns the termination status label.
fn terminate<T, S>(shared: &Shared, subscriber: &mut S, terminal: Terminal) -> &'static str
where
    S: Subscriber<T>,
{
    shared.mark_terminated();
    let (status, delivery) = match terminal {
        Terminal::Error(error) => {
            debug!(%error, "on_error");
            ("errored", shared.deliver(|| subscriber.on_error(error)))
        }
        Terminal::Complete => {
            debug!(emitted = shared.demand.emitted(), "on_complete");
            ("completed", shared.deliver(|| subscriber.on_complete()))
        }
    };

    match delivery {
        Delivery::Done => status,
        Delivery::Cancelled => CANCELLED,
        Delivery::Panicked(message) => {
            warn!(%message, status, "subscriber panicked in terminal callback");
            status
        }
    }
}
