//! Demand-acceptance handles shared between a publisher task and its subscriber.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::demand::DemandCounter;
use crate::telemetry;
use crate::{FlowError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Outcome of [`Shared::deliver`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Done,
    Cancelled,
    Panicked(String),
}

/// Marks the current thread as the deliverer until dropped.
struct Delivering<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> Delivering<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self { slot }
    }
}

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

/// State shared by the emission task and every [`Subscription`] clone.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) demand: DemandCounter,
    cancelled: AtomicBool,
    terminated: AtomicBool,
    wake: Notify,
    closed: Notify,
    // Held for the duration of every callback.
    gate: Mutex<()>,
    // Thread currently running a callback, if any.
    deliverer: Mutex<Option<ThreadId>>,
}

impl Shared {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.is_cancelled() || self.terminated.load(Ordering::SeqCst)
    }

    /// Wait until one unit of demand has been taken.
    ///
    /// Returns `false` once the subscription is cancelled.
    pub(crate) async fn acquire(&self) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            if self.demand.try_take() {
                return true;
            }
            // notify_one stores a permit, so a request racing this check is not lost
            self.wake.notified().await;
        }
    }

    /// Resolve once the subscription is cancelled.
    pub(crate) async fn cancelled(&self) {
        loop {
            // registered for notify_waiters from creation, before the flag check
            let notified = self.closed.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run a subscriber callback under the delivery gate.
    ///
    /// The callback is skipped if the subscription was cancelled before the
    /// gate was acquired. A panic inside the callback is caught and reported
    /// as [`Delivery::Panicked`].
    pub(crate) fn deliver(&self, callback: impl FnOnce()) -> Delivery {
        let _gate = lock(&self.gate);
        if self.is_cancelled() {
            return Delivery::Cancelled;
        }
        let _delivering = Delivering::enter(&self.deliverer);
        match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(()) => Delivery::Done,
            Err(payload) => Delivery::Panicked(panic_message(payload.as_ref())),
        }
    }

    fn delivering_on_current_thread(&self) -> bool {
        *lock(&self.deliverer) == Some(thread::current().id())
    }
}

/// Handle through which a subscriber grants demand or cancels.
///
/// Cheap to clone; all clones control the same stream.
#[derive(Debug, Clone)]
pub struct Subscription {
    shared: Arc<Shared>,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// A subscription not attached to any publisher, for driving subscribers by hand.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(Arc::default())
    }

    /// Allow the publisher to emit `n` more items.
    ///
    /// `n == 0` fails with [`FlowError::InvalidDemand`] and leaves outstanding
    /// demand unchanged. After cancellation or termination this is a no-op.
    pub fn request(&self, n: u64) -> Result<()> {
        if n == 0 {
            metrics::counter!(telemetry::INVALID_DEMAND_TOTAL).increment(1);
            warn!(requested = n, "rejected non-positive demand");
            return Err(FlowError::InvalidDemand { requested: n });
        }
        if self.shared.is_closed() {
            debug!(requested = n, "request after stream closed, ignoring");
            return Ok(());
        }

        let outstanding = self.shared.demand.request(n)?;
        metrics::counter!(telemetry::DEMAND_REQUESTS_TOTAL).increment(1);
        metrics::counter!(telemetry::DEMAND_UNITS_TOTAL).increment(n);
        debug!(requested = n, outstanding, "request");

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Stop emission and release the publisher's source.
    ///
    /// When this returns, no further callback will start. Called from inside
    /// a callback, the running callback completes and nothing follows it.
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::SeqCst) {
            debug!("cancel");
        }
        self.shared.wake.notify_one();
        self.shared.closed.notify_waiters();

        if !self.shared.delivering_on_current_thread() {
            // wait out a callback in flight on the emission task
            drop(lock(&self.shared.gate));
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Units the publisher may still emit.
    pub fn outstanding(&self) -> u64 {
        self.shared.demand.outstanding()
    }
}

/// Returned by [`Publisher::subscribe`](super::Publisher::subscribe): the
/// subscription plus the emission task driving it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(subscription: Subscription, task: JoinHandle<()>) -> Self {
        Self { subscription, task }
    }

    /// The demand-acceptance handle shared with the subscriber.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// See [`Subscription::request`].
    pub fn request(&self, n: u64) -> Result<()> {
        self.subscription.request(n)
    }

    /// See [`Subscription::cancel`].
    pub fn cancel(&self) {
        self.subscription.cancel()
    }

    /// Whether the emission task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the emission task to finish, by termination or cancellation.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| FlowError::Aborted(e.to_string()))
    }
}
