//! The consumer-facing callback contract.

use crate::FlowError;
use crate::publisher::Subscription;

/// Receiver of a publisher's signals.
///
/// Callbacks for one subscription run one at a time, never concurrently.
/// `on_subscribe` runs synchronously on the thread that called
/// [`Publisher::subscribe`](crate::Publisher::subscribe); every later
/// callback runs on the publisher's emission task:
///
/// - `on_subscribe` exactly once, before anything else
/// - `on_next` at most as many times as demand was requested
/// - then at most one of `on_complete` / `on_error`, with or without
///   outstanding demand
///
/// A panic inside `on_subscribe` or `on_next` ends the stream with
/// `on_error(FlowError::Aborted(..))`. A panic inside a terminal callback is
/// logged and swallowed.
///
/// Implementations may call [`Subscription::request`] and
/// [`Subscription::cancel`] from inside any of these callbacks.
pub trait Subscriber<T>: Send {
    /// Called once with the handle used to request demand.
    fn on_subscribe(&mut self, subscription: Subscription);

    /// Called for each emitted item, in source order.
    fn on_next(&mut self, item: T);

    /// Terminal: the source failed.
    fn on_error(&mut self, error: FlowError);

    /// Terminal: the source is exhausted.
    fn on_complete(&mut self);
}
