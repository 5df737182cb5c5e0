//! Pull-side backpressure: a publisher consumed as a `Stream`.
//!
//! [`bounded_stream`] subscribes to a [`Publisher`] and exposes its items as
//! a [`futures_util::Stream`]. Demand is granted one window at a time, and
//! only as the reader actually pulls items, so a slow reader holds the
//! publisher to at most `batch_size` queued items. This is the pull
//! counterpart of [`BoundedConsumer`](crate::BoundedConsumer).
//!
//! Dropping the stream cancels the subscription.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, ready};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::publisher::{Publisher, Subscription};
use crate::traits::Subscriber;
use crate::{FlowError, Result};

enum Signal<T> {
    Next(T),
    Error(FlowError),
    Complete,
}

/// Forwards publisher signals into the stream's queue.
struct Forwarder<T> {
    tx: mpsc::UnboundedSender<Signal<T>>,
    batch_size: u64,
    subscription: Option<Subscription>,
}

impl<T> Forwarder<T> {
    fn forward(&mut self, signal: Signal<T>) {
        if self.tx.send(signal).is_err() {
            debug!("stream reader dropped, cancelling");
            if let Some(subscription) = self.subscription.take() {
                subscription.cancel();
            }
        }
    }
}

impl<T: Send> Subscriber<T> for Forwarder<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        if let Err(e) = subscription.request(self.batch_size) {
            warn!(error = %e, "initial window rejected");
        }
        self.subscription = Some(subscription);
    }

    fn on_next(&mut self, item: T) {
        self.forward(Signal::Next(item));
    }

    fn on_error(&mut self, error: FlowError) {
        self.forward(Signal::Error(error));
    }

    fn on_complete(&mut self) {
        self.forward(Signal::Complete);
    }
}

pin_project! {
    /// Stream over a publisher's items with windowed demand.
    ///
    /// Created by [`bounded_stream`].
    pub struct BoundedStream<T> {
        #[pin]
        rx: UnboundedReceiverStream<Signal<T>>,
        subscription: Subscription,
        batch_size: u64,
        consumed: u64,
        done: bool,
    }

    impl<T> PinnedDrop for BoundedStream<T> {
        fn drop(this: Pin<&mut Self>) {
            this.subscription.cancel();
        }
    }
}

impl<T> BoundedStream<T> {
    /// The underlying subscription.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<T> Stream for BoundedStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        match ready!(this.rx.poll_next(cx)) {
            Some(Signal::Next(item)) => {
                *this.consumed += 1;
                if *this.consumed == *this.batch_size {
                    *this.consumed = 0;
                    if let Err(e) = this.subscription.request(*this.batch_size) {
                        warn!(error = %e, "window renewal rejected");
                    }
                }
                Poll::Ready(Some(Ok(item)))
            }
            Some(Signal::Error(error)) => {
                *this.done = true;
                Poll::Ready(Some(Err(error)))
            }
            Some(Signal::Complete) | None => {
                *this.done = true;
                Poll::Ready(None)
            }
        }
    }
}

/// Consume `publisher` as a stream, granting `batch_size` items per window.
///
/// Fails with [`FlowError::InvalidDemand`] when `batch_size == 0`.
///
/// # Panics
///
/// Requires a tokio runtime context.
pub fn bounded_stream<T: Send + 'static>(
    publisher: Publisher<T>,
    batch_size: u64,
) -> Result<BoundedStream<T>> {
    if batch_size == 0 {
        return Err(FlowError::InvalidDemand {
            requested: batch_size,
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let handle = publisher.subscribe(Forwarder {
        tx,
        batch_size,
        subscription: None,
    });

    Ok(BoundedStream {
        rx: UnboundedReceiverStream::new(rx),
        subscription: handle.subscription().clone(),
        batch_size,
        consumed: 0,
        done: false,
    })
}
