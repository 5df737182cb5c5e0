//! demandflow - bounded-demand publisher/subscriber streams
//!
//! A [`Publisher`] pushes items to a single [`Subscriber`] and never emits
//! more than the subscriber has requested through its [`Subscription`].
//! [`BoundedConsumer`] is the stock subscriber: it keeps one fixed-size
//! window of demand outstanding and renews it each time the window is
//! consumed.
//!
//! # Example
//!
//! ```rust,no_run
//! use demandflow::{BoundedConsumer, Publisher};
//!
//! #[tokio::main]
//! async fn main() -> demandflow::Result<()> {
//!     let consumer = BoundedConsumer::new(2, |item: i64| println!("got {item}"))?;
//!     let stats = consumer.stats();
//!
//!     Publisher::range(1, 10)?.subscribe(consumer).join().await?;
//!
//!     assert_eq!(stats.items_received(), 10);
//!     assert_eq!(stats.demand_requests(), 6);
//!     Ok(())
//! }
//! ```
//!
//! # Pull-side consumption
//!
//! ```rust,no_run
//! use demandflow::{Publisher, bounded_stream};
//! use futures_util::StreamExt;
//!
//! # async fn run() -> demandflow::Result<()> {
//! let mut items = bounded_stream(Publisher::range(1, 100)?, 8)?;
//! while let Some(item) = items.next().await {
//!     println!("{}", item?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backpressure;
pub mod config;
pub mod consumer;
pub mod demand;
pub mod error;
pub mod publisher;
pub mod telemetry;
pub mod traits;
mod version;

pub use backpressure::{BoundedStream, bounded_stream};
pub use consumer::{BoundedConsumer, ConsumerState, ConsumerStats, ItemHandler, StatsSnapshot};
pub use demand::{DemandCounter, UNBOUNDED};
pub use error::{FlowError, Result};
pub use publisher::{Publisher, Subscription, SubscriptionHandle};
pub use traits::Subscriber;
pub use version::{PKG_VERSION, version_string};
