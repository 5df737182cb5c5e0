//! demandflow — single demonstration run of the bounded-demand protocol.
//!
//! Publishes an integer range (optionally ending in an injected fault) to a
//! [`BoundedConsumer`](demandflow::BoundedConsumer) that logs every item.
//! Stream errors are logged; the process still exits successfully.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use demandflow::BoundedConsumer;
use demandflow::config::Config;

/// Run one bounded-demand stream and log its signals.
#[derive(Parser)]
#[command(name = "demandflow")]
#[command(version = demandflow::PKG_VERSION)]
#[command(about = "Bounded-demand stream demonstration")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First published value.
    #[arg(long)]
    start: Option<i64>,

    /// Number of published values.
    #[arg(long)]
    count: Option<u64>,

    /// Items requested per window.
    #[arg(short, long, env = "DEMANDFLOW_BATCH_SIZE")]
    batch_size: Option<u64>,

    /// Fail the source after this many values.
    #[arg(long)]
    fail_after: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(start) = self.start {
            config.source.start = start;
        }
        if let Some(count) = self.count {
            config.source.count = count;
        }
        if let Some(batch_size) = self.batch_size {
            config.consumer.batch_size = batch_size;
        }
        if self.fail_after.is_some() {
            config.source.fail_after = self.fail_after;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .init();

    info!(
        version = demandflow::version_string(),
        start = config.source.start,
        count = config.source.count,
        batch_size = config.consumer.batch_size,
        "demandflow starting"
    );

    let consumer = BoundedConsumer::new(config.consumer.batch_size, |item: i64| {
        info!(item, "received");
    })?;
    let stats = consumer.stats();

    config.source.publisher()?.subscribe(consumer).join().await?;

    let summary = stats.snapshot();
    info!(
        state = ?summary.state,
        items = summary.items_received,
        requests = summary.demand_requests,
        "demonstration finished"
    );

    Ok(())
}
