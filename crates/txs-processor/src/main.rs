use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use txs_processor::source::{BlockSource, JsonLinesBlockSource, QueueBlockSource, spawn_forwarder};
use txs_processor::store::traits::StatsStore;
use txs_processor::{Config, InMemoryStatsStore, Processor};

#[derive(Parser, Debug)]
#[command(rename_all = "kebab-case", version)]
struct Args {
    /// Newline-delimited JSON blocks; `-` reads stdin.
    #[arg(long, default_value = "-")]
    input: String,
    /// JSON config file, overlaid by TXS_PROCESSOR_* variables and flags.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    queue_capacity: Option<usize>,
    #[arg(long)]
    max_retries: Option<u32>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let base = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let mut config = base.with_env()?;
    if let Some(url) = &args.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(capacity) = args.queue_capacity {
        config.queue_capacity = capacity;
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    config.validate()?;
    Ok(config)
}

async fn open_input(input: &str) -> anyhow::Result<Box<dyn BlockSource>> {
    if input == "-" {
        return Ok(Box::new(JsonLinesBlockSource::new(BufReader::new(
            tokio::io::stdin(),
        ))));
    }
    let source = JsonLinesBlockSource::open(&PathBuf::from(input))
        .await
        .with_context(|| format!("opening {input}"))?;
    Ok(Box::new(source))
}

async fn run<S: StatsStore + 'static>(
    config: Config,
    store: Arc<S>,
    upstream: Box<dyn BlockSource>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (tx, mut queue) = QueueBlockSource::new(config.queue_capacity)?;
    let forwarder = spawn_forwarder(upstream, tx);

    let mut processor = Processor::new(config, store);
    let summary = processor.run(&mut queue, shutdown).await;
    let depth = queue.depth();
    drop(queue);

    // Only a drained input guarantees the forwarder has finished; otherwise
    // it may be parked on a read that never completes.
    let drained = matches!(summary, Ok(ref s) if !s.cancelled);
    let forwarded = if drained {
        Some(forwarder.await.context("block forwarder panicked")?)
    } else {
        forwarder.abort();
        None
    };

    let counters = processor.counters().snapshot();
    info!(
        blocks = counters.blocks_committed,
        txs = counters.transactions_handled,
        ibc_recorded = counters.ibc_transfers_recorded,
        ibc_unresolved = counters.ibc_transfers_unresolved,
        commit_failures = counters.commit_failures,
        retries = counters.block_retries,
        queue_high_water = depth.max(),
        "processor stopped"
    );

    let summary = summary?;
    if summary.cancelled {
        warn!(committed = summary.blocks_committed, "stopped by shutdown signal");
    }
    if let Some(forwarded) = forwarded {
        let forwarded = forwarded?;
        info!(forwarded, "input drained");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let upstream = open_input(&args.input).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, finishing current block");
            signal_token.cancel();
        }
    });

    match config.database_url.clone() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = txs_processor::store::postgres::PgStatsStore::connect(&url).await?;
            store.ensure_schema().await?;
            run(config, Arc::new(store), upstream, shutdown).await
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => anyhow::bail!("database_url is set but this build lacks the `postgres` feature"),
        None => {
            info!("no database_url configured, using in-memory store");
            run(config, Arc::new(InMemoryStatsStore::new()), upstream, shutdown).await
        }
    }
}
