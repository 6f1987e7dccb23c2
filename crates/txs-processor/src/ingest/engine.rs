use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::types::Block;
use crate::error::{Error, Result};
use crate::ingest::commit::{CommitCoordinator, CommitOutcome};
use crate::ingest::dispatcher::MessageDispatcher;
use crate::ingest::validator::BlockValidator;
use crate::metrics::counters::Counters;
use crate::source::BlockSource;
use crate::stats::StatsAccumulator;
use crate::store::traits::StatsStore;
use crate::topology::TopologyResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StagedBlock {
    chain_id: String,
    height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub blocks_committed: u64,
    pub cancelled: bool,
}

/// Single-writer block pipeline: validate, dispatch every transaction, then
/// commit. A block whose dispatch finished stays staged until its commit
/// succeeds, so a commit retry re-applies exactly the same mutation set.
pub struct Processor<S> {
    config: Config,
    store: Arc<S>,
    validator: BlockValidator,
    resolver: TopologyResolver<Arc<S>>,
    stats: StatsAccumulator,
    committer: CommitCoordinator<Arc<S>>,
    staged: Option<StagedBlock>,
    committed: HashMap<String, u64>,
    counters: Arc<Counters>,
}

impl<S: StatsStore + 'static> Processor<S> {
    pub fn new(config: Config, store: Arc<S>) -> Self {
        Self {
            config,
            validator: BlockValidator::new(),
            resolver: TopologyResolver::new(store.clone()),
            stats: StatsAccumulator::new(),
            committer: CommitCoordinator::new(store.clone()),
            staged: None,
            committed: HashMap::new(),
            counters: Arc::new(Counters::default()),
            store,
        }
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    pub fn stats(&self) -> &StatsAccumulator {
        &self.stats
    }

    /// Highest height this processor committed for `chain_id`. Heights
    /// read from the store but never committed here do not count.
    pub fn committed_height(&self, chain_id: &str) -> Option<u64> {
        self.committed.get(chain_id).copied()
    }

    pub fn is_staged(&self, block: &Block) -> bool {
        self.staged.as_ref().is_some_and(|s| {
            s.chain_id == block.chain_id && s.height == block.height
        })
    }

    /// Validate and dispatch. On error the block's partial state is dropped;
    /// nothing durable has changed.
    pub async fn prepare_block(&mut self, block: &Block) -> Result<()> {
        self.validator.validate(&*self.store, block).await?;
        if self.is_staged(block) {
            return Ok(());
        }

        self.discard_staged();
        if let Err(err) = self.dispatch_all(block).await {
            self.discard_staged();
            return Err(err);
        }
        self.staged = Some(StagedBlock {
            chain_id: block.chain_id.clone(),
            height: block.height,
        });
        Ok(())
    }

    async fn dispatch_all(&mut self, block: &Block) -> Result<()> {
        let mut dispatcher = MessageDispatcher::new(&mut self.resolver, &mut self.stats);
        for tx in &block.txs {
            dispatcher.handle(&block.chain_id, block.time, tx).await?;
        }
        Ok(())
    }

    fn discard_staged(&mut self) {
        self.staged = None;
        self.stats.reset();
        self.resolver.cache_mut().clear_pending();
    }

    /// Must follow a successful `prepare_block` for the same block. Leaves
    /// the staged state untouched when the store rejects the write.
    pub async fn commit_block(&mut self, block: &Block) -> Result<CommitOutcome> {
        if !self.is_staged(block) {
            return Err(Error::Commit(format!(
                "{} height {} committed without being prepared",
                block.chain_id, block.height
            )));
        }
        let result = self
            .committer
            .commit(
                block,
                &mut self.stats,
                self.resolver.cache_mut(),
                &mut self.validator,
            )
            .await;
        match result {
            Ok(outcome) => {
                self.staged = None;
                self.committed.insert(outcome.chain_id.clone(), outcome.height);
                self.counters.inc_block();
                self.counters.add_transactions(outcome.transactions);
                self.counters.add_ibc_recorded(outcome.ibc_transfers);
                self.counters.add_ibc_unresolved(outcome.ibc_unresolved);
                Ok(outcome)
            }
            Err(err) => {
                self.counters.inc_commit_failure();
                Err(err)
            }
        }
    }

    pub async fn process_block(&mut self, block: &Block) -> Result<CommitOutcome> {
        self.prepare_block(block).await?;
        self.commit_block(block).await
    }

    /// Consumes `source` until it ends or `shutdown` fires. Cancellation is
    /// honoured while waiting for a block, during dispatch and between
    /// retries, never inside a commit.
    pub async fn run<B: BlockSource + ?Sized>(
        &mut self,
        source: &mut B,
        shutdown: CancellationToken,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                next = source.next_block() => Some(next?),
            };
            let block = match next {
                None => {
                    info!(committed = summary.blocks_committed, "shutdown requested");
                    summary.cancelled = true;
                    return Ok(summary);
                }
                Some(None) => {
                    info!(committed = summary.blocks_committed, "block source exhausted");
                    return Ok(summary);
                }
                Some(Some(block)) => block,
            };

            match self.process_with_retry(&block, &shutdown).await {
                Ok(_) => summary.blocks_committed += 1,
                Err(Error::Cancelled) => {
                    info!(
                        chain_id = %block.chain_id,
                        height = block.height,
                        "shutdown requested before commit"
                    );
                    summary.cancelled = true;
                    return Ok(summary);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn process_with_retry(
        &mut self,
        block: &Block,
        shutdown: &CancellationToken,
    ) -> Result<CommitOutcome> {
        let mut attempt = 0u32;
        loop {
            let prepared = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Err(Error::Cancelled),
                res = self.prepare_block(block) => res,
            };
            let result = match prepared {
                Ok(()) => self.commit_block(block).await,
                Err(Error::Cancelled) => {
                    self.discard_staged();
                    return Err(Error::Cancelled);
                }
                Err(err) => Err(err),
            };

            let err = match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => err,
                Err(err) => return Err(err),
            };

            attempt += 1;
            self.counters.inc_retry();
            let delay_ms = self.config.backoff_ms(attempt);
            warn!(
                chain_id = %block.chain_id,
                height = block.height,
                attempt,
                delay_ms,
                %err,
                "block failed, retrying"
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.discard_staged();
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
        }
    }
}
