use crate::domain::types::Block;
use crate::error::Result;
use crate::ingest::commit::CommitOutcome;
use crate::ingest::engine::Processor;
use crate::metrics::counters::CountersSnapshot;
use crate::store::traits::StatsStore;

/// Block-at-a-time surface of the processor, for callers that drive their
/// own loop instead of handing over a [`crate::source::BlockSource`].
#[async_trait::async_trait]
pub trait BlockProcessor: Send {
    async fn process(&mut self, block: &Block) -> Result<CommitOutcome>;
    /// Highest height committed by this process for `chain_id`.
    fn committed_height(&self, chain_id: &str) -> Option<u64>;
    fn counters(&self) -> CountersSnapshot;
}

#[async_trait::async_trait]
impl<S: StatsStore + 'static> BlockProcessor for Processor<S> {
    async fn process(&mut self, block: &Block) -> Result<CommitOutcome> {
        self.process_block(block).await
    }

    fn committed_height(&self, chain_id: &str) -> Option<u64> {
        Processor::committed_height(self, chain_id)
    }

    fn counters(&self) -> CountersSnapshot {
        Processor::counters(self).snapshot()
    }
}
