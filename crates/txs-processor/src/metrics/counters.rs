use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counters {
    pub blocks_committed: AtomicU64,
    pub transactions_handled: AtomicU64,
    pub ibc_transfers_recorded: AtomicU64,
    pub ibc_transfers_unresolved: AtomicU64,
    pub commit_failures: AtomicU64,
    pub block_retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountersSnapshot {
    pub blocks_committed: u64,
    pub transactions_handled: u64,
    pub ibc_transfers_recorded: u64,
    pub ibc_transfers_unresolved: u64,
    pub commit_failures: u64,
    pub block_retries: u64,
}

impl Counters {
    pub fn inc_block(&self) {
        let _ = self.blocks_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_transactions(&self, n: u64) {
        let _ = self.transactions_handled.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_ibc_recorded(&self, n: u64) {
        let _ = self.ibc_transfers_recorded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_ibc_unresolved(&self, n: u64) {
        let _ = self.ibc_transfers_unresolved.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_commit_failure(&self) {
        let _ = self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retry(&self) {
        let _ = self.block_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            blocks_committed: self.blocks_committed.load(Ordering::Relaxed),
            transactions_handled: self.transactions_handled.load(Ordering::Relaxed),
            ibc_transfers_recorded: self.ibc_transfers_recorded.load(Ordering::Relaxed),
            ibc_transfers_unresolved: self.ibc_transfers_unresolved.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            block_retries: self.block_retries.load(Ordering::Relaxed),
        }
    }
}
