mod ibc;
mod tx_stats;

pub use ibc::{IbcCounters, IbcData, IbcStatsRow};
pub use tx_stats::{AddressData, TxStats};

use chrono::{DateTime, Utc};

use crate::domain::types::Coin;

/// Per-block statistics. Everything here is flushed by one commit and then
/// reset; nothing survives across blocks.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    tx_stats: Option<TxStats>,
    ibc: IbcData,
    unresolved_ibc: u64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily opens the chain-hour row on the first transaction of a block.
    pub fn tx_stats_mut(&mut self, chain_id: &str, block_time: DateTime<Utc>) -> &mut TxStats {
        self.tx_stats
            .get_or_insert_with(|| TxStats::new(chain_id, block_time))
    }

    pub fn tx_stats(&self) -> Option<&TxStats> {
        self.tx_stats.as_ref()
    }

    pub fn append_transfer(
        &mut self,
        chain_id: &str,
        block_time: DateTime<Utc>,
        coins: &[Coin],
        address: AddressData,
    ) {
        let stats = self.tx_stats_mut(chain_id, block_time);
        stats.add_turnover(coins);
        stats.record_address(address);
    }

    pub fn append_ibc(
        &mut self,
        source: &str,
        destination: &str,
        time: DateTime<Utc>,
        channel_id: &str,
        is_failed: bool,
        coins: &[Coin],
    ) {
        self.ibc
            .append(source, destination, time, channel_id, is_failed, coins);
    }

    /// Transfer over a channel whose counterparty has no chain id.
    pub fn note_unresolved_ibc(&mut self) {
        self.unresolved_ibc += 1;
    }

    pub fn unresolved_ibc(&self) -> u64 {
        self.unresolved_ibc
    }

    pub fn flatten_ibc(&self) -> Vec<IbcStatsRow> {
        self.ibc.flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_stats.is_none() && self.ibc.is_empty() && self.unresolved_ibc == 0
    }

    pub fn reset(&mut self) {
        self.tx_stats = None;
        self.ibc.clear();
        self.unresolved_ibc = 0;
    }
}
