use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use crate::domain::keys::IbcKey;
use crate::domain::types::Coin;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IbcCounters {
    pub transfers: u64,
    pub failed_transfers: u64,
    pub coins: BTreeMap<String, BigUint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbcStatsRow {
    pub source: String,
    pub destination: String,
    pub channel_id: String,
    pub hour: DateTime<Utc>,
    pub transfers: u64,
    pub failed_transfers: u64,
    pub coins: BTreeMap<String, BigUint>,
}

/// Inter-chain transfer counters for the block in flight, keyed by
/// (source, destination, channel, hour).
#[derive(Debug, Clone, Default)]
pub struct IbcData {
    buckets: HashMap<IbcKey, IbcCounters>,
}

impl IbcData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        source: &str,
        destination: &str,
        time: DateTime<Utc>,
        channel_id: &str,
        is_failed: bool,
        coins: &[Coin],
    ) {
        let counters = self
            .buckets
            .entry(IbcKey::new(source, destination, channel_id, time))
            .or_default();

        counters.transfers += 1;
        if is_failed {
            counters.failed_transfers += 1;
            return;
        }
        for coin in coins {
            *counters.coins.entry(coin.denom.clone()).or_default() += &coin.amount;
        }
    }

    pub fn get(&self, key: &IbcKey) -> Option<&IbcCounters> {
        self.buckets.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// One row per populated bucket, in no particular order.
    pub fn flatten(&self) -> Vec<IbcStatsRow> {
        self.buckets
            .iter()
            .map(|(key, counters)| IbcStatsRow {
                source: key.source.clone(),
                destination: key.destination.clone(),
                channel_id: key.channel_id.clone(),
                hour: key.hour,
                transfers: counters.transfers,
                failed_transfers: counters.failed_transfers,
                coins: counters.coins.clone(),
            })
            .collect()
    }
}
