use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::types::Block;
use crate::error::{Error, Result};
use crate::ingest::validator::BlockValidator;
use crate::stats::StatsAccumulator;
use crate::store::mutations::{
    ActiveAddressRow, BlockMarker, BlockMutations, ChannelRow, ChannelStateUpdate, ClientRow,
    ConnectionRow, IbcCashflowDelta, IbcStatsDelta, TxStatsDelta,
};
use crate::store::traits::StatsStore;
use crate::topology::{TopologyCache, TopologyDelta};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub chain_id: String,
    pub height: u64,
    pub transactions: u64,
    /// Transfers recorded in IBC rows, failed ones included.
    pub ibc_transfers: u64,
    /// Transfers skipped because the counterparty has no chain id.
    pub ibc_unresolved: u64,
    pub active_addresses: usize,
    pub ibc_rows: usize,
    pub cashflow_rows: usize,
}

/// Turns one block's accumulated state into a single atomic store write and
/// resets the per-block state once the write is durable.
pub struct CommitCoordinator<S> {
    store: S,
}

impl<S: StatsStore> CommitCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn commit(
        &self,
        block: &Block,
        stats: &mut StatsAccumulator,
        topology: &mut TopologyCache,
        validator: &mut BlockValidator,
    ) -> Result<CommitOutcome> {
        let mutations = build_mutations(block, stats, topology.pending(), Utc::now())?;
        let outcome = CommitOutcome {
            chain_id: block.chain_id.clone(),
            height: block.height,
            transactions: mutations.tx_stats.as_ref().map_or(0, |s| s.count),
            ibc_transfers: mutations.ibc_stats.iter().map(|r| r.transfers).sum(),
            ibc_unresolved: stats.unresolved_ibc(),
            active_addresses: mutations.active_addresses.len(),
            ibc_rows: mutations.ibc_stats.len(),
            cashflow_rows: mutations.ibc_cashflow.len(),
        };

        debug!(
            chain_id = %block.chain_id,
            height = block.height,
            clients = mutations.clients.len(),
            connections = mutations.connections.len(),
            channels = mutations.channels.len(),
            "applying block mutations"
        );
        // Nothing below runs unless the whole set is durable.
        self.store.apply(&mutations).await?;

        stats.reset();
        topology.clear_pending();
        validator.mark_committed(&block.chain_id, block.height);

        info!(
            chain_id = %outcome.chain_id,
            height = outcome.height,
            txs = outcome.transactions,
            ibc_rows = outcome.ibc_rows,
            "block committed"
        );
        Ok(outcome)
    }
}

pub fn build_mutations(
    block: &Block,
    stats: &StatsAccumulator,
    topology: &TopologyDelta,
    updated_at: DateTime<Utc>,
) -> Result<BlockMutations> {
    let chain_id = block.chain_id.as_str();
    if block.height == 0 {
        return Err(Error::Commit(format!("{chain_id}: block height 0 cannot be committed")));
    }

    let mut tx_stats = None;
    let mut active_addresses = Vec::new();
    if let Some(s) = stats.tx_stats() {
        if s.chain_id != chain_id {
            return Err(Error::Commit(format!(
                "tx stats accumulated for {} while committing {chain_id}",
                s.chain_id
            )));
        }
        active_addresses = s
            .addresses
            .iter()
            .map(|a| ActiveAddressRow {
                chain_id: chain_id.to_string(),
                hour: s.hour,
                address: a.address.clone(),
                internal_tx: a.internal_tx,
                ibc_inbound: a.ibc_inbound,
                ibc_outbound: a.ibc_outbound,
            })
            .collect();
        tx_stats = Some(TxStatsDelta {
            chain_id: chain_id.to_string(),
            hour: s.hour,
            count: s.count,
            tx_with_ibc_transfer: s.tx_with_ibc_transfer,
            tx_with_ibc_transfer_fail: s.tx_with_ibc_transfer_fail,
            turnover_amount: s.turnover_amount.clone(),
        });
    }

    let implicit_zones: BTreeSet<String> = topology
        .clients
        .values()
        .filter(|c| !c.is_empty())
        .cloned()
        .collect();

    let clients = topology
        .clients
        .iter()
        .map(|(id, counterparty)| ClientRow {
            chain_id: id.chain_id.clone(),
            client_id: id.id.clone(),
            counterparty_chain_id: Some(counterparty.clone()).filter(|c| !c.is_empty()),
        })
        .collect();
    let connections = topology
        .connections
        .iter()
        .map(|(id, client_id)| ConnectionRow {
            chain_id: id.chain_id.clone(),
            connection_id: id.id.clone(),
            client_id: client_id.clone(),
        })
        .collect();
    let channels = topology
        .channels
        .iter()
        .map(|(id, link)| ChannelRow {
            chain_id: id.chain_id.clone(),
            channel_id: id.id.clone(),
            connection_id: link.connection_id.clone(),
            counterparty_channel_id: link.counterparty_channel_id.clone(),
        })
        .collect();
    let channel_states = topology
        .states
        .iter()
        .map(|(id, state)| ChannelStateUpdate {
            chain_id: id.chain_id.clone(),
            channel_id: id.id.clone(),
            is_opened: state.is_opened,
            counterparty_channel_id: state.counterparty_channel_id.clone(),
        })
        .collect();

    let mut ibc_stats = Vec::new();
    let mut ibc_cashflow = Vec::new();
    for row in stats.flatten_ibc() {
        for (denom, amount) in &row.coins {
            ibc_cashflow.push(IbcCashflowDelta {
                chain_id: chain_id.to_string(),
                source: row.source.clone(),
                destination: row.destination.clone(),
                channel_id: row.channel_id.clone(),
                hour: row.hour,
                denom: denom.clone(),
                amount: amount.clone(),
            });
        }
        ibc_stats.push(IbcStatsDelta {
            chain_id: chain_id.to_string(),
            source: row.source,
            destination: row.destination,
            channel_id: row.channel_id,
            hour: row.hour,
            transfers: row.transfers,
            failed_transfers: row.failed_transfers,
        });
    }

    Ok(BlockMutations {
        chain_id: chain_id.to_string(),
        implicit_zones: implicit_zones.into_iter().collect(),
        tx_stats,
        active_addresses,
        clients,
        connections,
        channels,
        channel_states,
        ibc_stats,
        ibc_cashflow,
        marker: BlockMarker {
            chain_id: chain_id.to_string(),
            expected_prior_height: block.height - 1,
            updated_at,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use num_bigint::BigUint;

    use super::*;
    use crate::domain::types::Coin;
    use crate::stats::AddressData;

    fn block(height: u64) -> Block {
        Block {
            chain_id: "cosmoshub".to_string(),
            height,
            time: Utc.with_ymd_and_hms(2023, 1, 1, 10, 15, 0).single().expect("time"),
            txs: Vec::new(),
        }
    }

    #[test]
    fn empty_block_only_advances_marker() {
        let b = block(7);
        let m = build_mutations(&b, &StatsAccumulator::new(), &TopologyDelta::default(), b.time)
            .expect("mutations");
        assert!(m.tx_stats.is_none());
        assert!(m.active_addresses.is_empty());
        assert!(m.ibc_stats.is_empty());
        assert_eq!(m.marker.expected_prior_height, 6);
        assert_eq!(m.marker.next_height(), 7);
    }

    #[test]
    fn cashflow_rows_follow_denoms_of_successful_transfers() {
        let b = block(2);
        let mut stats = StatsAccumulator::new();
        stats.append_transfer(
            "cosmoshub",
            b.time,
            &[Coin::new("uatom", 5u32)],
            AddressData::internal("addr"),
        );
        stats.append_ibc(
            "cosmoshub",
            "osmosis",
            b.time,
            "channel-141",
            false,
            &[Coin::new("uatom", 3u32), Coin::new("uosmo", 4u32)],
        );
        stats.append_ibc("osmosis", "cosmoshub", b.time, "channel-141", true, &[]);

        let m = build_mutations(&b, &stats, &TopologyDelta::default(), b.time).expect("mutations");
        assert_eq!(m.ibc_stats.len(), 2);
        assert_eq!(m.ibc_cashflow.len(), 2);
        assert!(m.ibc_cashflow.iter().all(|r| r.source == "cosmoshub"));
        let tx = m.tx_stats.expect("tx stats");
        assert_eq!(tx.turnover_amount, BigUint::from(5u32));
        assert_eq!(m.active_addresses.len(), 1);
    }

    #[test]
    fn foreign_tx_stats_are_a_commit_error() {
        let b = block(2);
        let mut stats = StatsAccumulator::new();
        let _ = stats.tx_stats_mut("osmosis", b.time);
        let err = build_mutations(&b, &stats, &TopologyDelta::default(), b.time)
            .expect_err("chain mismatch");
        assert!(matches!(err, Error::Commit(_)));
    }
}
