use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::message::{IbcTransfer, Message};
use crate::domain::types::Transaction;
use crate::error::{Error, Result};
use crate::stats::{AddressData, StatsAccumulator};
use crate::store::traits::TopologyLookup;
use crate::topology::TopologyResolver;

/// Routes one block's transactions into the topology cache and the stats
/// accumulator. Borrowed for the duration of a block.
pub struct MessageDispatcher<'a, L> {
    resolver: &'a mut TopologyResolver<L>,
    stats: &'a mut StatsAccumulator,
}

impl<'a, L: TopologyLookup> MessageDispatcher<'a, L> {
    pub fn new(resolver: &'a mut TopologyResolver<L>, stats: &'a mut StatsAccumulator) -> Self {
        Self { resolver, stats }
    }

    pub async fn handle(
        &mut self,
        chain_id: &str,
        block_time: DateTime<Utc>,
        tx: &Transaction,
    ) -> Result<()> {
        let Some(accepted) = tx.accepted() else {
            return Err(Error::Commit(format!(
                "transaction {:?} on {chain_id} carries no metadata",
                tx.hash
            )));
        };

        let stats = self.stats.tx_stats_mut(chain_id, block_time);
        match tx.sender() {
            Some(sender) => stats.record_address(AddressData::internal(sender)),
            None => warn!(chain_id, tx_hash = %tx.hash, "transaction has no sender"),
        }

        if !accepted {
            return self.handle_rejected(chain_id, block_time, tx).await;
        }

        let mut has_ibc_transfer = false;
        for msg in &tx.messages {
            match msg {
                Message::Transfer(transfer) => self.stats.append_transfer(
                    chain_id,
                    block_time,
                    &transfer.amount,
                    AddressData::internal(&transfer.sender),
                ),
                Message::IbcTransfer(transfer) => {
                    has_ibc_transfer = true;
                    self.stats.append_transfer(
                        chain_id,
                        block_time,
                        &transfer.amount,
                        AddressData::ibc(&transfer.sender, transfer.source),
                    );
                }
                _ => {}
            }
            self.route(chain_id, block_time, msg, false).await?;
        }

        let stats = self.stats.tx_stats_mut(chain_id, block_time);
        stats.count += 1;
        if has_ibc_transfer {
            stats.tx_with_ibc_transfer += 1;
        }
        Ok(())
    }

    /// A rejected transaction counts once, and only its first IBC transfer
    /// is attributed as a failed transfer.
    async fn handle_rejected(
        &mut self,
        chain_id: &str,
        block_time: DateTime<Utc>,
        tx: &Transaction,
    ) -> Result<()> {
        let stats = self.stats.tx_stats_mut(chain_id, block_time);
        stats.count += 1;

        let Some(transfer) = tx.messages.iter().find_map(Message::as_ibc_transfer) else {
            return Ok(());
        };
        stats.tx_with_ibc_transfer += 1;
        stats.tx_with_ibc_transfer_fail += 1;
        self.handle_ibc_transfer(chain_id, block_time, transfer, true)
            .await
    }

    async fn route(
        &mut self,
        origin: &str,
        block_time: DateTime<Utc>,
        msg: &Message,
        is_failed: bool,
    ) -> Result<()> {
        if let Message::IbcTransfer(transfer) = msg {
            return self
                .handle_ibc_transfer(origin, block_time, transfer, is_failed)
                .await;
        }

        let cache = self.resolver.cache_mut();
        match msg {
            Message::Transfer(_) | Message::IbcTransfer(_) | Message::Other => {}
            Message::CreateClient(m) => cache.record_client(origin, &m.client_id, &m.chain_id),
            Message::CreateConnection(m) => {
                cache.record_connection(origin, &m.connection_id, &m.client_id)
            }
            Message::CreateChannel(m) => cache.record_channel(
                origin,
                &m.channel_id,
                &m.connection_id,
                m.counterparty_channel_id.as_deref(),
            ),
            Message::OpenChannel(m) => cache.record_channel_state(
                origin,
                &m.channel_id,
                true,
                m.counterparty_channel_id.as_deref(),
            ),
            Message::CloseChannel(m) => {
                cache.record_channel_state(origin, &m.channel_id, false, None)
            }
        }
        Ok(())
    }

    async fn handle_ibc_transfer(
        &mut self,
        origin: &str,
        block_time: DateTime<Utc>,
        transfer: &IbcTransfer,
        is_failed: bool,
    ) -> Result<()> {
        let Some(counterparty) = self.resolver.chain_id(&transfer.channel_id, origin).await? else {
            // Solo machines and other counterparties without a chain id.
            debug!(
                origin,
                channel_id = %transfer.channel_id,
                "skipping transfer over channel without counterparty chain"
            );
            self.stats.note_unresolved_ibc();
            return Ok(());
        };

        // Closed or unknown channels are still recorded; those transfers need
        // recalculating once frozen-transfer handling exists.
        match self.resolver.channel_status(&transfer.channel_id, origin).await {
            Ok(true) => {}
            Ok(false) => warn!(
                origin,
                channel_id = %transfer.channel_id,
                "recording transfer over closed or unknown channel"
            ),
            Err(err) => warn!(
                origin,
                channel_id = %transfer.channel_id,
                %err,
                "channel status lookup failed, recording transfer anyway"
            ),
        }

        let (source, destination) = if transfer.source {
            (origin, counterparty.as_str())
        } else {
            (counterparty.as_str(), origin)
        };
        self.stats.append_ibc(
            source,
            destination,
            block_time,
            &transfer.channel_id,
            is_failed,
            &transfer.amount,
        );
        Ok(())
    }
}
