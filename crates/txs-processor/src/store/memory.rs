use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::store::mutations::BlockMutations;
use crate::store::traits::{StatsStore, TopologyLookup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRecord {
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxStatsTotals {
    pub count: u64,
    pub tx_with_ibc_transfer: u64,
    pub tx_with_ibc_transfer_fail: u64,
    pub turnover_amount: BigUint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressFlags {
    pub internal_tx: bool,
    pub ibc_inbound: bool,
    pub ibc_outbound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub connection_id: String,
    pub is_opened: bool,
    pub counterparty_channel_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IbcTotals {
    pub transfers: u64,
    pub failed_transfers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IbcRowKey {
    pub chain_id: String,
    pub source: String,
    pub destination: String,
    pub channel_id: String,
    pub hour: DateTime<Utc>,
}

type ZoneScoped = (String, String);

#[derive(Default)]
struct Tables {
    zones: HashMap<String, ZoneRecord>,
    blocks_log: HashMap<String, u64>,
    tx_stats: HashMap<(String, DateTime<Utc>), TxStatsTotals>,
    active_addresses: HashMap<(String, DateTime<Utc>, String), AddressFlags>,
    clients: HashMap<ZoneScoped, Option<String>>,
    connections: HashMap<ZoneScoped, String>,
    channels: HashMap<ZoneScoped, ChannelRecord>,
    ibc_stats: HashMap<IbcRowKey, IbcTotals>,
    ibc_cashflow: HashMap<(IbcRowKey, String), BigUint>,
}

impl Tables {
    fn chain_id_by_client(&self, client_id: &str, origin: &str) -> Option<String> {
        self.clients
            .get(&scoped(origin, client_id))
            .cloned()
            .flatten()
            .filter(|c| !c.is_empty())
    }

    fn chain_id_by_connection(&self, connection_id: &str, origin: &str) -> Option<String> {
        let client_id = self.connections.get(&scoped(origin, connection_id))?;
        self.chain_id_by_client(client_id, origin)
    }
}

/// Store with the same mutation semantics as the relational backend, kept in
/// process memory. Every `apply` runs under one write lock, so a rejected
/// marker leaves all tables untouched.
#[derive(Default)]
pub struct InMemoryStatsStore {
    inner: RwLock<Tables>,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| Error::Backend("poisoned lock".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| Error::Backend("poisoned lock".to_string()))
    }

    pub fn set_last_processed_height(&self, chain_id: &str, height: u64) -> Result<()> {
        self.write()?.blocks_log.insert(chain_id.to_string(), height);
        Ok(())
    }

    pub fn seed_client(&self, origin: &str, client_id: &str, chain_id: &str) -> Result<()> {
        self
            .write()?
            .clients
            .insert(scoped(origin, client_id), Some(chain_id.to_string()));
        Ok(())
    }

    pub fn seed_connection(&self, origin: &str, connection_id: &str, client_id: &str) -> Result<()> {
        self
            .write()?
            .connections
            .insert(scoped(origin, connection_id), client_id.to_string());
        Ok(())
    }

    pub fn seed_channel(
        &self,
        origin: &str,
        channel_id: &str,
        connection_id: &str,
        is_opened: bool,
    ) -> Result<()> {
        self.write()?.channels.insert(
            scoped(origin, channel_id),
            ChannelRecord {
                connection_id: connection_id.to_string(),
                is_opened,
                counterparty_channel_id: None,
            },
        );
        Ok(())
    }

    pub fn zone(&self, chain_id: &str) -> Result<Option<ZoneRecord>> {
        Ok(self.read()?.zones.get(chain_id).cloned())
    }

    pub fn tx_stats(&self, chain_id: &str, hour: DateTime<Utc>) -> Result<Option<TxStatsTotals>> {
        Ok(self
            .read()?
            .tx_stats
            .get(&(chain_id.to_string(), hour))
            .cloned())
    }

    pub fn active_address(
        &self,
        chain_id: &str,
        hour: DateTime<Utc>,
        address: &str,
    ) -> Result<Option<AddressFlags>> {
        Ok(self
            .read()?
            .active_addresses
            .get(&(chain_id.to_string(), hour, address.to_string()))
            .copied())
    }

    pub fn active_address_count(&self) -> Result<usize> {
        Ok(self.read()?.active_addresses.len())
    }

    pub fn client(&self, origin: &str, client_id: &str) -> Result<Option<Option<String>>> {
        Ok(self.read()?.clients.get(&scoped(origin, client_id)).cloned())
    }

    pub fn connection(&self, origin: &str, connection_id: &str) -> Result<Option<String>> {
        Ok(self
            .read()?
            .connections
            .get(&scoped(origin, connection_id))
            .cloned())
    }

    pub fn channel(&self, origin: &str, channel_id: &str) -> Result<Option<ChannelRecord>> {
        Ok(self.read()?.channels.get(&scoped(origin, channel_id)).cloned())
    }

    pub fn ibc_stats(&self, key: &IbcRowKey) -> Result<Option<IbcTotals>> {
        Ok(self.read()?.ibc_stats.get(key).copied())
    }

    pub fn ibc_stats_len(&self) -> Result<usize> {
        Ok(self.read()?.ibc_stats.len())
    }

    pub fn ibc_cashflow(&self, key: &IbcRowKey, denom: &str) -> Result<Option<BigUint>> {
        Ok(self
            .read()?
            .ibc_cashflow
            .get(&(key.clone(), denom.to_string()))
            .cloned())
    }
}

#[async_trait::async_trait]
impl TopologyLookup for InMemoryStatsStore {
    async fn chain_id_by_client_id(
        &self,
        client_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        Ok(self.read()?.chain_id_by_client(client_id, origin_chain_id))
    }

    async fn chain_id_by_connection_id(
        &self,
        connection_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .read()?
            .chain_id_by_connection(connection_id, origin_chain_id))
    }

    async fn chain_id_by_channel_id(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        let guard = self.read()?;
        let Some(channel) = guard.channels.get(&scoped(origin_chain_id, channel_id)) else {
            return Ok(None);
        };
        Ok(guard.chain_id_by_connection(&channel.connection_id, origin_chain_id))
    }

    async fn channel_status(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<bool>> {
        Ok(self
            .read()?
            .channels
            .get(&scoped(origin_chain_id, channel_id))
            .map(|c| c.is_opened))
    }
}

#[async_trait::async_trait]
impl StatsStore for InMemoryStatsStore {
    async fn last_processed_height(&self, chain_id: &str) -> Result<u64> {
        Ok(self.read()?.blocks_log.get(chain_id).copied().unwrap_or(0))
    }

    async fn apply(&self, m: &BlockMutations) -> Result<()> {
        let mut guard = self.write()?;
        let t = &mut *guard;

        let current = t.blocks_log.get(&m.marker.chain_id).copied().unwrap_or(0);
        if current != m.marker.expected_prior_height {
            return Err(Error::CasConflict {
                chain_id: m.marker.chain_id.clone(),
                expected: m.marker.expected_prior_height,
            });
        }

        t.zones
            .entry(m.chain_id.clone())
            .or_insert(ZoneRecord { is_enabled: true })
            .is_enabled = true;
        for zone in &m.implicit_zones {
            t.zones
                .entry(zone.clone())
                .or_insert(ZoneRecord { is_enabled: false });
        }

        if let Some(stats) = &m.tx_stats {
            let row = t
                .tx_stats
                .entry((stats.chain_id.clone(), stats.hour))
                .or_default();
            row.count += stats.count;
            row.tx_with_ibc_transfer += stats.tx_with_ibc_transfer;
            row.tx_with_ibc_transfer_fail += stats.tx_with_ibc_transfer_fail;
            row.turnover_amount += &stats.turnover_amount;
        }

        for a in &m.active_addresses {
            let row = t
                .active_addresses
                .entry((a.chain_id.clone(), a.hour, a.address.clone()))
                .or_default();
            row.internal_tx |= a.internal_tx;
            row.ibc_inbound |= a.ibc_inbound;
            row.ibc_outbound |= a.ibc_outbound;
        }

        for c in &m.clients {
            t.clients
                .entry(scoped(&c.chain_id, &c.client_id))
                .or_insert_with(|| c.counterparty_chain_id.clone());
        }
        for c in &m.connections {
            t.connections
                .entry(scoped(&c.chain_id, &c.connection_id))
                .or_insert_with(|| c.client_id.clone());
        }
        for c in &m.channels {
            t.channels
                .entry(scoped(&c.chain_id, &c.channel_id))
                .or_insert_with(|| ChannelRecord {
                    connection_id: c.connection_id.clone(),
                    is_opened: false,
                    counterparty_channel_id: c.counterparty_channel_id.clone(),
                });
        }
        for s in &m.channel_states {
            // Plain UPDATE semantics: unknown channels are left alone.
            if let Some(channel) = t.channels.get_mut(&scoped(&s.chain_id, &s.channel_id)) {
                channel.is_opened = s.is_opened;
                if s.counterparty_channel_id.is_some() {
                    channel.counterparty_channel_id = s.counterparty_channel_id.clone();
                }
            }
        }

        for r in &m.ibc_stats {
            let row = t
                .ibc_stats
                .entry(IbcRowKey {
                    chain_id: r.chain_id.clone(),
                    source: r.source.clone(),
                    destination: r.destination.clone(),
                    channel_id: r.channel_id.clone(),
                    hour: r.hour,
                })
                .or_default();
            row.transfers += r.transfers;
            row.failed_transfers += r.failed_transfers;
        }
        for r in &m.ibc_cashflow {
            let key = IbcRowKey {
                chain_id: r.chain_id.clone(),
                source: r.source.clone(),
                destination: r.destination.clone(),
                channel_id: r.channel_id.clone(),
                hour: r.hour,
            };
            *t.ibc_cashflow.entry((key, r.denom.clone())).or_default() += &r.amount;
        }

        t
            .blocks_log
            .insert(m.marker.chain_id.clone(), m.marker.next_height());
        Ok(())
    }
}

fn scoped(origin: &str, id: &str) -> ZoneScoped {
    (origin.to_string(), id.to_string())
}
