use chrono::{DateTime, Utc};
use num_bigint::BigUint;

/// Everything one block commit writes. Stores must apply it atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMutations {
    /// Chain that produced the block; upserted as an enabled zone.
    pub chain_id: String,
    /// Counterparty chains first seen through client creation; inserted
    /// disabled and left alone if they already exist.
    pub implicit_zones: Vec<String>,
    pub tx_stats: Option<TxStatsDelta>,
    pub active_addresses: Vec<ActiveAddressRow>,
    pub clients: Vec<ClientRow>,
    pub connections: Vec<ConnectionRow>,
    pub channels: Vec<ChannelRow>,
    pub channel_states: Vec<ChannelStateUpdate>,
    pub ibc_stats: Vec<IbcStatsDelta>,
    pub ibc_cashflow: Vec<IbcCashflowDelta>,
    pub marker: BlockMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStatsDelta {
    pub chain_id: String,
    pub hour: DateTime<Utc>,
    pub count: u64,
    pub tx_with_ibc_transfer: u64,
    pub tx_with_ibc_transfer_fail: u64,
    pub turnover_amount: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAddressRow {
    pub chain_id: String,
    pub hour: DateTime<Utc>,
    pub address: String,
    pub internal_tx: bool,
    pub ibc_inbound: bool,
    pub ibc_outbound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRow {
    pub chain_id: String,
    pub client_id: String,
    pub counterparty_chain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRow {
    pub chain_id: String,
    pub connection_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub chain_id: String,
    pub channel_id: String,
    pub connection_id: String,
    pub counterparty_channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStateUpdate {
    pub chain_id: String,
    pub channel_id: String,
    pub is_opened: bool,
    /// Only overwrites the stored counterparty when present.
    pub counterparty_channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbcStatsDelta {
    pub chain_id: String,
    pub source: String,
    pub destination: String,
    pub channel_id: String,
    pub hour: DateTime<Utc>,
    pub transfers: u64,
    pub failed_transfers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbcCashflowDelta {
    pub chain_id: String,
    pub source: String,
    pub destination: String,
    pub channel_id: String,
    pub hour: DateTime<Utc>,
    pub denom: String,
    pub amount: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarker {
    pub chain_id: String,
    pub expected_prior_height: u64,
    pub updated_at: DateTime<Utc>,
}

impl BlockMarker {
    pub fn next_height(&self) -> u64 {
        self.expected_prior_height + 1
    }
}
