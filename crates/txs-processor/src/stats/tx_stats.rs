use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use crate::domain::keys::hour_bucket;
use crate::domain::types::Coin;

/// Role flags for one observed address. Duplicates are kept as-is; the store
/// OR-merges flags per (address, chain, hour).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressData {
    pub address: String,
    pub internal_tx: bool,
    pub ibc_inbound: bool,
    pub ibc_outbound: bool,
}

impl AddressData {
    pub fn internal(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            internal_tx: true,
            ..Self::default()
        }
    }

    /// `source` is true when the transfer leaves the local chain.
    pub fn ibc(address: impl Into<String>, source: bool) -> Self {
        Self {
            address: address.into(),
            internal_tx: false,
            ibc_inbound: !source,
            ibc_outbound: source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStats {
    pub chain_id: String,
    pub hour: DateTime<Utc>,
    pub count: u64,
    pub tx_with_ibc_transfer: u64,
    pub tx_with_ibc_transfer_fail: u64,
    pub addresses: Vec<AddressData>,
    pub turnover_amount: BigUint,
}

impl TxStats {
    pub fn new(chain_id: impl Into<String>, block_time: DateTime<Utc>) -> Self {
        Self {
            chain_id: chain_id.into(),
            hour: hour_bucket(block_time),
            count: 0,
            tx_with_ibc_transfer: 0,
            tx_with_ibc_transfer_fail: 0,
            addresses: Vec::new(),
            turnover_amount: BigUint::default(),
        }
    }

    pub fn add_turnover(&mut self, coins: &[Coin]) {
        for coin in coins {
            self.turnover_amount += &coin.amount;
        }
    }

    pub fn record_address(&mut self, address: AddressData) {
        self.addresses.push(address);
    }
}
