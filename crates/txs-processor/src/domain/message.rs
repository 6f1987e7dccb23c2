use serde::{Deserialize, Serialize};

use crate::domain::types::Coin;

/// Transaction messages the processor understands. Anything else the watcher
/// emits decodes to `Other` and is ignored by dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Transfer(Transfer),
    IbcTransfer(IbcTransfer),
    CreateClient(CreateClient),
    CreateConnection(CreateConnection),
    CreateChannel(CreateChannel),
    OpenChannel(OpenChannel),
    CloseChannel(CloseChannel),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IbcTransfer {
    pub channel_id: String,
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub amount: Vec<Coin>,
    /// True when the transfer leaves the chain that produced the block.
    pub source: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateClient {
    pub client_id: String,
    /// Empty for counterparties without a chain identity (solo machines).
    #[serde(default)]
    pub chain_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateConnection {
    pub connection_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateChannel {
    pub channel_id: String,
    #[serde(default)]
    pub port_id: String,
    pub connection_id: String,
    #[serde(default)]
    pub counterparty_channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenChannel {
    pub channel_id: String,
    #[serde(default)]
    pub counterparty_channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloseChannel {
    pub channel_id: String,
}

impl Message {
    pub fn as_ibc_transfer(&self) -> Option<&IbcTransfer> {
        match self {
            Message::IbcTransfer(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_decodes_to_other() {
        let msg: Message =
            serde_json::from_str(r#"{"type":"delegate","validator":"v1"}"#).expect("decode");
        assert_eq!(msg, Message::Other);
    }

    #[test]
    fn ibc_transfer_decodes_string_amounts() {
        let msg: Message = serde_json::from_str(
            r#"{"type":"ibc_transfer","channel_id":"channel-0","sender":"a","source":true,
                "amount":[{"denom":"uatom","amount":"18446744073709551626"}]}"#,
        )
        .expect("decode");
        let transfer = msg.as_ibc_transfer().expect("ibc transfer");
        assert!(transfer.source);
        assert_eq!(transfer.amount[0].amount.to_string(), "18446744073709551626");
    }
}
