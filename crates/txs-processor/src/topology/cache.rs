use std::collections::{BTreeMap, HashMap};

/// Identifier owned by a particular chain. Client, connection and channel
/// ids are only unique within the chain that created them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopedId {
    pub chain_id: String,
    pub id: String,
}

impl ScopedId {
    pub fn new(chain_id: &str, id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLink {
    pub connection_id: String,
    pub counterparty_channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub is_opened: bool,
    pub counterparty_channel_id: Option<String>,
}

/// Topology facts observed while processing the current block. Drained by
/// a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyDelta {
    pub clients: BTreeMap<ScopedId, String>,
    pub connections: BTreeMap<ScopedId, String>,
    pub channels: BTreeMap<ScopedId, ChannelLink>,
    pub states: BTreeMap<ScopedId, ChannelState>,
}

impl TopologyDelta {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
            && self.connections.is_empty()
            && self.channels.is_empty()
            && self.states.is_empty()
    }
}

#[derive(Debug, Default)]
struct ChainTopology {
    clients: HashMap<String, String>,
    connections: HashMap<String, String>,
    channels: HashMap<String, ChannelLink>,
    states: HashMap<String, bool>,
}

/// Process-lifetime cache of client -> chain, connection -> client and
/// channel -> connection links, plus channel open state, per origin chain.
/// Entries only grow; channel state is the one field that flips.
#[derive(Debug, Default)]
pub struct TopologyCache {
    chains: HashMap<String, ChainTopology>,
    pending: TopologyDelta,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain_mut(&mut self, origin: &str) -> &mut ChainTopology {
        self.chains.entry(origin.to_string()).or_default()
    }

    pub fn record_client(&mut self, origin: &str, client_id: &str, chain_id: &str) {
        self
            .chain_mut(origin)
            .clients
            .insert(client_id.to_string(), chain_id.to_string());
        self
            .pending
            .clients
            .insert(ScopedId::new(origin, client_id), chain_id.to_string());
    }

    pub fn record_connection(&mut self, origin: &str, connection_id: &str, client_id: &str) {
        self
            .chain_mut(origin)
            .connections
            .insert(connection_id.to_string(), client_id.to_string());
        self
            .pending
            .connections
            .insert(ScopedId::new(origin, connection_id), client_id.to_string());
    }

    pub fn record_channel(
        &mut self,
        origin: &str,
        channel_id: &str,
        connection_id: &str,
        counterparty_channel_id: Option<&str>,
    ) {
        let link = ChannelLink {
            connection_id: connection_id.to_string(),
            counterparty_channel_id: counterparty_channel_id.map(str::to_string),
        };
        self
            .chain_mut(origin)
            .channels
            .insert(channel_id.to_string(), link.clone());
        self
            .pending
            .channels
            .insert(ScopedId::new(origin, channel_id), link);
    }

    pub fn record_channel_state(
        &mut self,
        origin: &str,
        channel_id: &str,
        is_opened: bool,
        counterparty_channel_id: Option<&str>,
    ) {
        self
            .chain_mut(origin)
            .states
            .insert(channel_id.to_string(), is_opened);

        let key = ScopedId::new(origin, channel_id);
        let counterparty = counterparty_channel_id
            .map(str::to_string)
            .or_else(|| {
                self.pending
                    .states
                    .get(&key)
                    .and_then(|s| s.counterparty_channel_id.clone())
            });
        self.pending.states.insert(
            key,
            ChannelState {
                is_opened,
                counterparty_channel_id: counterparty,
            },
        );
    }

    pub fn client_chain(&self, origin: &str, client_id: &str) -> Option<&str> {
        self.chains
            .get(origin)?
            .clients
            .get(client_id)
            .map(String::as_str)
    }

    pub fn connection_client(&self, origin: &str, connection_id: &str) -> Option<&str> {
        self.chains
            .get(origin)?
            .connections
            .get(connection_id)
            .map(String::as_str)
    }

    pub fn channel_link(&self, origin: &str, channel_id: &str) -> Option<&ChannelLink> {
        self.chains.get(origin)?.channels.get(channel_id)
    }

    pub fn channel_state(&self, origin: &str, channel_id: &str) -> Option<bool> {
        self.chains.get(origin)?.states.get(channel_id).copied()
    }

    pub fn pending(&self) -> &TopologyDelta {
        &self.pending
    }

    pub fn clear_pending(&mut self) {
        self.pending = TopologyDelta::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_scoped_per_origin_chain() {
        let mut cache = TopologyCache::new();
        cache.record_client("cosmoshub", "07-tendermint-0", "osmosis");
        cache.record_client("osmosis", "07-tendermint-0", "cosmoshub");

        assert_eq!(cache.client_chain("cosmoshub", "07-tendermint-0"), Some("osmosis"));
        assert_eq!(cache.client_chain("osmosis", "07-tendermint-0"), Some("cosmoshub"));
        assert_eq!(cache.client_chain("juno", "07-tendermint-0"), None);
    }

    #[test]
    fn channel_state_keeps_counterparty_across_flips() {
        let mut cache = TopologyCache::new();
        cache.record_channel("hub", "channel-0", "connection-0", None);
        cache.record_channel_state("hub", "channel-0", true, Some("channel-141"));
        cache.record_channel_state("hub", "channel-0", false, None);

        assert_eq!(cache.channel_state("hub", "channel-0"), Some(false));
        let state = cache
            .pending()
            .states
            .get(&ScopedId::new("hub", "channel-0"))
            .expect("pending state");
        assert!(!state.is_opened);
        assert_eq!(state.counterparty_channel_id.as_deref(), Some("channel-141"));
    }

    #[test]
    fn clearing_pending_keeps_cached_facts() {
        let mut cache = TopologyCache::new();
        cache.record_connection("hub", "connection-0", "07-tendermint-0");
        assert!(!cache.pending().is_empty());

        cache.clear_pending();
        assert!(cache.pending().is_empty());
        assert_eq!(
            cache.connection_client("hub", "connection-0"),
            Some("07-tendermint-0")
        );
    }
}
