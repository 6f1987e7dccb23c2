use crate::error::{Error, Result};
use crate::store::traits::TopologyLookup;
use crate::topology::cache::TopologyCache;

/// Maps a channel back to its counterparty chain through
/// channel -> connection -> client -> chain. Each hop is served from the
/// cache; the first miss hands the rest of the walk to a single persisted
/// lookup. Lookups never populate the cache, only creation messages do.
pub struct TopologyResolver<L> {
    lookup: L,
    cache: TopologyCache,
}

impl<L: TopologyLookup> TopologyResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            cache: TopologyCache::new(),
        }
    }

    pub fn cache(&self) -> &TopologyCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TopologyCache {
        &mut self.cache
    }

    /// `Ok(None)` means the counterparty has no chain identity and transfers
    /// over the channel must not be attributed to a chain pair.
    pub async fn chain_id(&self, channel_id: &str, origin_chain_id: &str) -> Result<Option<String>> {
        let resolved = match self.cache.channel_link(origin_chain_id, channel_id) {
            None => {
                self.lookup
                    .chain_id_by_channel_id(channel_id, origin_chain_id)
                    .await
            }
            Some(link) => match self
                .cache
                .connection_client(origin_chain_id, &link.connection_id)
            {
                None => {
                    self.lookup
                        .chain_id_by_connection_id(&link.connection_id, origin_chain_id)
                        .await
                }
                Some(client_id) => match self.cache.client_chain(origin_chain_id, client_id) {
                    None => {
                        self.lookup
                            .chain_id_by_client_id(client_id, origin_chain_id)
                            .await
                    }
                    Some(chain_id) => Ok(Some(chain_id.to_string())),
                },
            },
        }
        .map_err(into_connection_error)?;

        Ok(resolved.filter(|c| !c.is_empty()))
    }

    /// Unknown channels report as closed.
    pub async fn channel_status(&self, channel_id: &str, origin_chain_id: &str) -> Result<bool> {
        if let Some(open) = self.cache.channel_state(origin_chain_id, channel_id) {
            return Ok(open);
        }
        let status = self
            .lookup
            .channel_status(channel_id, origin_chain_id)
            .await
            .map_err(into_connection_error)?;
        Ok(status.unwrap_or(false))
    }
}

fn into_connection_error(err: Error) -> Error {
    match err {
        Error::Connection(_) => err,
        other => Error::Connection(other.to_string()),
    }
}
