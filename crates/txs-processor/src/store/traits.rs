use std::sync::Arc;

use crate::error::Result;
use crate::store::mutations::BlockMutations;

/// Point lookups over persisted IBC topology, namespaced by the chain that
/// owns the identifiers. `None` means no row (or no chain identity).
#[async_trait::async_trait]
pub trait TopologyLookup: Send + Sync {
    async fn chain_id_by_client_id(
        &self,
        client_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>>;

    /// Resolves connection -> client -> chain in one call.
    async fn chain_id_by_connection_id(
        &self,
        connection_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>>;

    /// Resolves channel -> connection -> client -> chain in one call.
    async fn chain_id_by_channel_id(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>>;

    async fn channel_status(&self, channel_id: &str, origin_chain_id: &str)
    -> Result<Option<bool>>;
}

#[async_trait::async_trait]
pub trait StatsStore: TopologyLookup {
    /// Zero when the chain has never been processed.
    async fn last_processed_height(&self, chain_id: &str) -> Result<u64>;

    /// Applies the whole set or nothing. Fails with `Error::CasConflict` when
    /// the stored marker differs from `mutations.marker.expected_prior_height`.
    async fn apply(&self, mutations: &BlockMutations) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: TopologyLookup + ?Sized> TopologyLookup for Arc<T> {
    async fn chain_id_by_client_id(
        &self,
        client_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        (**self).chain_id_by_client_id(client_id, origin_chain_id).await
    }

    async fn chain_id_by_connection_id(
        &self,
        connection_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        (**self)
            .chain_id_by_connection_id(connection_id, origin_chain_id)
            .await
    }

    async fn chain_id_by_channel_id(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        (**self).chain_id_by_channel_id(channel_id, origin_chain_id).await
    }

    async fn channel_status(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<bool>> {
        (**self).channel_status(channel_id, origin_chain_id).await
    }
}

#[async_trait::async_trait]
impl<T: StatsStore + ?Sized> StatsStore for Arc<T> {
    async fn last_processed_height(&self, chain_id: &str) -> Result<u64> {
        (**self).last_processed_height(chain_id).await
    }

    async fn apply(&self, mutations: &BlockMutations) -> Result<()> {
        (**self).apply(mutations).await
    }
}
