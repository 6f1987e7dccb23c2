use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::executor::block_on;
use num_bigint::BigUint;
use txs_processor::domain::keys::{IbcKey, hour_bucket};
use txs_processor::domain::types::Coin;
use txs_processor::error::{Error, Result};
use txs_processor::stats::{AddressData, IbcData, StatsAccumulator};
use txs_processor::store::InMemoryStatsStore;
use txs_processor::store::traits::TopologyLookup;
use txs_processor::topology::TopologyResolver;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, h, m, s)
        .single()
        .expect("valid time")
}

#[derive(Default)]
struct LookupCalls {
    by_client: AtomicUsize,
    by_connection: AtomicUsize,
    by_channel: AtomicUsize,
    status: AtomicUsize,
}

impl LookupCalls {
    fn resolves(&self) -> usize {
        self.by_client.load(Ordering::SeqCst)
            + self.by_connection.load(Ordering::SeqCst)
            + self.by_channel.load(Ordering::SeqCst)
    }
}

struct CountingLookup {
    inner: InMemoryStatsStore,
    calls: Arc<LookupCalls>,
    fail: bool,
}

impl CountingLookup {
    fn new(inner: InMemoryStatsStore) -> (Self, Arc<LookupCalls>) {
        let calls = Arc::new(LookupCalls::default());
        (
            Self {
                inner,
                calls: calls.clone(),
                fail: false,
            },
            calls,
        )
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(Error::Backend("lookup unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TopologyLookup for CountingLookup {
    async fn chain_id_by_client_id(&self, client_id: &str, origin: &str) -> Result<Option<String>> {
        let _ = self.calls.by_client.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.chain_id_by_client_id(client_id, origin).await
    }

    async fn chain_id_by_connection_id(
        &self,
        connection_id: &str,
        origin: &str,
    ) -> Result<Option<String>> {
        let _ = self.calls.by_connection.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.chain_id_by_connection_id(connection_id, origin).await
    }

    async fn chain_id_by_channel_id(&self, channel_id: &str, origin: &str) -> Result<Option<String>> {
        let _ = self.calls.by_channel.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.chain_id_by_channel_id(channel_id, origin).await
    }

    async fn channel_status(&self, channel_id: &str, origin: &str) -> Result<Option<bool>> {
        let _ = self.calls.status.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.channel_status(channel_id, origin).await
    }
}

#[test]
fn failed_appends_never_touch_coin_totals() {
    let mut data = IbcData::new();
    let coins = vec![Coin::new("uatom", 50u64)];
    for _ in 0..3 {
        data.append("cosmoshub", "osmosis", at(10, 15, 0), "channel-1", true, &coins);
    }

    let counters = data
        .get(&IbcKey::new("cosmoshub", "osmosis", "channel-1", at(10, 0, 0)))
        .expect("bucket");
    assert_eq!(counters.transfers, 3);
    assert_eq!(counters.failed_transfers, 3);
    assert!(counters.coins.is_empty());
}

#[test]
fn successful_amounts_sum_past_u64() {
    let mut data = IbcData::new();
    let t = at(10, 1, 0);
    data.append(
        "cosmoshub",
        "osmosis",
        t,
        "channel-1",
        false,
        &[Coin::new("uatom", 9_223_372_036_854_775_807u64)],
    );
    data.append("cosmoshub", "osmosis", t, "channel-1", false, &[Coin::new("uatom", 10u64)]);
    data.append("cosmoshub", "osmosis", t, "channel-1", true, &[Coin::new("uatom", 999u64)]);

    let counters = data
        .get(&IbcKey::new("cosmoshub", "osmosis", "channel-1", t))
        .expect("bucket");
    assert_eq!(counters.transfers, 3);
    assert_eq!(counters.failed_transfers, 1);
    assert_eq!(
        counters.coins.get("uatom"),
        Some(&BigUint::from(9_223_372_036_854_775_817u64))
    );
}

#[test]
fn flatten_yields_one_row_per_bucket() {
    let mut data = IbcData::new();
    let coins = vec![Coin::new("uosmo", 1u64)];
    data.append("a", "b", at(10, 5, 0), "channel-0", false, &coins);
    data.append("a", "b", at(10, 59, 59), "channel-0", false, &coins);
    data.append("a", "b", at(11, 0, 0), "channel-0", false, &coins);
    data.append("b", "a", at(10, 5, 0), "channel-0", true, &coins);
    data.append("a", "b", at(10, 5, 0), "channel-9", false, &coins);

    let mut rows = data.flatten();
    assert_eq!(rows.len(), 4);
    rows.sort_by(|x, y| {
        (&x.source, &x.channel_id, x.hour).cmp(&(&y.source, &y.channel_id, y.hour))
    });

    assert_eq!(rows[0].hour, at(10, 0, 0));
    assert_eq!(rows[0].transfers, 2);
    assert_eq!(rows[0].coins.get("uosmo"), Some(&BigUint::from(2u64)));
    assert_eq!(rows[1].hour, at(11, 0, 0));
    assert_eq!(rows[1].transfers, 1);
    assert_eq!(rows[2].channel_id, "channel-9");
    assert_eq!(rows[3].source, "b");
    assert_eq!(rows[3].failed_transfers, 1);
    assert!(rows[3].coins.is_empty());
}

#[test]
fn hour_bucket_drops_minutes_and_seconds() {
    assert_eq!(hour_bucket(at(10, 59, 59)), at(10, 0, 0));
    assert_eq!(hour_bucket(at(11, 0, 0)), at(11, 0, 0));
    assert_ne!(hour_bucket(at(10, 59, 59)), hour_bucket(at(11, 0, 0)));
}

#[test]
fn accumulator_reset_empties_everything() {
    let mut stats = StatsAccumulator::new();
    stats.append_transfer(
        "cosmoshub",
        at(10, 15, 0),
        &[Coin::new("uatom", 100u64)],
        AddressData::internal("addrA"),
    );
    stats.append_ibc("cosmoshub", "osmosis", at(10, 15, 0), "channel-1", false, &[]);
    assert!(!stats.is_empty());

    let tx_stats = stats.tx_stats().expect("tx stats");
    assert_eq!(tx_stats.hour, at(10, 0, 0));
    assert_eq!(tx_stats.turnover_amount, BigUint::from(100u64));
    assert_eq!(tx_stats.addresses.len(), 1);

    stats.reset();
    assert!(stats.is_empty());
    assert!(stats.flatten_ibc().is_empty());
}

#[test]
fn fully_cached_chain_needs_no_lookup() {
    block_on(async {
        let (lookup, calls) = CountingLookup::new(InMemoryStatsStore::new());
        let mut resolver = TopologyResolver::new(lookup);
        let cache = resolver.cache_mut();
        cache.record_client("cosmoshub", "07-tendermint-0", "osmosis");
        cache.record_connection("cosmoshub", "connection-0", "07-tendermint-0");
        cache.record_channel("cosmoshub", "channel-1", "connection-0", None);

        let chain = resolver
            .chain_id("channel-1", "cosmoshub")
            .await
            .expect("resolve");
        assert_eq!(chain.as_deref(), Some("osmosis"));
        assert_eq!(calls.resolves(), 0);
    });
}

#[test]
fn first_cache_miss_issues_exactly_one_lookup() {
    block_on(async {
        let store = InMemoryStatsStore::new();
        store
            .seed_client("cosmoshub", "07-tendermint-0", "osmosis")
            .expect("seed client");
        store
            .seed_connection("cosmoshub", "connection-0", "07-tendermint-0")
            .expect("seed connection");
        let (lookup, calls) = CountingLookup::new(store);
        let mut resolver = TopologyResolver::new(lookup);
        resolver
            .cache_mut()
            .record_channel("cosmoshub", "channel-1", "connection-0", None);

        let chain = resolver
            .chain_id("channel-1", "cosmoshub")
            .await
            .expect("resolve");
        assert_eq!(chain.as_deref(), Some("osmosis"));
        assert_eq!(calls.by_connection.load(Ordering::SeqCst), 1);
        assert_eq!(calls.resolves(), 1);
    });
}

#[test]
fn uncached_channel_resolves_through_store() {
    block_on(async {
        let store = InMemoryStatsStore::new();
        store
            .seed_client("cosmoshub", "07-tendermint-0", "osmosis")
            .expect("seed client");
        store
            .seed_connection("cosmoshub", "connection-0", "07-tendermint-0")
            .expect("seed connection");
        store
            .seed_channel("cosmoshub", "channel-1", "connection-0", true)
            .expect("seed channel");
        let (lookup, calls) = CountingLookup::new(store);
        let resolver = TopologyResolver::new(lookup);

        let chain = resolver
            .chain_id("channel-1", "cosmoshub")
            .await
            .expect("resolve");
        assert_eq!(chain.as_deref(), Some("osmosis"));
        assert_eq!(calls.by_channel.load(Ordering::SeqCst), 1);
        assert_eq!(calls.resolves(), 1);

        // Lookups do not warm the cache.
        let _ = resolver
            .chain_id("channel-1", "osmosis")
            .await
            .expect("resolve other origin");
        assert_eq!(calls.resolves(), 2);
        assert!(resolver.channel_status("channel-1", "cosmoshub").await.expect("status"));
    });
}

#[test]
fn counterparty_without_chain_id_resolves_to_none() {
    block_on(async {
        let (lookup, calls) = CountingLookup::new(InMemoryStatsStore::new());
        let mut resolver = TopologyResolver::new(lookup);
        let cache = resolver.cache_mut();
        cache.record_client("cosmoshub", "06-solomachine-0", "");
        cache.record_connection("cosmoshub", "connection-5", "06-solomachine-0");
        cache.record_channel("cosmoshub", "channel-5", "connection-5", None);

        let chain = resolver
            .chain_id("channel-5", "cosmoshub")
            .await
            .expect("resolve");
        assert_eq!(chain, None);
        assert_eq!(calls.resolves(), 0);
    });
}

#[test]
fn identifiers_do_not_leak_across_origin_chains() {
    block_on(async {
        let (lookup, calls) = CountingLookup::new(InMemoryStatsStore::new());
        let mut resolver = TopologyResolver::new(lookup);
        let cache = resolver.cache_mut();
        cache.record_client("cosmoshub", "07-tendermint-0", "osmosis");
        cache.record_connection("cosmoshub", "connection-0", "07-tendermint-0");
        cache.record_channel("cosmoshub", "channel-0", "connection-0", None);

        let chain = resolver
            .chain_id("channel-0", "juno")
            .await
            .expect("resolve");
        assert_eq!(chain, None);
        assert_eq!(calls.by_channel.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn lookup_failures_surface_as_connection_errors() {
    block_on(async {
        let (mut lookup, _calls) = CountingLookup::new(InMemoryStatsStore::new());
        lookup.fail = true;
        let resolver = TopologyResolver::new(lookup);

        let err = resolver
            .chain_id("channel-1", "cosmoshub")
            .await
            .expect_err("lookup must fail");
        assert!(matches!(err, Error::Connection(_)));
    });
}

#[test]
fn cached_channel_state_wins_over_store() {
    block_on(async {
        let store = InMemoryStatsStore::new();
        store
            .seed_channel("cosmoshub", "channel-1", "connection-0", false)
            .expect("seed channel");
        let (lookup, calls) = CountingLookup::new(store);
        let mut resolver = TopologyResolver::new(lookup);

        assert!(!resolver.channel_status("channel-1", "cosmoshub").await.expect("status"));
        assert_eq!(calls.status.load(Ordering::SeqCst), 1);

        resolver
            .cache_mut()
            .record_channel_state("cosmoshub", "channel-1", true, Some("channel-7"));
        assert!(resolver.channel_status("channel-1", "cosmoshub").await.expect("status"));
        assert_eq!(calls.status.load(Ordering::SeqCst), 1);
        assert!(!resolver.channel_status("channel-404", "cosmoshub").await.expect("status"));
    });
}
