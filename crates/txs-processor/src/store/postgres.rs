//! PostgreSQL-backed [`StatsStore`]. Every block commit runs in one
//! transaction that ends with a compare-and-set on `blocks_log`.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::mutations::BlockMutations;
use crate::store::traits::{StatsStore, TopologyLookup};

/// All hourly aggregates are written with this period.
const HOURLY_PERIOD: i32 = 1;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS zones (
        name TEXT NOT NULL,
        chain_id TEXT PRIMARY KEY,
        is_enabled BOOLEAN NOT NULL,
        is_caught_up BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS blocks_log (
        zone TEXT PRIMARY KEY,
        last_processed_block BIGINT NOT NULL,
        last_updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS total_tx_hourly_stats (
        zone TEXT NOT NULL,
        hour TIMESTAMPTZ NOT NULL,
        period INT NOT NULL,
        txs_cnt BIGINT NOT NULL,
        txs_w_ibc_xfer_cnt BIGINT NOT NULL,
        txs_w_ibc_xfer_fail_cnt BIGINT NOT NULL,
        total_coin_turnover_amount NUMERIC NOT NULL,
        PRIMARY KEY (hour, zone, period)
    )",
    "CREATE TABLE IF NOT EXISTS active_addresses (
        address TEXT NOT NULL,
        zone TEXT NOT NULL,
        hour TIMESTAMPTZ NOT NULL,
        period INT NOT NULL,
        is_internal_tx BOOLEAN NOT NULL,
        is_internal_transfer BOOLEAN NOT NULL,
        is_external_transfer BOOLEAN NOT NULL,
        PRIMARY KEY (address, zone, hour, period)
    )",
    "CREATE TABLE IF NOT EXISTS ibc_clients (
        zone TEXT NOT NULL,
        client_id TEXT NOT NULL,
        chain_id TEXT,
        PRIMARY KEY (zone, client_id)
    )",
    "CREATE TABLE IF NOT EXISTS ibc_connections (
        zone TEXT NOT NULL,
        connection_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        PRIMARY KEY (zone, connection_id)
    )",
    "CREATE TABLE IF NOT EXISTS ibc_channels (
        zone TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        connection_id TEXT NOT NULL,
        is_opened BOOLEAN NOT NULL,
        counterparty_channel_id TEXT,
        PRIMARY KEY (zone, channel_id)
    )",
    "CREATE TABLE IF NOT EXISTS ibc_transfer_hourly_stats (
        zone TEXT NOT NULL,
        zone_src TEXT NOT NULL,
        zone_dest TEXT NOT NULL,
        hour TIMESTAMPTZ NOT NULL,
        period INT NOT NULL,
        ibc_channel TEXT NOT NULL,
        txs_cnt BIGINT NOT NULL,
        txs_fail_cnt BIGINT NOT NULL,
        PRIMARY KEY (zone, zone_src, zone_dest, hour, period, ibc_channel)
    )",
    "CREATE TABLE IF NOT EXISTS ibc_transfer_hourly_cashflow (
        zone TEXT NOT NULL,
        zone_src TEXT NOT NULL,
        zone_dest TEXT NOT NULL,
        hour TIMESTAMPTZ NOT NULL,
        period INT NOT NULL,
        ibc_channel TEXT NOT NULL,
        denom TEXT NOT NULL,
        amount NUMERIC NOT NULL,
        PRIMARY KEY (zone, zone_src, zone_dest, hour, period, ibc_channel, denom)
    )",
];

const UPSERT_ZONE: &str = "INSERT INTO zones (name, chain_id, is_enabled, is_caught_up)
    VALUES ($1, $1, TRUE, FALSE)
    ON CONFLICT (chain_id) DO UPDATE SET is_enabled = TRUE";

const INSERT_IMPLICIT_ZONE: &str = "INSERT INTO zones (name, chain_id, is_enabled, is_caught_up)
    VALUES ($1, $1, FALSE, FALSE)
    ON CONFLICT (chain_id) DO NOTHING";

const ADD_TX_STATS: &str = "INSERT INTO total_tx_hourly_stats
        (zone, hour, period, txs_cnt, txs_w_ibc_xfer_cnt, txs_w_ibc_xfer_fail_cnt, total_coin_turnover_amount)
    VALUES ($1, $2, $3, $4, $5, $6, $7::numeric)
    ON CONFLICT (hour, zone, period) DO UPDATE SET
        txs_cnt = total_tx_hourly_stats.txs_cnt + EXCLUDED.txs_cnt,
        txs_w_ibc_xfer_cnt = total_tx_hourly_stats.txs_w_ibc_xfer_cnt + EXCLUDED.txs_w_ibc_xfer_cnt,
        txs_w_ibc_xfer_fail_cnt = total_tx_hourly_stats.txs_w_ibc_xfer_fail_cnt + EXCLUDED.txs_w_ibc_xfer_fail_cnt,
        total_coin_turnover_amount = total_tx_hourly_stats.total_coin_turnover_amount + EXCLUDED.total_coin_turnover_amount";

// is_internal_transfer marks outbound IBC, is_external_transfer inbound.
const ADD_ACTIVE_ADDRESS: &str = "INSERT INTO active_addresses
        (address, zone, hour, period, is_internal_tx, is_internal_transfer, is_external_transfer)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (address, zone, hour, period) DO UPDATE SET
        is_internal_tx = active_addresses.is_internal_tx OR EXCLUDED.is_internal_tx,
        is_internal_transfer = active_addresses.is_internal_transfer OR EXCLUDED.is_internal_transfer,
        is_external_transfer = active_addresses.is_external_transfer OR EXCLUDED.is_external_transfer";

const ADD_CLIENT: &str = "INSERT INTO ibc_clients (zone, client_id, chain_id)
    VALUES ($1, $2, $3)
    ON CONFLICT (zone, client_id) DO NOTHING";

const ADD_CONNECTION: &str = "INSERT INTO ibc_connections (zone, connection_id, client_id)
    VALUES ($1, $2, $3)
    ON CONFLICT (zone, connection_id) DO NOTHING";

const ADD_CHANNEL: &str = "INSERT INTO ibc_channels (zone, channel_id, connection_id, is_opened, counterparty_channel_id)
    VALUES ($1, $2, $3, FALSE, $4)
    ON CONFLICT (zone, channel_id) DO NOTHING";

const MARK_CHANNEL: &str = "UPDATE ibc_channels
    SET is_opened = $3, counterparty_channel_id = COALESCE($4, counterparty_channel_id)
    WHERE zone = $1 AND channel_id = $2";

const ADD_IBC_STATS: &str = "INSERT INTO ibc_transfer_hourly_stats
        (zone, zone_src, zone_dest, hour, period, ibc_channel, txs_cnt, txs_fail_cnt)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    ON CONFLICT (zone, zone_src, zone_dest, hour, period, ibc_channel) DO UPDATE SET
        txs_cnt = ibc_transfer_hourly_stats.txs_cnt + EXCLUDED.txs_cnt,
        txs_fail_cnt = ibc_transfer_hourly_stats.txs_fail_cnt + EXCLUDED.txs_fail_cnt";

const ADD_IBC_CASHFLOW: &str = "INSERT INTO ibc_transfer_hourly_cashflow
        (zone, zone_src, zone_dest, hour, period, ibc_channel, denom, amount)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8::numeric)
    ON CONFLICT (zone, zone_src, zone_dest, hour, period, ibc_channel, denom) DO UPDATE SET
        amount = ibc_transfer_hourly_cashflow.amount + EXCLUDED.amount";

// A first block (prior height 0) inserts; later blocks only advance a marker
// that still holds the expected prior height.
const MARK_BLOCK: &str = "INSERT INTO blocks_log (zone, last_processed_block, last_updated_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (zone) DO UPDATE SET
        last_processed_block = blocks_log.last_processed_block + 1,
        last_updated_at = EXCLUDED.last_updated_at
    WHERE blocks_log.last_processed_block = $2 - 1";

const LAST_PROCESSED_BLOCK: &str = "SELECT last_processed_block FROM blocks_log WHERE zone = $1";

const CHAIN_ID_BY_CLIENT: &str =
    "SELECT chain_id FROM ibc_clients WHERE zone = $1 AND client_id = $2";

const CHAIN_ID_BY_CONNECTION: &str = "SELECT cl.chain_id
    FROM ibc_connections co
    JOIN ibc_clients cl ON cl.zone = co.zone AND cl.client_id = co.client_id
    WHERE co.zone = $1 AND co.connection_id = $2";

const CHAIN_ID_BY_CHANNEL: &str = "SELECT cl.chain_id
    FROM ibc_channels ch
    JOIN ibc_connections co ON co.zone = ch.zone AND co.connection_id = ch.connection_id
    JOIN ibc_clients cl ON cl.zone = co.zone AND cl.client_id = co.client_id
    WHERE ch.zone = $1 AND ch.channel_id = $2";

const CHANNEL_STATUS: &str =
    "SELECT is_opened FROM ibc_channels WHERE zone = $1 AND channel_id = $2";

pub struct PgStatsStore {
    pool: PgPool,
}

fn connection_err(err: sqlx::Error) -> Error {
    Error::Connection(err.to_string())
}

fn to_i64(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Commit(format!("{what} {value} exceeds BIGINT")))
}

impl PgStatsStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(connection_err)?;
        info!("connected to postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables this store writes when they are missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(connection_err)?;
        }
        Ok(())
    }

    async fn lookup_chain_id(&self, sql: &str, id: &str, origin: &str) -> Result<Option<String>> {
        let row: Option<Option<String>> = sqlx::query_scalar(sql)
            .bind(origin)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_err)?;
        Ok(row.flatten().filter(|c| !c.is_empty()))
    }

    async fn write_rows(
        tx: &mut Transaction<'static, Postgres>,
        m: &BlockMutations,
    ) -> Result<()> {
        let db_err = |e: sqlx::Error| Error::Connection(format!("{}: {e}", m.chain_id));
        sqlx::query(UPSERT_ZONE)
            .bind(&m.chain_id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        for zone in &m.implicit_zones {
            sqlx::query(INSERT_IMPLICIT_ZONE)
                .bind(zone)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }

        if let Some(s) = &m.tx_stats {
            sqlx::query(ADD_TX_STATS)
                .bind(&s.chain_id)
                .bind(s.hour)
                .bind(HOURLY_PERIOD)
                .bind(to_i64(s.count, "txs_cnt")?)
                .bind(to_i64(s.tx_with_ibc_transfer, "txs_w_ibc_xfer_cnt")?)
                .bind(to_i64(s.tx_with_ibc_transfer_fail, "txs_w_ibc_xfer_fail_cnt")?)
                .bind(s.turnover_amount.to_string())
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        for a in &m.active_addresses {
            sqlx::query(ADD_ACTIVE_ADDRESS)
                .bind(&a.address)
                .bind(&a.chain_id)
                .bind(a.hour)
                .bind(HOURLY_PERIOD)
                .bind(a.internal_tx)
                .bind(a.ibc_outbound)
                .bind(a.ibc_inbound)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }

        for c in &m.clients {
            sqlx::query(ADD_CLIENT)
                .bind(&c.chain_id)
                .bind(&c.client_id)
                .bind(c.counterparty_chain_id.as_deref())
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        for c in &m.connections {
            sqlx::query(ADD_CONNECTION)
                .bind(&c.chain_id)
                .bind(&c.connection_id)
                .bind(&c.client_id)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        for c in &m.channels {
            sqlx::query(ADD_CHANNEL)
                .bind(&c.chain_id)
                .bind(&c.channel_id)
                .bind(&c.connection_id)
                .bind(c.counterparty_channel_id.as_deref())
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        for u in &m.channel_states {
            sqlx::query(MARK_CHANNEL)
                .bind(&u.chain_id)
                .bind(&u.channel_id)
                .bind(u.is_opened)
                .bind(u.counterparty_channel_id.as_deref())
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }

        for r in &m.ibc_stats {
            sqlx::query(ADD_IBC_STATS)
                .bind(&r.chain_id)
                .bind(&r.source)
                .bind(&r.destination)
                .bind(r.hour)
                .bind(HOURLY_PERIOD)
                .bind(&r.channel_id)
                .bind(to_i64(r.transfers, "txs_cnt")?)
                .bind(to_i64(r.failed_transfers, "txs_fail_cnt")?)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        for r in &m.ibc_cashflow {
            sqlx::query(ADD_IBC_CASHFLOW)
                .bind(&r.chain_id)
                .bind(&r.source)
                .bind(&r.destination)
                .bind(r.hour)
                .bind(HOURLY_PERIOD)
                .bind(&r.channel_id)
                .bind(&r.denom)
                .bind(r.amount.to_string())
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TopologyLookup for PgStatsStore {
    async fn chain_id_by_client_id(
        &self,
        client_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        self.lookup_chain_id(CHAIN_ID_BY_CLIENT, client_id, origin_chain_id)
            .await
    }

    async fn chain_id_by_connection_id(
        &self,
        connection_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        self.lookup_chain_id(CHAIN_ID_BY_CONNECTION, connection_id, origin_chain_id)
            .await
    }

    async fn chain_id_by_channel_id(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<String>> {
        self.lookup_chain_id(CHAIN_ID_BY_CHANNEL, channel_id, origin_chain_id)
            .await
    }

    async fn channel_status(
        &self,
        channel_id: &str,
        origin_chain_id: &str,
    ) -> Result<Option<bool>> {
        sqlx::query_scalar(CHANNEL_STATUS)
            .bind(origin_chain_id)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_err)
    }
}

#[async_trait::async_trait]
impl StatsStore for PgStatsStore {
    async fn last_processed_height(&self, chain_id: &str) -> Result<u64> {
        let height: Option<i64> = sqlx::query_scalar(LAST_PROCESSED_BLOCK)
            .bind(chain_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(connection_err)?;
        match height {
            None => Ok(0),
            Some(h) => u64::try_from(h)
                .map_err(|_| Error::Backend(format!("{chain_id}: negative block height {h}"))),
        }
    }

    async fn apply(&self, m: &BlockMutations) -> Result<()> {
        let next = to_i64(m.marker.next_height(), "block height")?;
        let updated_at: DateTime<Utc> = m.marker.updated_at;

        let mut tx = self.pool.begin().await.map_err(connection_err)?;
        Self::write_rows(&mut tx, m).await?;

        let marked = sqlx::query(MARK_BLOCK)
            .bind(&m.marker.chain_id)
            .bind(next)
            .bind(updated_at)
            .execute(&mut *tx)
            .await
            .map_err(connection_err)?;
        if marked.rows_affected() == 0 {
            tx.rollback().await.map_err(connection_err)?;
            return Err(Error::CasConflict {
                chain_id: m.marker.chain_id.clone(),
                expected: m.marker.expected_prior_height,
            });
        }

        tx.commit().await.map_err(connection_err)?;
        debug!(chain_id = %m.chain_id, height = next, "block marker advanced");
        Ok(())
    }
}
