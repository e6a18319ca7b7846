// In crates/database/src/ledger.rs

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use core_types::{OrderState, OrderType, PositionRecord};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, FromRow, SqliteConnection};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

const SELECT_RECORD: &str = "SELECT id, asset, counter_currency, order_type, price, volume, cost, \
     timestamp, trigger_price, close_id, close_timestamp, close_attempted_at, closed, status, \
     asset_fee, counter_fee FROM records";

/// The position ledger on disk.
///
/// Holds only the path. Every operation opens the database, does its work and
/// closes it again; [`Ledger::open`] gives direct access to a handle when
/// several statements should share one connection.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the database, creating it and its schema on first use.
    pub async fn open(&self) -> Result<LedgerHandle> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await?;
        sqlx::migrate!("../../migrations").run_direct(&mut conn).await?;
        Ok(LedgerHandle { conn: Some(conn) })
    }

    pub async fn add_record(&self, record: &PositionRecord) -> Result<()> {
        let mut handle = self.open().await?;
        let result = handle.add_record(record).await;
        handle.finish(result).await
    }

    pub async fn record_by_id(&self, id: &str) -> Result<Option<PositionRecord>> {
        let mut handle = self.open().await?;
        let result = handle.record_by_id(id).await;
        handle.finish(result).await
    }

    pub async fn records_by_type(
        &self,
        asset: &str,
        order_type: OrderType,
    ) -> Result<Vec<PositionRecord>> {
        let mut handle = self.open().await?;
        let result = handle.records_by_type(asset, order_type).await;
        handle.finish(result).await
    }

    pub async fn viable_records(
        &self,
        asset: &str,
        order_type: OrderType,
        price: Decimal,
    ) -> Result<Vec<PositionRecord>> {
        let mut handle = self.open().await?;
        let result = handle.viable_records(asset, order_type, price).await;
        handle.finish(result).await
    }

    pub async fn all_records(&self) -> Result<Vec<PositionRecord>> {
        let mut handle = self.open().await?;
        let result = handle.all_records().await;
        handle.finish(result).await
    }

    pub async fn in_flight_records(&self, asset: &str) -> Result<Vec<PositionRecord>> {
        let mut handle = self.open().await?;
        let result = handle.in_flight_records(asset).await;
        handle.finish(result).await
    }

    pub async fn delete_record(&self, id: &str) -> Result<()> {
        let mut handle = self.open().await?;
        let result = handle.delete_record(id).await;
        handle.finish(result).await
    }

    pub async fn mark_closing(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut handle = self.open().await?;
        let result = handle.mark_closing(id, at).await;
        handle.finish(result).await
    }

    pub async fn clear_closing(&self, id: &str) -> Result<()> {
        let mut handle = self.open().await?;
        let result = handle.clear_closing(id).await;
        handle.finish(result).await
    }

    pub async fn record_close_order(
        &self,
        id: &str,
        close_order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut handle = self.open().await?;
        let result = handle.record_close_order(id, close_order_id, at).await;
        handle.finish(result).await
    }

    pub async fn update_settlement(&self, record: &PositionRecord) -> Result<()> {
        let mut handle = self.open().await?;
        let result = handle.update_settlement(record).await;
        handle.finish(result).await
    }
}

/// An open connection to the ledger.
///
/// Release it with [`LedgerHandle::close`]. A handle dropped on an early return
/// or a panic still releases its connection.
#[derive(Debug)]
pub struct LedgerHandle {
    conn: Option<SqliteConnection>,
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    asset: String,
    counter_currency: String,
    order_type: String,
    price: String,
    volume: String,
    cost: String,
    timestamp: DateTime<Utc>,
    trigger_price: String,
    close_id: Option<String>,
    close_timestamp: Option<DateTime<Utc>>,
    close_attempted_at: Option<DateTime<Utc>>,
    closed: bool,
    status: String,
    asset_fee: String,
    counter_fee: String,
}

impl TryFrom<RecordRow> for PositionRecord {
    type Error = Error;

    fn try_from(row: RecordRow) -> Result<Self> {
        let id = row.id.clone();
        let decimal = |field: &str, value: &str| {
            Decimal::from_str(value).map_err(|e| Error::CorruptRecord {
                id: id.clone(),
                reason: format!("{field} = {value:?}: {e}"),
            })
        };
        Ok(PositionRecord {
            order_type: OrderType::from_str(&row.order_type).map_err(|e| Error::CorruptRecord {
                id: id.clone(),
                reason: e.to_string(),
            })?,
            open_price: decimal("price", &row.price)?,
            open_volume: decimal("volume", &row.volume)?,
            open_cost: decimal("cost", &row.cost)?,
            trigger_price: decimal("trigger_price", &row.trigger_price)?,
            asset_fee: decimal("asset_fee", &row.asset_fee)?,
            counter_fee: decimal("counter_fee", &row.counter_fee)?,
            status: OrderState::from(row.status.as_str()),
            open_timestamp: row.timestamp,
            close_order_id: row.close_id,
            close_timestamp: row.close_timestamp,
            close_attempted_at: row.close_attempted_at,
            closed: row.closed,
            asset: row.asset,
            counter_currency: row.counter_currency,
            id: row.id,
        })
    }
}

fn into_records(rows: Vec<RecordRow>) -> Result<Vec<PositionRecord>> {
    rows.into_iter().map(PositionRecord::try_from).collect()
}

impl LedgerHandle {
    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or(Error::OperationFailed(sqlx::Error::PoolClosed))
    }

    /// Releases the connection.
    pub async fn close(mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await.map_err(Error::OperationFailed)?;
        }
        Ok(())
    }

    /// Closes the handle and hands back `result`. A close failure only
    /// surfaces when the operation itself succeeded.
    async fn finish<T>(self, result: Result<T>) -> Result<T> {
        let closed = self.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Inserts a new record. Fails with `DuplicateRecord` if the id is taken.
    pub async fn add_record(&mut self, record: &PositionRecord) -> Result<()> {
        let conn = self.conn()?;
        let result = sqlx::query(
            "INSERT INTO records (id, asset, counter_currency, order_type, price, volume, cost, \
             timestamp, trigger_price, close_id, close_timestamp, close_attempted_at, closed, \
             status, asset_fee, counter_fee) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.asset)
        .bind(&record.counter_currency)
        .bind(record.order_type.as_str())
        .bind(record.open_price.to_string())
        .bind(record.open_volume.to_string())
        .bind(record.open_cost.to_string())
        .bind(record.open_timestamp)
        .bind(record.trigger_price.to_string())
        .bind(&record.close_order_id)
        .bind(record.close_timestamp)
        .bind(record.close_attempted_at)
        .bind(record.closed)
        .bind(record.status.as_str())
        .bind(record.asset_fee.to_string())
        .bind(record.counter_fee.to_string())
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => {
                debug!(id = %record.id, asset = %record.asset, order_type = %record.order_type, "Record added to ledger");
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateRecord(record.id.clone()))
            }
            Err(e) => Err(Error::OperationFailed(e)),
        }
    }

    pub async fn record_by_id(&mut self, id: &str) -> Result<Option<PositionRecord>> {
        let conn = self.conn()?;
        let row: Option<RecordRow> = sqlx::query_as(&format!("{SELECT_RECORD} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(Error::OperationFailed)?;
        row.map(PositionRecord::try_from).transpose()
    }

    /// Pending records of one type for an asset. Records with a close in flight
    /// are left out.
    pub async fn records_by_type(
        &mut self,
        asset: &str,
        order_type: OrderType,
    ) -> Result<Vec<PositionRecord>> {
        let conn = self.conn()?;
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "{SELECT_RECORD} WHERE asset = ? AND order_type = ? \
             AND closed = 0 AND close_attempted_at IS NULL"
        ))
        .bind(asset)
        .bind(order_type.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::OperationFailed)?;
        into_records(rows)
    }

    /// Pending records whose trigger price `price` has crossed.
    pub async fn viable_records(
        &mut self,
        asset: &str,
        order_type: OrderType,
        price: Decimal,
    ) -> Result<Vec<PositionRecord>> {
        let records = self.records_by_type(asset, order_type).await?;
        Ok(records.into_iter().filter(|r| r.is_viable(price)).collect())
    }

    pub async fn all_records(&mut self) -> Result<Vec<PositionRecord>> {
        let conn = self.conn()?;
        let rows: Vec<RecordRow> = sqlx::query_as(&format!("{SELECT_RECORD} ORDER BY timestamp"))
            .fetch_all(&mut *conn)
            .await
            .map_err(Error::OperationFailed)?;
        into_records(rows)
    }

    /// Records for `asset` whose close was started but not cleaned up.
    pub async fn in_flight_records(&mut self, asset: &str) -> Result<Vec<PositionRecord>> {
        let conn = self.conn()?;
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "{SELECT_RECORD} WHERE asset = ? AND (closed = 1 OR close_attempted_at IS NOT NULL)"
        ))
        .bind(asset)
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::OperationFailed)?;
        into_records(rows)
    }

    /// Removes a record. Deleting an id that is not there is not an error.
    pub async fn delete_record(&mut self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let done = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(Error::OperationFailed)?;
        debug!(id, rows = done.rows_affected(), "Record deleted from ledger");
        Ok(())
    }

    /// Notes that a closing order is about to be sent for `id`.
    pub async fn mark_closing(&mut self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.update_one(
            sqlx::query("UPDATE records SET close_attempted_at = ? WHERE id = ?")
                .bind(at)
                .bind(id),
            id,
        )
        .await
    }

    /// Undoes [`mark_closing`](Self::mark_closing) after the exchange refused the close.
    pub async fn clear_closing(&mut self, id: &str) -> Result<()> {
        self.update_one(
            sqlx::query("UPDATE records SET close_attempted_at = NULL WHERE id = ? AND closed = 0")
                .bind(id),
            id,
        )
        .await
    }

    /// Marks `id` closed by the exchange order `close_order_id`.
    pub async fn record_close_order(
        &mut self,
        id: &str,
        close_order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.update_one(
            sqlx::query(
                "UPDATE records SET closed = 1, close_id = ?, close_timestamp = ?, \
                 close_attempted_at = COALESCE(close_attempted_at, ?) WHERE id = ?",
            )
            .bind(close_order_id)
            .bind(at)
            .bind(at)
            .bind(id),
            id,
        )
        .await
    }

    /// Stores the settled volume, cost, fees and status of a record.
    pub async fn update_settlement(&mut self, record: &PositionRecord) -> Result<()> {
        self.update_one(
            sqlx::query(
                "UPDATE records SET volume = ?, cost = ?, status = ?, asset_fee = ?, \
                 counter_fee = ? WHERE id = ?",
            )
            .bind(record.open_volume.to_string())
            .bind(record.open_cost.to_string())
            .bind(record.status.as_str())
            .bind(record.asset_fee.to_string())
            .bind(record.counter_fee.to_string())
            .bind(&record.id),
            &record.id,
        )
        .await
    }

    async fn update_one<'q>(
        &mut self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        id: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let done = query.execute(&mut *conn).await.map_err(Error::OperationFailed)?;
        if done.rows_affected() == 0 {
            warn!(id, "Ledger update matched no record");
        }
        Ok(())
    }
}

impl Drop for LedgerHandle {
    fn drop(&mut self) {
        if self.conn.is_some() {
            debug!("Ledger handle dropped without close; releasing connection");
        }
    }
}
