//! [`SqliteStore`]: the SQLite implementation of [`InventoryStore`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;

use stockroom_core::{
  ValidationError,
  record::{EventRecord, ForecastRecord, validate_events, validate_forecasts},
  refill::{RefillDecision, RefillOutcome, RefillRequest},
  store::{EventQuery, InventoryStore},
};

use crate::{
  Result,
  encode::{
    RawEvent, RawForecast, RawRefill, decode_date, encode_attributes, encode_date,
    encode_dt, encode_event_time, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Stockroom inventory store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── InventoryStore impl ─────────────────────────────────────────────────────

impl InventoryStore for SqliteStore {
  type Error = crate::Error;

  // ── Forecasts ─────────────────────────────────────────────────────────────

  async fn insert_forecasts(&self, records: Vec<ForecastRecord>) -> Result<usize> {
    validate_forecasts(&records)?;
    let count = records.len();

    let rows: Vec<(String, String, f64, f64, f64)> = records
      .into_iter()
      .map(|r| {
        (
          encode_date(r.period_start),
          r.sku,
          r.predicted_units_sold,
          r.predicted_stock_level,
          r.predicted_unit_cost,
        )
      })
      .collect();

    // Returns the first key that already exists; the transaction is dropped
    // (rolled back) in that case.
    let duplicate: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut exists =
            tx.prepare("SELECT 1 FROM forecasts WHERE period_start = ?1 AND sku = ?2")?;
          let mut insert = tx.prepare(
            "INSERT INTO forecasts (
               period_start, sku, predicted_units_sold,
               predicted_stock_level, predicted_unit_cost
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for (period_start, sku, units, stock, cost) in &rows {
            if exists.exists(rusqlite::params![period_start, sku])? {
              return Ok(Some((period_start.clone(), sku.clone())));
            }
            insert.execute(rusqlite::params![period_start, sku, units, stock, cost])?;
          }
        }
        tx.commit()?;
        Ok(None)
      })
      .await?;

    if let Some((period_start, sku)) = duplicate {
      return Err(
        ValidationError::DuplicateForecastKey {
          period_start: decode_date(&period_start)?,
          sku,
        }
        .into(),
      );
    }

    tracing::info!(count, "forecasts stored");
    Ok(count)
  }

  async fn list_forecasts(&self) -> Result<Vec<ForecastRecord>> {
    let raws: Vec<RawForecast> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM forecasts ORDER BY forecast_id",
          RawForecast::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawForecast::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawForecast::into_forecast).collect()
  }

  async fn get_forecast(
    &self,
    period_start: NaiveDate,
    sku: String,
  ) -> Result<Option<ForecastRecord>> {
    let period_str = encode_date(period_start);

    let raw: Option<RawForecast> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM forecasts WHERE period_start = ?1 AND sku = ?2",
                RawForecast::COLUMNS
              ),
              rusqlite::params![period_str, sku],
              RawForecast::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawForecast::into_forecast).transpose()
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn insert_events(&self, events: Vec<EventRecord>) -> Result<usize> {
    validate_events(&events)?;
    let count = events.len();

    let rows = events
      .into_iter()
      .map(|e| {
        Ok((
          encode_event_time(e.event_time),
          encode_attributes(&e.attributes)?,
          e,
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut insert = tx.prepare(
            "INSERT INTO events (
               event_time, sku, actual_units_sold, actual_stock_level,
               unit_price, unit_cost, attributes
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          )?;
          for (event_time, attributes, e) in &rows {
            insert.execute(rusqlite::params![
              event_time,
              e.sku,
              e.actual_units_sold,
              e.actual_stock_level,
              e.unit_price,
              e.unit_cost,
              attributes,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(count, "events stored");
    Ok(count)
  }

  async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventRecord>> {
    let since = query.since.map(encode_event_time);
    let until = query.until.map(encode_event_time);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_time, sku, actual_units_sold, actual_stock_level,
                  unit_price, unit_cost, attributes
           FROM events
           WHERE (?1 IS NULL OR event_time >= ?1)
             AND (?2 IS NULL OR event_time < ?2)
           ORDER BY event_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since, until], |row| {
            Ok(RawEvent {
              event_time:         row.get(0)?,
              sku:                row.get(1)?,
              actual_units_sold:  row.get(2)?,
              actual_stock_level: row.get(3)?,
              unit_price:         row.get(4)?,
              unit_cost:          row.get(5)?,
              attributes:         row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  // ── Refills ───────────────────────────────────────────────────────────────

  async fn submit_refill(&self, req: RefillRequest) -> Result<RefillOutcome> {
    req.validate()?;
    let decision = RefillDecision::from_request(&req);

    let period_str = encode_date(req.period_start);
    let sku = req.sku.clone();
    let quantity = req.quantity;
    let id_str = encode_uuid(decision.decision_id);
    let at_str = encode_dt(decision.recorded_at);

    // Increment and ledger append commit together or not at all.
    let raw: Option<RawForecast> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE forecasts
           SET predicted_stock_level = predicted_stock_level + ?3
           WHERE period_start = ?1 AND sku = ?2",
          rusqlite::params![period_str, sku, quantity],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO refill_ledger (decision_id, period_start, sku, quantity, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, period_str, sku, quantity, at_str],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM forecasts WHERE period_start = ?1 AND sku = ?2",
            RawForecast::COLUMNS
          ),
          rusqlite::params![period_str, sku],
          RawForecast::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    let Some(raw) = raw else {
      return Err(
        stockroom_core::Error::ForecastNotFound {
          period_start: req.period_start,
          sku:          req.sku,
        }
        .into(),
      );
    };
    let forecast = raw.into_forecast()?;

    tracing::info!(
      period_start = %req.period_start,
      sku = %req.sku,
      quantity = req.quantity,
      stock_level = forecast.predicted_stock_level,
      "refill recorded"
    );
    Ok(RefillOutcome { decision, forecast })
  }

  async fn refill_ledger(&self) -> Result<Vec<RefillDecision>> {
    let raws: Vec<RawRefill> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT decision_id, period_start, sku, quantity, recorded_at
           FROM refill_ledger ORDER BY seq",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawRefill {
              decision_id:  row.get(0)?,
              period_start: row.get(1)?,
              sku:          row.get(2)?,
              quantity:     row.get(3)?,
              recorded_at:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRefill::into_decision).collect()
  }
}
