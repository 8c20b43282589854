//! SQL schema for the Stockroom SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- rowid order is insertion order, which is the reconciliation output order.
CREATE TABLE IF NOT EXISTS forecasts (
    forecast_id           INTEGER PRIMARY KEY,
    period_start          TEXT NOT NULL,   -- YYYY-MM-DD, always a Monday
    sku                   TEXT NOT NULL,
    predicted_units_sold  REAL NOT NULL,
    predicted_stock_level REAL NOT NULL,   -- the only column ever updated
    predicted_unit_cost   REAL NOT NULL,
    UNIQUE (period_start, sku)
);

-- Events are append-only.
CREATE TABLE IF NOT EXISTS events (
    event_id           INTEGER PRIMARY KEY,
    event_time         TEXT NOT NULL,   -- fixed-width ISO 8601, sorts lexically
    sku                TEXT NOT NULL,
    actual_units_sold  REAL NOT NULL,
    actual_stock_level REAL NOT NULL,
    unit_price         REAL NOT NULL,
    unit_cost          REAL NOT NULL,
    attributes         TEXT NOT NULL DEFAULT '{}'
);

-- Every refill decision ever made. No UPDATE or DELETE is issued here.
CREATE TABLE IF NOT EXISTS refill_ledger (
    seq          INTEGER PRIMARY KEY,
    decision_id  TEXT NOT NULL UNIQUE,
    period_start TEXT NOT NULL,
    sku          TEXT NOT NULL,
    quantity     REAL NOT NULL,
    recorded_at  TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE INDEX IF NOT EXISTS events_time_idx  ON events(event_time);
CREATE INDEX IF NOT EXISTS events_sku_idx   ON events(sku);
CREATE INDEX IF NOT EXISTS refill_key_idx   ON refill_ledger(period_start, sku);

PRAGMA user_version = 1;
";
