//! `stockroom`: command-line front end for the Stockroom store.
//!
//! # Usage
//!
//! ```text
//! stockroom --db stock.db ingest forecasts forecasts.csv
//! stockroom --db stock.db ingest events events.csv --cap-outliers 3
//! stockroom --db stock.db reconcile --format csv > reconciled.csv
//! stockroom --db stock.db refill 2024-01-01 SKU42 10
//! ```

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use stockroom_core::{
  pipeline,
  refill::{RefillRequest, latest_per_key},
  retry::{RetryPolicy, fetch_with_retry},
  store::{EventQuery, InventoryStore},
  summary::{forecast_weeks, summarize, sku_history, top_skus_by_sales},
};
use stockroom_etl::{export, extract, transform};
use stockroom_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "stockroom", about = "Reconcile weekly forecasts against live sales")]
struct Args {
  /// Path to a TOML config file (db, lookback_days).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// SQLite database file (default: stockroom.db).
  #[arg(long, env = "STOCKROOM_DB", value_name = "PATH")]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load a CSV file into the store.
  Ingest {
    #[command(subcommand)]
    kind: IngestKind,
  },
  /// Reconcile stored forecasts against stored events.
  Reconcile {
    /// Only show rows for this SKU, oldest week first.
    #[arg(long)]
    sku:           Option<String>,
    #[arg(long, value_enum, default_value_t = Format::Table)]
    format:        Format,
    /// Only use events from the last N days (0 = all events).
    #[arg(long)]
    lookback_days: Option<u32>,
  },
  /// Add stock to one forecast row and record the decision.
  Refill {
    /// Forecast week (a Monday), e.g. 2024-01-01.
    week:     NaiveDate,
    sku:      String,
    quantity: f64,
  },
  /// Show recorded refill decisions.
  Ledger {
    /// Only the most recent decision per (week, sku).
    #[arg(long)]
    latest: bool,
  },
  /// Headline totals and best-selling SKUs.
  Summary {
    #[arg(long, default_value_t = 5)]
    top:           usize,
    /// Only use events from the last N days (0 = all events).
    #[arg(long)]
    lookback_days: Option<u32>,
  },
  /// List forecast weeks, newest first.
  Weeks,
}

#[derive(Subcommand, Debug)]
enum IngestKind {
  /// Transactional events.
  Events {
    path:         PathBuf,
    /// Clamp units sold and stock level to mean ± Z standard deviations.
    #[arg(long, value_name = "Z")]
    cap_outliers: Option<f64>,
  },
  /// Weekly forecast rows.
  Forecasts { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
  Table,
  Json,
  Csv,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  db:            Option<PathBuf>,
  #[serde(default)]
  lookback_days: Option<u32>,
  #[serde(default)]
  retry:         Option<RetryPolicy>,
}

/// Settings after merging flags over the config file over defaults.
struct Settings {
  db:            PathBuf,
  lookback_days: Option<u32>,
  retry:         RetryPolicy,
}

impl Settings {
  fn resolve(args: &Args, file: ConfigFile) -> Self {
    Self {
      db:            args
        .db
        .clone()
        .or(file.db)
        .unwrap_or_else(|| PathBuf::from("stockroom.db")),
      lookback_days: file.lookback_days,
      retry:         file.retry.unwrap_or_default(),
    }
  }

  /// Event window for a command, with a per-command override.
  fn window(&self, override_days: Option<u32>) -> EventQuery {
    match override_days.or(self.lookback_days) {
      Some(days) if days > 0 => EventQuery::lookback(Utc::now().naive_utc(), days),
      _ => EventQuery::default(),
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  // Logs go to stderr so stdout stays clean for json/csv output.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };
  let settings = Settings::resolve(&args, file_cfg);

  let store = SqliteStore::open(&settings.db)
    .await
    .with_context(|| format!("opening store at {}", settings.db.display()))?;

  run(args.command, &store, &settings).await
}

async fn run(command: Command, store: &SqliteStore, settings: &Settings) -> Result<()> {
  match command {
    Command::Ingest { kind: IngestKind::Events { path, cap_outliers } } => {
      let mut events = extract::read_events_path(&path)
        .with_context(|| format!("reading {}", path.display()))?;
      if let Some(z) = cap_outliers {
        anyhow::ensure!(z.is_finite() && z > 0.0, "--cap-outliers must be a positive number");
        let report = transform::cap_outliers(&mut events, z);
        println!(
          "capped {} units-sold and {} stock-level values",
          report.units_sold, report.stock_level
        );
      }
      let n = store.insert_events(events).await.context("storing events")?;
      println!("ingested {n} events");
    }

    Command::Ingest { kind: IngestKind::Forecasts { path } } => {
      let forecasts = extract::read_forecasts_path(&path)
        .with_context(|| format!("reading {}", path.display()))?;
      let n = store.insert_forecasts(forecasts).await.context("storing forecasts")?;
      println!("ingested {n} forecasts");
    }

    Command::Reconcile { sku, format, lookback_days } => {
      let query = settings.window(lookback_days);
      let mut rec = pipeline::reconcile_store(store, &query, &settings.retry).await?;
      if let Some(sku) = &sku {
        rec.rows = sku_history(&rec.rows, sku);
        rec.warnings.retain(|w| &w.sku == sku);
      }
      match format {
        Format::Table => print!("{}", render::reconciliation_table(&rec)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&rec)?),
        Format::Csv => export::write_reconciled(&rec.rows, std::io::stdout().lock())?,
      }
    }

    Command::Refill { week, sku, quantity } => {
      let outcome = store
        .submit_refill(RefillRequest::new(week, sku, quantity))
        .await
        .context("submitting refill")?;
      println!(
        "{} {}: stock level now {}",
        outcome.forecast.period_start, outcome.forecast.sku, outcome.forecast.predicted_stock_level
      );
    }

    Command::Ledger { latest } => {
      let ledger = store.refill_ledger().await?;
      let entries = if latest { latest_per_key(&ledger) } else { ledger };
      print!("{}", render::ledger_table(&entries));
    }

    Command::Summary { top, lookback_days } => {
      let query = settings.window(lookback_days);
      let events =
        fetch_with_retry(&settings.retry, "events", || store.list_events(&query)).await?;
      print!(
        "{}",
        render::summary(&summarize(&events), &top_skus_by_sales(&events, top))
      );
    }

    Command::Weeks => {
      for week in forecast_weeks(&store.list_forecasts().await?) {
        println!("{week}");
      }
    }
  }
  Ok(())
}
