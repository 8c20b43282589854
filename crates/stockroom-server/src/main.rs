//! stockroom-server binary.
//!
//! Settings come from `config.toml` (or `--config FILE`) overlaid with
//! `STOCKROOM_*` environment variables; nested keys use `__`, as in
//! `STOCKROOM_RETRY__MAX_ATTEMPTS=5`.
//!
//! Generate the `auth_password_hash` value with:
//!
//! ```text
//! stockroom-server --hash-password
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use stockroom_server::{AppState, ServerConfig};
use stockroom_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Serve Stockroom reconciliations over HTTP")]
struct Cli {
  #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
  config: PathBuf,

  /// Read a password from stdin, print its argon2 PHC string, and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_password {
    println!("{}", hash_password(&read_line("Password: ")?)?);
    return Ok(());
  }

  let server_cfg = load_config(&cli.config)?;
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("opening store at {}", server_cfg.store_path.display()))?;

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("binding {address}"))?;
  tracing::info!(%address, lookback_days = server_cfg.lookback_days, "serving");

  let app = stockroom_server::router(AppState::new(store, server_cfg));
  axum::serve(listener, app).await.context("serving HTTP")
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let mut cfg: ServerConfig = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("STOCKROOM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .and_then(|c| c.try_deserialize::<ServerConfig>())
    .with_context(|| format!("loading server config from {}", path.display()))?;
  cfg.store_path = expand_tilde(&cfg.store_path);
  Ok(cfg)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| anyhow::anyhow!("hashing password: {e}"))
}

fn read_line(prompt: &str) -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("{prompt}");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

fn expand_tilde(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHash, PasswordVerifier};

  use super::*;

  #[test]
  fn config_file_fills_defaults() {
    let path = std::env::temp_dir().join(format!("stockroom-{}.toml", std::process::id()));
    std::fs::write(
      &path,
      "auth_username = \"ops\"\nauth_password_hash = \"x\"\nport = 9001\n\n[retry]\nmax_attempts = 4\n",
    )
    .unwrap();
    let cfg = load_config(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.auth_username, "ops");
    assert_eq!(cfg.port, 9001);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.lookback_days, 30);
    assert_eq!(cfg.retry.max_attempts, 4);
  }

  #[test]
  fn hashed_password_verifies() {
    let hash = hash_password("hunter2").unwrap();
    let parsed = PasswordHash::new(&hash).unwrap();
    assert!(Argon2::default().verify_password(b"hunter2", &parsed).is_ok());
  }

  #[test]
  fn tilde_is_expanded_only_at_start() {
    assert_eq!(expand_tilde(Path::new("data/x.db")), PathBuf::from("data/x.db"));
    if let Some(home) = std::env::var_os("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
  }
}
