//! Bounded retry with exponential backoff for source-data fetches.

use std::{fmt::Display, future::Future, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How many times to try a fetch and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, including the first. Values below 1 behave as 1.
  pub max_attempts:    u32,
  #[serde(with = "millis")]
  pub initial_backoff: Duration,
  #[serde(with = "millis")]
  pub max_backoff:     Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:    3,
      initial_backoff: Duration::from_millis(200),
      max_backoff:     Duration::from_secs(5),
    }
  }
}

impl RetryPolicy {
  /// A policy that tries once and never sleeps.
  pub fn none() -> Self {
    Self { max_attempts: 1, initial_backoff: Duration::ZERO, max_backoff: Duration::ZERO }
  }

  /// Delay before attempt `attempt + 1` (0-based `attempt`), doubling each
  /// time and capped at `max_backoff`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
  }
}

/// Run `fetch` until it succeeds or the policy is exhausted.
///
/// The final failure, or a successful but empty result, is reported as
/// [`Error::DataUnavailable`] naming `source_name`. Empty results are not
/// retried.
pub async fn fetch_with_retry<T, E, F, Fut>(
  policy: &RetryPolicy,
  source_name: &str,
  mut fetch: F,
) -> Result<Vec<T>>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<Vec<T>, E>>,
  E: Display,
{
  let attempts = policy.max_attempts.max(1);
  let mut attempt = 0;
  loop {
    match fetch().await {
      Ok(rows) if rows.is_empty() => {
        return Err(Error::DataUnavailable {
          source_name: source_name.to_owned(),
          reason:      "no rows returned".to_owned(),
        });
      }
      Ok(rows) => return Ok(rows),
      Err(e) if attempt + 1 < attempts => {
        let delay = policy.backoff(attempt);
        tracing::warn!(
          source = source_name,
          attempt = attempt + 1,
          error = %e,
          delay_ms = delay.as_millis() as u64,
          "fetch failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(e) => {
        return Err(Error::DataUnavailable {
          source_name: source_name.to_owned(),
          reason:      format!("{e} (after {attempts} attempts)"),
        });
      }
    }
  }
}

mod millis {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_millis(u64::deserialize(d)?))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn fast(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
      max_attempts,
      initial_backoff: Duration::from_millis(1),
      max_backoff: Duration::from_millis(2),
    }
  }

  #[test]
  fn backoff_doubles_and_caps() {
    let p = RetryPolicy {
      max_attempts:    5,
      initial_backoff: Duration::from_millis(100),
      max_backoff:     Duration::from_millis(350),
    };
    assert_eq!(p.backoff(0), Duration::from_millis(100));
    assert_eq!(p.backoff(1), Duration::from_millis(200));
    assert_eq!(p.backoff(2), Duration::from_millis(350));
    assert_eq!(p.backoff(40), Duration::from_millis(350));
  }

  #[tokio::test]
  async fn succeeds_after_transient_failures() {
    let calls = &AtomicU32::new(0);
    let rows = fetch_with_retry(&fast(3), "events", || async move {
      if calls.fetch_add(1, Ordering::SeqCst) < 2 {
        Err("connection reset")
      } else {
        Ok(vec![1, 2, 3])
      }
    })
    .await
    .unwrap();
    assert_eq!(rows, vec![1, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_max_attempts() {
    let calls = &AtomicU32::new(0);
    let err = fetch_with_retry(&fast(2), "forecasts", || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<Vec<u8>, _>("timeout")
    })
    .await
    .unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(matches!(err, Error::DataUnavailable { ref source_name, .. } if source_name == "forecasts"));
  }

  #[tokio::test]
  async fn empty_result_is_unavailable_without_retry() {
    let calls = &AtomicU32::new(0);
    let err = fetch_with_retry(&fast(5), "events", || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok::<Vec<u8>, &str>(vec![])
    })
    .await
    .unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err, Error::DataUnavailable { .. }));
  }
}
