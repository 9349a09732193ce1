//! A single retry policy parameterized by (max attempts, base delay, cap),
//! consolidating the near-identical retry helpers the design notes (§9,
//! "Unified retry") call out. `storage::read`/`storage::writeSync` use the
//! default profile; `storage::deletion` uses the tighter hot-path profile.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    /// §4.1 `read`/`writeSync` default: 50ms base, doubling, capped at 2s,
    /// up to 10 attempts.
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(50),
        cap: Duration::from_secs(2),
    };

    /// §4.1 `deletion`: tighter hot-path profile, 15 attempts, 25ms base,
    /// capped at 1s.
    pub const DELETION: RetryPolicy = RetryPolicy {
        max_attempts: 15,
        base_delay: Duration::from_millis(25),
        cap: Duration::from_secs(1),
    };

    /// §4.6 TMDB cache consumer: 5 attempts, exponential with jitter,
    /// reusing the default profile's 2s cap.
    pub const TMDB_CACHE: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(50),
        cap: Duration::from_secs(2),
    };

    /// §4.2 step 5 deletion sweep: 3 attempts, doubling delay from 100ms.
    pub const SCAN_SWEEP: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        cap: Duration::from_secs(1),
    };

    /// Delay before attempt `attempt` (0-indexed), doubling from
    /// `base_delay` and capped at `cap`, with +/-50% jitter (§4.1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.cap.as_millis());
        let jitter_frac = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = (capped as f64 * jitter_frac) as u64;
        Duration::from_millis(jittered)
    }
}

/// True when `err` looks like a transient SQLite contention error
/// (`SQLITE_BUSY` / "database is locked") rather than a structural failure.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("busy")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Retry `op` under `policy` while it fails with a transient error.
/// Non-transient errors (including schema-level errors, which callers
/// downgrade separately per §7 kind 8) are returned immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> sqlx::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = sqlx::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    target: "cinesync_core::storage",
                    %label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient database error: {err}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_is_capped() {
        let policy = RetryPolicy::DEFAULT;
        for attempt in 0..12 {
            let delay = policy.delay_for(attempt);
            assert!(delay <= policy.cap + policy.cap / 2);
        }
    }

    #[test]
    fn recognizes_locked_message() {
        let err = sqlx::Error::PoolTimedOut;
        assert!(is_transient(&err));
    }
}
