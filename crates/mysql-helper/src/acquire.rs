//! Connection acquisition with bounded retry
//!
//! `acquire_connection` keeps calling the factory until it succeeds or the
//! configured budget (`ConnectionConfig::connect_timeout_ms`) is spent, then
//! fails with a `Connection` error carrying "Unable to connect" and the last
//! driver error as its source.
//!
//! `PerCallProvider` is the open-per-operation strategy: every `acquire`
//! opens a fresh physical connection and the scope guard closes it.

use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, trace, warn};

use crate::connection::{
    Connection, ConnectionConfig, ConnectionFactory, ConnectionProvider, ReleaseConnection,
    ScopedConnection,
};
use crate::error::{Error, Result};

/// Shortest pause between two attempts
const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Backoff between failed connection attempts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failed attempt (ms)
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay (ms)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry)
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0) applied around the computed delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a retry config with fixed delay (no exponential backoff)
    pub fn fixed_delay(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            initial_delay_ms: ms,
            max_delay_ms: ms,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set max delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    ///
    /// Attempt 0 yields zero. The result is deterministic for a given
    /// attempt so that backoff schedules are reproducible.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let capped_attempt = attempt.min(30);
        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(capped_attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            let jitter_value = (attempt as f64 * 0.618033988749895) % 1.0;
            jitter_range * (jitter_value - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((capped_delay + jitter).max(0.0) as u64)
    }
}

/// Acquisition statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireStats {
    /// Calls to the factory
    pub attempts: u64,
    /// Attempts that returned an error
    pub failed_attempts: u64,
    /// Physical connections opened
    pub opened: u64,
    /// Physical connections closed
    pub closed: u64,
}

impl AcquireStats {
    /// Connections currently open
    pub fn open(&self) -> u64 {
        self.opened.saturating_sub(self.closed)
    }
}

/// Atomic acquisition stats for concurrent updates
#[derive(Debug, Default)]
pub struct AtomicAcquireStats {
    attempts: AtomicU64,
    failed_attempts: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
}

impl AtomicAcquireStats {
    /// Create new atomic stats
    pub fn new() -> Self {
        Self::default()
    }

    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_opened(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection close
    pub fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current stats
    pub fn snapshot(&self) -> AcquireStats {
        AcquireStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            opened: self.opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }
}

/// Open a connection, retrying with backoff until the budget is spent.
///
/// The first attempt always runs, even with a zero budget. Every failure is
/// retried; once the elapsed time reaches `config.connect_timeout()` the last
/// failure is wrapped in `Error::Connection("Unable to connect")`.
pub fn acquire_connection(
    factory: &dyn ConnectionFactory,
    config: &ConnectionConfig,
    stats: &AtomicAcquireStats,
) -> Result<Box<dyn Connection>> {
    let budget = config.connect_timeout();
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        stats.record_attempt();

        match factory.connect(config) {
            Ok(conn) => {
                stats.record_opened();
                trace!(driver = factory.name(), attempt, "connection opened");
                return Ok(conn);
            }
            Err(e) => {
                stats.record_failure();
                let elapsed = start.elapsed();
                if elapsed >= budget {
                    error!(
                        driver = factory.name(),
                        attempts = attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "Unable to connect"
                    );
                    return Err(Error::connection_with_source("Unable to connect", e));
                }

                let delay = config
                    .retry
                    .delay_for_attempt(attempt)
                    .min(budget - elapsed)
                    .max(MIN_RETRY_DELAY);
                warn!(
                    driver = factory.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "connection attempt failed, retrying"
                );
                std::thread::sleep(delay);
            }
        }
    }
}

/// Closes every connection handed back to it
#[derive(Debug)]
struct CloseOnRelease {
    stats: Arc<AtomicAcquireStats>,
}

impl ReleaseConnection for CloseOnRelease {
    fn release(&self, conn: Box<dyn Connection>, _opened_at: Instant) {
        if let Err(e) = conn.close() {
            warn!(error = %e, "error while closing connection");
        }
        self.stats.record_closed();
        trace!("connection closed");
    }
}

/// Open-per-operation strategy: no caching, no pooling.
pub struct PerCallProvider {
    factory: Arc<dyn ConnectionFactory>,
    config: ConnectionConfig,
    stats: Arc<AtomicAcquireStats>,
    closer: Arc<CloseOnRelease>,
}

impl PerCallProvider {
    /// Create a provider opening connections through `factory`
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: ConnectionConfig) -> Self {
        let stats = Arc::new(AtomicAcquireStats::new());
        let closer = Arc::new(CloseOnRelease {
            stats: Arc::clone(&stats),
        });
        Self {
            factory,
            config,
            stats,
            closer,
        }
    }

    /// Connection configuration in use
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Acquisition statistics
    pub fn stats(&self) -> AcquireStats {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for PerCallProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerCallProvider")
            .field("driver", &self.factory.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ConnectionProvider for PerCallProvider {
    fn acquire(&self) -> Result<ScopedConnection> {
        let conn = acquire_connection(self.factory.as_ref(), &self.config, &self.stats)?;
        Ok(ScopedConnection::new(conn, self.closer.clone()))
    }
}
