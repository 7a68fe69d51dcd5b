//! Pooled connection strategy
//!
//! `PooledProvider` keeps released connections idle for reuse instead of
//! closing them. It plugs into the same `ConnectionProvider` seam as
//! `PerCallProvider`, so the operation layer is unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use mysql_helper::prelude::*;
//! use mysql_helper::pool::{PoolConfig, PooledProvider};
//!
//! let provider = PooledProvider::new(factory, PoolConfig::new("mysql://localhost/app"));
//! let helper = MySqlHelper::with_provider(provider);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::acquire::{acquire_connection, AtomicAcquireStats};
use crate::connection::{
    Connection, ConnectionConfig, ConnectionFactory, ConnectionProvider, ReleaseConnection,
    ScopedConnection,
};
use crate::error::Result;

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connection configuration
    pub connection: ConnectionConfig,
    /// Maximum number of idle connections kept
    pub max_idle: usize,
    /// Maximum age of a physical connection, counted from when it was
    /// opened. Older connections are closed instead of being reused.
    pub max_lifetime: Duration,
    /// Validate idle connections before handing them out
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            max_idle: 8,
            max_lifetime: Duration::from_secs(1800),
            test_on_borrow: true,
        }
    }
}

impl PoolConfig {
    /// Create pool config with URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig::new(url),
            ..Default::default()
        }
    }

    /// Set max idle connections
    pub fn with_max_idle(mut self, size: usize) -> Self {
        self.max_idle = size;
        self
    }

    /// Set max lifetime
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set test on borrow
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = test;
        self
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Physical connections opened
    pub opened: u64,
    /// Physical connections closed
    pub closed: u64,
    /// Connections handed out
    pub acquisitions: u64,
    /// Acquisitions served from the idle list
    pub reused: u64,
    /// Idle connections discarded because validation failed
    pub health_check_failures: u64,
}

#[derive(Debug, Default)]
struct AtomicPoolStats {
    closed: AtomicU64,
    acquisitions: AtomicU64,
    reused: AtomicU64,
    health_check_failures: AtomicU64,
}

struct PoolEntry {
    conn: Box<dyn Connection>,
    created_at: Instant,
}

struct PoolInner {
    factory: Arc<dyn ConnectionFactory>,
    config: PoolConfig,
    idle: Mutex<Vec<PoolEntry>>,
    opens: AtomicAcquireStats,
    stats: AtomicPoolStats,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Vec<PoolEntry>> {
        self.idle.lock()
    }

    fn discard(&self, conn: Box<dyn Connection>) {
        if let Err(e) = conn.close() {
            warn!(error = %e, "error while closing pooled connection");
        }
        self.stats.closed.fetch_add(1, Ordering::Relaxed);
    }

    fn expired(&self, created_at: Instant) -> bool {
        created_at.elapsed() > self.config.max_lifetime
    }

    /// Pop idle connections until one is fresh and (optionally) valid
    fn take_idle(&self) -> Option<PoolEntry> {
        loop {
            let mut entry = self.idle().pop()?;
            if self.expired(entry.created_at) {
                trace!("recycling expired connection");
                self.discard(entry.conn);
                continue;
            }

            if self.config.test_on_borrow && !entry.conn.is_valid() {
                self.stats
                    .health_check_failures
                    .fetch_add(1, Ordering::Relaxed);
                self.discard(entry.conn);
                continue;
            }

            return Some(entry);
        }
    }
}

impl ReleaseConnection for PoolInner {
    fn release(&self, conn: Box<dyn Connection>, opened_at: Instant) {
        if self.expired(opened_at) {
            trace!("recycling expired connection on return");
            self.discard(conn);
            return;
        }

        let mut idle = self.idle();
        if idle.len() < self.config.max_idle {
            idle.push(PoolEntry {
                conn,
                created_at: opened_at,
            });
            trace!(idle = idle.len(), "connection returned to pool");
        } else {
            drop(idle);
            self.discard(conn);
        }
    }
}

/// Connection strategy reusing idle connections
pub struct PooledProvider {
    inner: Arc<PoolInner>,
}

impl PooledProvider {
    /// Create an empty pool; connections are opened on demand
    pub fn new(factory: Arc<dyn ConnectionFactory>, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                idle: Mutex::new(Vec::new()),
                opens: AtomicAcquireStats::new(),
                stats: AtomicPoolStats::default(),
            }),
        }
    }

    /// Get pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Number of idle connections
    pub fn idle(&self) -> usize {
        self.inner.idle().len()
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let s = &self.inner.stats;
        PoolStats {
            opened: self.inner.opens.snapshot().opened,
            closed: s.closed.load(Ordering::Relaxed),
            acquisitions: s.acquisitions.load(Ordering::Relaxed),
            reused: s.reused.load(Ordering::Relaxed),
            health_check_failures: s.health_check_failures.load(Ordering::Relaxed),
        }
    }

    /// Close every idle connection. Connections in use are closed or pooled
    /// again when their scope ends.
    pub fn close_idle(&self) {
        let drained: Vec<_> = self.inner.idle().drain(..).collect();
        debug!(count = drained.len(), "closing idle connections");
        for entry in drained {
            self.inner.discard(entry.conn);
        }
    }
}

impl ConnectionProvider for PooledProvider {
    fn acquire(&self) -> Result<ScopedConnection> {
        let entry = match self.inner.take_idle() {
            Some(entry) => {
                self.inner.stats.reused.fetch_add(1, Ordering::Relaxed);
                entry
            }
            None => PoolEntry {
                conn: acquire_connection(
                    self.inner.factory.as_ref(),
                    &self.inner.config.connection,
                    &self.inner.opens,
                )?,
                created_at: Instant::now(),
            },
        };

        self.inner
            .stats
            .acquisitions
            .fetch_add(1, Ordering::Relaxed);
        Ok(ScopedConnection::with_opened_at(
            entry.conn,
            entry.created_at,
            self.inner.clone(),
        ))
    }
}

impl Drop for PooledProvider {
    fn drop(&mut self) {
        self.close_idle();
    }
}

impl std::fmt::Debug for PooledProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledProvider")
            .field("driver", &self.inner.factory.name())
            .field("config", &self.inner.config)
            .finish()
    }
}
