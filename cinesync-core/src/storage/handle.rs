//! One long-lived handle per embedded database (§4.1). Reads run against a
//! bounded pool of connections (WAL readers never block the writer);
//! writes are serialized through a single owned worker task draining a
//! bounded channel, per the design notes' guidance (§9) to model
//! `writeSync` as an owned worker task rather than a package-level
//! `sync.Once`-guarded global.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryPolicy};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type WriteJob = Box<dyn for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, ()> + Send>;

/// Tuning knobs for one database handle. Defaults match §4.1's numbers for
/// DB-SOURCE; DB-MAIN doubles the queue capacity since its write volume
/// runs well above DB-SOURCE's.
#[derive(Debug, Clone, Copy)]
pub struct HandleConfig {
    pub read_pool_size: u32,
    pub write_queue_capacity: usize,
}

impl HandleConfig {
    pub const SOURCE: HandleConfig = HandleConfig {
        read_pool_size: 8,
        write_queue_capacity: 1000,
    };

    pub const MAIN: HandleConfig = HandleConfig {
        read_pool_size: 8,
        write_queue_capacity: 2000,
    };

    pub const AUX: HandleConfig = HandleConfig {
        read_pool_size: 8,
        write_queue_capacity: 1000,
    };

    /// Override the writer-bound input (`DB_MAX_WORKERS`, clamped 1..20
    /// by the caller) that `open()` multiplies into the read-pool bound,
    /// keeping the preset's queue capacity.
    pub fn with_workers(self, workers: u32) -> HandleConfig {
        HandleConfig { read_pool_size: workers, ..self }
    }

    /// Read-pool bound: ~3x an assumed single writer, clamped to 40 (§4.1).
    pub fn clamped_read_bound(writer_bound: u32) -> u32 {
        (writer_bound * 3).clamp(1, 40)
    }
}

/// A handle to one embedded relational database (DB-SOURCE, DB-MAIN or
/// DB-AUX). Cheap to clone — `SqlitePool` and the write-queue sender are
/// both internally reference-counted.
#[derive(Clone)]
pub struct DbHandle {
    name: &'static str,
    read_pool: SqlitePool,
    write_tx: mpsc::Sender<WriteJob>,
}

impl DbHandle {
    /// Open (or create) the database at `path`, applying the pragmas §4.1
    /// requires, spawning the writer task and the WAL-checkpoint timer.
    /// Idempotent to call more than once against the same handle value,
    /// but callers should keep exactly one `DbHandle` per database path
    /// alive per process (the write queue is per-handle, not per-path).
    pub async fn open(name: &'static str, path: &std::path::Path, config: HandleConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Config(format!("failed to create directory for {name}: {e}"))
            })?;
        }

        let connect_options = Self::connect_options(path);

        let read_bound = HandleConfig::clamped_read_bound(config.read_pool_size);
        let read_pool = SqlitePoolOptions::new()
            .max_connections(read_bound)
            .connect_with(connect_options.clone())
            .await
            .map_err(Error::Db)?;

        let mut writer_conn = SqliteConnection::connect_with(&connect_options)
            .await
            .map_err(Error::Db)?;

        crate::storage::schema::bootstrap(name, &mut writer_conn).await?;

        let (write_tx, write_rx) = mpsc::channel(config.write_queue_capacity);
        tokio::spawn(Self::run_writer(name, writer_conn, write_rx));

        let handle = DbHandle {
            name,
            read_pool,
            write_tx,
        };
        handle.spawn_wal_checkpoint_timer();

        info!(db = name, path = %path.display(), read_bound, "opened database handle");
        Ok(handle)
    }

    fn connect_options(path: &std::path::Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(60))
            .foreign_keys(true)
            .auto_vacuum(SqliteAutoVacuum::Incremental)
            .pragma("temp_store", "memory")
            .pragma("mmap_size", "134217728")
    }

    /// Run a read-only operation under the bounded read pool, retrying
    /// transient busy errors (§4.1 `read`).
    pub async fn read<T, F, Fut>(&self, label: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = sqlx::Result<T>> + Send,
    {
        let pool = self.read_pool.clone();
        with_retry(RetryPolicy::DEFAULT, label, move || op(pool.clone()))
            .await
            .map_err(|e| self.downgrade_missing_table(e))
    }

    /// Enqueue a write closure and wait for its result (§4.1 `writeSync`).
    /// Enqueueing blocks (rather than failing fast) when the queue is
    /// momentarily full, preserving strict FIFO order of writes; a warning
    /// is logged so sustained back-pressure is visible in the logs.
    pub async fn write_sync<T, F, Fut>(&self, label: &'static str, policy: RetryPolicy, mut op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&mut SqliteConnection) -> Fut + Send + 'static,
        Fut: Future<Output = sqlx::Result<T>> + Send,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let name = self.name;
        let job: WriteJob = Box::new(move |conn| {
            Box::pin(async move {
                let result = with_retry(policy, label, || op(&mut *conn)).await;
                let _ = reply_tx.send(result);
            })
        });

        if self.write_tx.capacity() == 0 {
            warn!(db = name, %label, "write queue full, waiting for a slot");
        }
        self.write_tx
            .send(job)
            .await
            .map_err(|_| Error::Internal(format!("{name} writer task has shut down")))?;

        reply_rx
            .await
            .map_err(|_| Error::Internal(format!("{name} writer task dropped reply channel")))?
            .map_err(|e| self.downgrade_missing_table(e))
    }

    /// `writeSync` wrapper that runs `f` inside a transaction, committing on
    /// `Ok` and rolling back otherwise (§4.1 `tx`). Built directly against
    /// the write queue (rather than through `write_sync`) so the retry loop
    /// can hold a plain mutable borrow of `f` across attempts instead of
    /// moving it — `f` is an arbitrary caller closure, not cheaply
    /// cloneable the way the owned-data closures elsewhere in this module
    /// are.
    pub async fn tx<T, F, Fut>(&self, label: &'static str, mut f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Fut + Send + 'static,
        Fut: Future<Output = sqlx::Result<T>> + Send,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let name = self.name;
        let job: WriteJob = Box::new(move |conn| {
            Box::pin(async move {
                let result = with_retry(RetryPolicy::DEFAULT, label, || async {
                    let mut txn = conn.begin().await?;
                    match f(&mut txn).await {
                        Ok(value) => {
                            txn.commit().await?;
                            Ok(value)
                        }
                        Err(e) => {
                            let _ = txn.rollback().await;
                            Err(e)
                        }
                    }
                })
                .await;
                let _ = reply_tx.send(result);
            })
        });

        if self.write_tx.capacity() == 0 {
            warn!(db = name, %label, "write queue full, waiting for a slot");
        }
        self.write_tx
            .send(job)
            .await
            .map_err(|_| Error::Internal(format!("{name} writer task has shut down")))?;

        reply_rx
            .await
            .map_err(|_| Error::Internal(format!("{name} writer task dropped reply channel")))?
            .map_err(|e| self.downgrade_missing_table(e))
    }

    /// `writeSync` variant with the tighter hot-path retry profile used for
    /// deletion bursts (§4.1 `deletion`).
    pub async fn deletion<T, F, Fut>(&self, label: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&mut SqliteConnection) -> Fut + Send + 'static,
        Fut: Future<Output = sqlx::Result<T>> + Send,
    {
        self.write_sync(label, RetryPolicy::DELETION, op).await
    }

    pub fn read_pool(&self) -> &SqlitePool {
        &self.read_pool
    }

    /// Issue one passive WAL checkpoint immediately, for the shutdown
    /// sequence (§10.6) rather than waiting on the 5-minute timer.
    pub async fn checkpoint(&self) -> Result<()> {
        let (busy, log_frames, checkpointed) = sqlx::query_as::<_, (i64, i64, i64)>("PRAGMA wal_checkpoint(PASSIVE)")
            .fetch_one(&self.read_pool)
            .await
            .map_err(Error::from)?;
        info!(db = self.name, busy, log_frames, checkpointed, "shutdown WAL checkpoint complete");
        Ok(())
    }

    fn downgrade_missing_table(&self, err: sqlx::Error) -> Error {
        let cinesync_err = Error::from(err);
        if cinesync_err.is_missing_table() {
            warn!(db = self.name, "missing table treated as organizer-not-started-yet, returning empty result upstream");
        }
        cinesync_err
    }

    async fn run_writer(name: &'static str, mut conn: SqliteConnection, mut rx: mpsc::Receiver<WriteJob>) {
        info!(db = name, "write queue worker started");
        while let Some(job) = rx.recv().await {
            job(&mut conn).await;
        }
        info!(db = name, "write queue worker stopped");
    }

    /// Every 5 minutes, issue a passive WAL checkpoint and log a note when
    /// the WAL had grown past 500 pending frames (§4.1 background WAL
    /// manager). Errors are logged and never propagate.
    fn spawn_wal_checkpoint_timer(&self) {
        let pool = self.read_pool.clone();
        let name = self.name;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                match sqlx::query_as::<_, (i64, i64, i64)>("PRAGMA wal_checkpoint(PASSIVE)")
                    .fetch_one(&pool)
                    .await
                {
                    Ok((busy, log_frames, checkpointed)) => {
                        if log_frames > 500 {
                            info!(
                                db = name,
                                busy,
                                log_frames,
                                checkpointed,
                                "passive WAL checkpoint ran over the 500-frame threshold"
                            );
                        }
                    }
                    Err(e) => error!(db = name, "WAL checkpoint failed: {e}"),
                }
            }
        });
    }
}

/// Helper so `tx`'s `FnMut` can be called without re-borrow issues across
/// the `Fut` associated type boundary.
async fn fut_call<'a, F, Fut, T>(f: &mut F, txn: &mut sqlx::Transaction<'a, sqlx::Sqlite>) -> sqlx::Result<T>
where
    F: FnMut(&mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Fut,
    Fut: Future<Output = sqlx::Result<T>>,
{
    f(txn).await
}
