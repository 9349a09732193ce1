//! Storage, scanner, scheduler, broadcaster, protocol-spoof and TMDB-cache
//! core for cinesync-hub. `AppCore` is the single top-level service value
//! §9's design notes call for, replacing the package-level singletons a
//! naive port would otherwise reach for.

pub mod broadcaster;
pub mod database_query;
pub mod error;
pub mod file_ops;
mod jobs_repo;
pub mod recent_media;
pub mod retry;
pub mod scanner;
pub mod scheduler;
pub mod source_files_query;
pub mod spoof;
pub mod stats;
pub mod storage;
pub mod tmdb_cache;

pub use error::{Error, Result};
pub use jobs_repo::{delete_job, get_job, insert_job, list_executions, list_jobs, update_job};

use std::sync::Arc;

use storage::{DbHandle, HandleConfig};

/// Owns every long-lived component (three DB handles, scanner, scheduler,
/// broadcaster, spoof read model, TMDB cache), constructed once at process
/// boot and handed to HTTP handlers explicitly (§9 "Global mutable state").
pub struct AppCore {
    pub source_db: DbHandle,
    pub main_db: DbHandle,
    pub aux_db: DbHandle,
    pub broadcaster: Arc<broadcaster::Broadcaster>,
    pub scanner: Arc<scanner::Scanner>,
    pub scheduler: Arc<scheduler::Scheduler>,
    pub spoof: Arc<spoof::SpoofReadModel>,
    pub tmdb_cache: tmdb_cache::TmdbCacheHandle,
}

impl AppCore {
    /// Open all three embedded databases under `db_dir` and wire up the
    /// scanner/scheduler/broadcaster/spoof/tmdb-cache components. Does not
    /// start background timers; call `start()` after construction.
    /// `db_max_workers` is `DB_MAX_WORKERS` (already clamped 1..20 by the
    /// caller), the writer-bound input each handle's read-pool bound is
    /// derived from.
    pub async fn open(db_dir: &std::path::Path, roots: Vec<scanner::SourceRoot>, db_max_workers: u32) -> Result<Self> {
        let source_db = DbHandle::open(
            "source",
            &db_dir.join("source_files.db"),
            HandleConfig::SOURCE.with_workers(db_max_workers),
        )
        .await?;
        let main_db = DbHandle::open(
            "main",
            &db_dir.join("processed_files.db"),
            HandleConfig::MAIN.with_workers(db_max_workers),
        )
        .await?;
        let aux_db = DbHandle::open(
            "aux",
            &db_dir.join("cinesync.db"),
            HandleConfig::AUX.with_workers(db_max_workers),
        )
        .await?;

        let broadcaster = Arc::new(broadcaster::Broadcaster::new());
        let scanner = Arc::new(scanner::Scanner::new(
            source_db.clone(),
            main_db.clone(),
            roots,
            broadcaster.clone(),
        ));
        let scheduler = scheduler::Scheduler::new(main_db.clone(), broadcaster.clone());
        let spoof = Arc::new(spoof::SpoofReadModel::new(main_db.clone(), aux_db.clone()));
        let tmdb_cache = tmdb_cache::TmdbCacheHandle::spawn(aux_db.clone());

        Ok(AppCore {
            source_db,
            main_db,
            aux_db,
            broadcaster,
            scanner,
            scheduler,
            spoof,
            tmdb_cache,
        })
    }

    /// Arm interval timers and run startup jobs (§4.3 Scheduling).
    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await
    }
}
