//! Plain domain value types for cinesync-hub. No I/O lives here — these are
//! the shapes the storage layer reads/writes and the HTTP adapters
//! serialize, kept free of `sqlx`/`axum` so every crate can depend on them
//! without pulling in a database driver or web framework.

pub mod error;
pub mod event;
pub mod folder_mapping;
pub mod job;
pub mod media_type;
pub mod processed_file;
pub mod scan;
pub mod source_file;
pub mod spoof;
pub mod tmdb_cache;

pub use error::{Error, Result};
pub use event::ScanEventPayload;
pub use folder_mapping::{FolderMapping, ServiceType};
pub use job::{JobRecord, JobStatus, ScheduleType};
pub use media_type::MediaType;
pub use processed_file::{ProcessedFileRow, ProcessingStatus};
pub use scan::{ScanStatus, ScanType, SourceScanRecord};
pub use source_file::SourceFileRecord;
pub use spoof::{EpisodeFileRecord, EpisodeRecord, MovieRecord, SeriesRecord};
pub use tmdb_cache::TmdbEntity;
