//! Trait surfaces shared between the storage, scanner, broadcaster and
//! HTTP-adapter layers of cinesync-hub.
//!
//! These traits exist so that `cinesync-core` and `cinesync-server` can be
//! written against a small, stable vocabulary instead of each other's
//! concrete types.

mod event;
mod record;

pub use event::{BroadcastEvent, Topic};
pub use record::{FilePathKeyed, StableId};

use chrono::{DateTime, Utc};

/// Anything that carries a creation/modification timestamp, used by the
/// protocol-spoof read model to order `processed_files` groups by
/// `MAX(processed_at)`.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}
