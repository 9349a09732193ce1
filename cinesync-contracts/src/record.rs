/// A row keyed by an absolute filesystem path, the way `source_files` and
/// `processed_files` are keyed in DB-SOURCE / DB-MAIN.
pub trait FilePathKeyed {
    fn file_path(&self) -> &str;
}

/// A spoofed entity (movie, series, episode, episode file, movie file) whose
/// id is assigned by enumeration order of a query result rather than stored
/// in any table. Stable only for the lifetime of one process (§4.5).
pub trait StableId {
    /// The enumeration-derived integer id presented to Radarr/Sonarr-style
    /// clients.
    fn stable_id(&self) -> i64;
}
