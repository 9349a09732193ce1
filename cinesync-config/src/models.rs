use std::path::PathBuf;

use cinesync_model::{FolderMapping, ServiceType};
use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "5.14.0.9383".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_service_type() -> ServiceType {
    ServiceType::Auto
}

/// `config.yml` (§6). Deserialized with `serde_yaml`; every field here maps
/// 1:1 onto the Configuration section of §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Hex-32 global API key used by spoofed endpoints in single-service
    /// mode (§6 auth).
    pub api_key: String,

    pub app_guid: uuid::Uuid,

    #[serde(default = "default_service_type")]
    pub service_type: ServiceType,

    #[serde(default)]
    pub folder_mode: bool,

    #[serde(default)]
    pub folder_mappings: Vec<FolderMapping>,

    /// Root of the managed, organized library (not the source roots the
    /// scanner walks) — used for WebDAV and `/movies`/`/tv` root folders.
    #[serde(default = "default_library_root")]
    pub library_root: PathBuf,

    /// Gates bearer-token auth on the standard `/api/*` surface (§6
    /// Authentication). Spoofed `/api/v3/*` and `/torznab/*` routes are
    /// always gated by `apiKey`/`folderMappings` regardless of this flag.
    #[serde(default)]
    pub auth_enabled: bool,

    #[serde(default)]
    pub auth_username: Option<String>,

    /// Argon2 hash of the login password, never the plaintext.
    #[serde(default)]
    pub auth_password_hash: Option<String>,

    /// Request paths that skip bearer-token auth even when `auth_enabled`
    /// is set (§6 "configurable allow-list of endpoints").
    #[serde(default = "default_auth_bypass")]
    pub auth_bypass_paths: Vec<String>,
}

fn default_auth_bypass() -> Vec<String> {
    vec!["/api/auth/enabled".to_string(), "/api/auth/login".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_library_root() -> PathBuf {
    PathBuf::from("/library")
}

impl Config {
    /// Resolve the spoof API key that authorizes `path`: the global key in
    /// single-service mode, or any enabled folder mapping's key in folder
    /// mode (§6 auth).
    pub fn folder_mapping_for_key(&self, key: &str) -> Option<&FolderMapping> {
        self.folder_mappings
            .iter()
            .find(|m| m.enabled && m.api_key == key)
    }

    pub fn spoof_key_is_valid(&self, key: &str) -> bool {
        if self.folder_mode {
            self.folder_mapping_for_key(key).is_some()
        } else {
            key == self.api_key
        }
    }

    /// Whether `path` skips bearer-token auth (§6 allow-list). Exact-match
    /// or prefix-match against a trailing `/` entry.
    pub fn bypasses_auth(&self, path: &str) -> bool {
        self.auth_bypass_paths.iter().any(|allowed| {
            path == allowed || (allowed.ends_with('/') && path.starts_with(allowed.as_str()))
        })
    }
}

/// Environment-variable overrides (§6). Parsed separately from `Config`
/// since they govern the scanner/job-runner rather than the spoof surface.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    /// `SOURCE_DIR`: `;`- or `,`-separated list of source roots (§4.2).
    pub source_dirs: Vec<PathBuf>,
    /// `DB_MAX_WORKERS`, default 8, clamped to 1..=20.
    pub db_max_workers: u32,
    /// `SYMLINK_CLEANUP_INTERVAL` seconds, default 600.
    pub symlink_cleanup_interval_secs: u64,
    /// `MAX_PROCESSES`, default 8.
    pub max_processes: u32,
    /// `PYTHON_COMMAND`, default `python3` (`python` on Windows).
    pub python_command: String,
}

impl Default for EnvOverrides {
    fn default() -> Self {
        Self {
            source_dirs: Vec::new(),
            db_max_workers: 8,
            symlink_cleanup_interval_secs: 600,
            max_processes: 8,
            python_command: default_python_command(),
        }
    }
}

fn default_python_command() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

impl EnvOverrides {
    /// Parse `SOURCE_DIR` on either `;` or `,`, trimming empty segments
    /// (§4.2 inputs / §6).
    pub fn parse_source_dirs(raw: &str) -> Vec<PathBuf> {
        raw.split([';', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    pub fn clamp_workers(n: u32) -> u32 {
        n.clamp(1, 20)
    }

    /// Build overrides from the process environment, applying §6's clamps
    /// and defaults.
    pub fn from_env() -> Self {
        let mut overrides = Self::default();

        if let Ok(raw) = std::env::var("SOURCE_DIR") {
            overrides.source_dirs = Self::parse_source_dirs(&raw);
        }
        if let Ok(raw) = std::env::var("DB_MAX_WORKERS") {
            if let Ok(n) = raw.parse::<u32>() {
                overrides.db_max_workers = Self::clamp_workers(n);
            }
        }
        if let Ok(raw) = std::env::var("SYMLINK_CLEANUP_INTERVAL") {
            if let Ok(n) = raw.parse::<u64>() {
                overrides.symlink_cleanup_interval_secs = n;
            }
        }
        if let Ok(raw) = std::env::var("MAX_PROCESSES") {
            if let Ok(n) = raw.parse::<u32>() {
                overrides.max_processes = n;
            }
        }
        if let Ok(raw) = std::env::var("PYTHON_COMMAND") {
            overrides.python_command = raw;
        }

        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_semicolon_and_comma_separated_roots() {
        let parsed = EnvOverrides::parse_source_dirs("/a;/b,/c ; /d");
        assert_eq!(
            parsed,
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/b"),
                PathBuf::from("/c"),
                PathBuf::from("/d"),
            ]
        );
    }

    #[test]
    fn clamps_worker_count() {
        assert_eq!(EnvOverrides::clamp_workers(0), 1);
        assert_eq!(EnvOverrides::clamp_workers(999), 20);
        assert_eq!(EnvOverrides::clamp_workers(8), 8);
    }
}
