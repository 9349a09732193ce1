use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Load `config.yml` from `path` (§6's "Persisted state layout" names
/// `../config.yml` or `../db/config.yml`; the caller resolves which one
/// exists). A missing file is a fatal configuration error at startup (§7,
/// kind 5).
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    if config.folder_mode && config.folder_mappings.iter().all(|m| !m.enabled) {
        warn!("folder_mode is enabled but no folder mapping is enabled; every spoof request will be unauthorized");
    }

    info!(
        path = %path.display(),
        folder_mode = config.folder_mode,
        mappings = config.folder_mappings.len(),
        "loaded config.yml"
    );

    Ok(config)
}

/// Try `../config.yml` then `../db/config.yml`, the two locations §6 names.
pub fn resolve_config_path(working_dir: &Path) -> Option<std::path::PathBuf> {
    let candidates = [
        working_dir.join("../config.yml"),
        working_dir.join("../db/config.yml"),
    ];
    candidates.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "api_key: \"{}\"\napp_guid: \"{}\"\n",
            "a".repeat(32),
            uuid::Uuid::nil()
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert!(config.enabled);
        assert_eq!(config.version, "5.14.0.9383");
        assert_eq!(config.branch, "master");
        assert!(!config.folder_mode);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yml");
        assert!(load(&path).is_err());
    }
}
