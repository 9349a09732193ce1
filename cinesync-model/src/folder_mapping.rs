use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// `serviceType` in `config.yml` and per-mapping (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Radarr,
    Sonarr,
    Auto,
}

impl ServiceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceType::Radarr => "radarr",
            ServiceType::Sonarr => "sonarr",
            ServiceType::Auto => "auto",
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "radarr" => Ok(ServiceType::Radarr),
            "sonarr" => Ok(ServiceType::Sonarr),
            "auto" => Ok(ServiceType::Auto),
            other => Err(Error::InvalidServiceType(other.to_string())),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `config.yml`'s `folderMappings` (§4.5, §6). In folder mode,
/// each inbound API key resolves to one of these and scopes every spoofed
/// query to rows whose destination path lies under `folder_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderMapping {
    pub folder_path: String,
    pub display_name: String,
    pub service_type: ServiceType,
    pub api_key: String,
    pub enabled: bool,
}

impl FolderMapping {
    /// Whether `path` falls under this mapping's folder, used to scope
    /// spoof queries (§4.5 folder mode). Requires a path-separator (or
    /// exact-match) boundary after the prefix so `/library/Movies` doesn't
    /// also match `/library/MoviesExtra/x.mkv`.
    pub fn contains(&self, path: &str) -> bool {
        let prefix = self.folder_path.as_str();
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
