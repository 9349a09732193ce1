//! Configuration loading for cinesync-hub.
//!
//! Precedence, low to high: built-in defaults -> `config.yml` -> environment
//! variable overrides -> CLI flags. `serde_yaml` parses the file since the
//! on-disk format is YAML, not TOML.

pub mod cli;
pub mod loader;
pub mod models;

pub use cli::Args;
pub use loader::{load, ConfigError};
pub use models::{Config, EnvOverrides};
