use std::path::PathBuf;

use clap::Parser;

/// Command-line flags for the cinesync-hub server binary (clap derive,
/// per-flag env fallback).
#[derive(Parser, Debug)]
#[command(name = "cinesync-server")]
#[command(about = "Media-library control plane: scanner, job scheduler, protocol-spoof API")]
pub struct Args {
    /// Path to `config.yml`; falls back to `../config.yml` then
    /// `../db/config.yml` if unset (§6).
    #[arg(long, env = "CINESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server bind port (overrides config).
    #[arg(short, long, env = "SERVER_PORT", default_value_t = 8089)]
    pub port: u16,

    /// Server bind host (overrides config).
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Working directory that `../db/*.db` and `../config.yml` are
    /// resolved relative to (§6 persisted state layout).
    #[arg(long, env = "CINESYNC_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,
}
