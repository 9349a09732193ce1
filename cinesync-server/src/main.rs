//! cinesync-hub server binary: wires up configuration, the three embedded
//! databases, the background scanner/scheduler/tmdb-cache workers, and the
//! HTTP/WS/WebDAV surface (CLI-over-env-over-file config precedence,
//! `tracing_subscriber` init, `axum_server`/`axum::serve` TLS-or-plain
//! dispatch).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use cinesync_config::{Args, EnvOverrides};
use cinesync_core::scanner::SourceRoot;
use cinesync_core::AppCore;
use cinesync_server::create_app;
use cinesync_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinesync_server=info,cinesync_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let env_overrides = EnvOverrides::from_env();

    let config_path = args
        .config
        .clone()
        .or_else(|| cinesync_config::loader::resolve_config_path(&args.workdir))
        .ok_or_else(|| anyhow::anyhow!("no config.yml found at ../config.yml or ../db/config.yml, and none given via --config"))?;

    let config = cinesync_config::load(&config_path)?;
    let config = Arc::new(config);

    if env_overrides.source_dirs.is_empty() {
        warn!("SOURCE_DIR is unset; the scanner has no roots to walk until source-files are added some other way");
    }

    let db_dir = args.workdir.join("../db");
    std::fs::create_dir_all(&db_dir)?;
    let media_cover_dir = db_dir.join("MediaCover");
    std::fs::create_dir_all(&media_cover_dir)?;

    let roots: Vec<SourceRoot> = env_overrides
        .source_dirs
        .iter()
        .enumerate()
        .map(|(index, path)| SourceRoot { index: index as i64, path: path.clone() })
        .collect();

    let core = Arc::new(AppCore::open(&db_dir, roots, env_overrides.db_max_workers).await?);
    core.start().await?;
    info!(db_dir = %db_dir.display(), "databases opened and background workers armed");

    let state = AppState::new(core.clone(), config.clone(), media_cover_dir);
    let app = create_app(state);

    let addr = SocketAddr::from((
        args.host.parse::<std::net::IpAddr>().unwrap_or(std::net::Ipv4Addr::UNSPECIFIED.into()),
        args.port,
    ));

    let tls_cert = std::env::var("TLS_CERT_PATH").ok().map(PathBuf::from);
    let tls_key = std::env::var("TLS_KEY_PATH").ok().map(PathBuf::from);

    let shutdown = shutdown_signal(core.clone());

    match (tls_cert, tls_key) {
        (Some(cert), Some(key)) => {
            info!(%addr, "starting cinesync-hub (https)");
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown.await;
                shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
            });
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            info!(%addr, "starting cinesync-hub (http)");
            warn!("TLS is not configured; set TLS_CERT_PATH and TLS_KEY_PATH for HTTPS");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await?;
        }
    }

    Ok(())
}

/// Waits for Ctrl-C (or SIGTERM on Unix), then checkpoints all three
/// databases' WALs before returning so `axum::serve`'s graceful shutdown
/// can drain in-flight requests against a clean log (§10.6).
async fn shutdown_signal(core: Arc<AppCore>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, checkpointing databases");
    for (name, db) in [("source", &core.source_db), ("main", &core.main_db), ("aux", &core.aux_db)] {
        if let Err(e) = db.checkpoint().await {
            warn!(db = name, error = %e, "WAL checkpoint failed during shutdown");
        }
    }
}
