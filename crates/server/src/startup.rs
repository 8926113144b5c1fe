use std::{net::SocketAddr, time::Duration};

use axum::Router;
use configs::AppConfig;
use service::{runtime, Services};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::routes::{self, AppState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Open every store and build the router. Returns the services too so the
/// caller can start the scheduler against the same handles.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<(Router, Services)> {
    runtime::ensure_env(cfg.server.static_dir.as_deref(), &cfg.storage.data_dir).await?;
    let services = Services::open(cfg).await?;
    if cfg.admin.api_key.is_none() {
        warn!("no admin api key configured; /api is open");
    }
    let state = AppState::new(services.clone(), cfg.admin.api_key.clone());
    let app = routes::build_router(state, build_cors(), cfg.server.static_dir.as_deref());
    Ok((app, services))
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "ctrl_c listener failed");
            }
            info!("shutdown signal received");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

/// Public entry: build the app, start the scheduler and serve until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let (app, services) = build_app(&cfg).await?;
    let cancel = CancellationToken::new();

    let scheduler_task = if cfg.scheduler.enabled {
        let scheduler = services.scheduler(Duration::from_secs(cfg.scheduler.interval_secs));
        Some(tokio::spawn(scheduler.run(cancel.clone())))
    } else {
        info!("scheduler disabled");
        None
    };

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting shopdesk server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(cancel.clone())).await?;

    cancel.cancel();
    if let Some(task) = scheduler_task {
        let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
    }
    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_rejects_garbage_host() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not a host".into();
        assert!(bind_addr(&cfg).is_err());
        cfg.server.host = "127.0.0.1".into();
        cfg.server.port = 9000;
        assert_eq!(bind_addr(&cfg).unwrap().port(), 9000);
    }
}
