#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use portcullis_server::api::MgmtState;
use portcullis_server::config::Config;
use portcullis_server::services::account_service::AccountService;
use portcullis_server::services::auth_service::AuthService;
use portcullis_server::services::health_service::HealthService;
use portcullis_server::storage::refresh_token_repo::RefreshTokenRepository;
use portcullis_server::storage::user_repo::UserRepository;
use portcullis_server::workers::refresh_token_cleanup::RefreshTokenCleanupWorker;
use portcullis_server::{api, storage, telemetry};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, cleanup_worker) = async {
        // Phase 1: Infrastructure
        let pool = storage::init_pool(&config.database_url).await?;
        storage::run_migrations(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        portcullis_server::spawn_signal_handler(shutdown_tx.clone());

        // Phase 2: Component wiring
        let user_repo = UserRepository::new();
        let refresh_repo = RefreshTokenRepository::new();
        let auth_service =
            AuthService::new(config.auth.clone(), pool.clone(), user_repo.clone(), refresh_repo.clone());
        let account_service = AccountService::new(pool.clone(), user_repo, auth_service.clone());
        let health_service = HealthService::new(pool.clone());

        let cleanup_worker =
            RefreshTokenCleanupWorker::new(pool, refresh_repo, config.auth.cleanup_interval_secs);

        // Phase 3: Listeners and routers
        let app_router = api::app_router(config.clone(), account_service, auth_service);
        let mgmt_app = api::mgmt_router(MgmtState { health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<_, anyhow::Error>((
            api_listener,
            mgmt_listener,
            app_router,
            mgmt_app,
            shutdown_tx,
            shutdown_rx,
            cleanup_worker,
        ))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Runtime
    let worker_task = tokio::spawn(cleanup_worker.run(shutdown_rx.clone()));

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx;
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful shutdown
    let _ = shutdown_tx.send(true);
    tokio::select! {
        _ = worker_task => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
