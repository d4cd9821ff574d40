use authgate::auth::{AuthService, session_cache};
use authgate::middleware::CorsPolicy;
use authgate::router::AppState;

use axum_extra::extract::cookie::Key;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &authgate::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        environment = %cfg.environment,
        database_url = %cfg.database_url,
        base_url = %cfg.auth_base_url,
        port = cfg.port,
        "starting authgate"
    );

    let storage = match authgate::db::connect(&cfg.database_url).await {
        Ok(storage) => storage,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };
    info!("database connected and schema initialized");

    match storage.delete_expired_sessions(chrono::Utc::now()).await {
        Ok(purged) if purged > 0 => info!(purged, "purged expired sessions"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "failed to purge expired sessions"),
    }

    let cache = session_cache::spawn(cfg.session_cache_ttl()).await?;
    let auth = AuthService::new(storage, cache, cfg.session_ttl());

    let state = AppState::new(
        auth,
        Key::derive_from(cfg.auth_secret.as_bytes()),
        cfg.is_production(),
        CorsPolicy::new(cfg.origins()),
    );
    let app = authgate::router::app_router(state);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
