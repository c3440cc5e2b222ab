use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ember_api::middleware::require_auth;
use ember_api::{AppState, AppStateInner, admin, auth, flags, messages, moments, participation, photos, profiles, sos};
use ember_sweeper::DiskStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("EMBER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("EMBER_DB_PATH").unwrap_or_else(|_| "ember.db".into());
    let host = std::env::var("EMBER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("EMBER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let photo_dir: PathBuf = std::env::var("EMBER_PHOTO_DIR")
        .unwrap_or_else(|_| "./photo-storage".into())
        .into();
    let expiry_sweep_secs = env_u64("EMBER_EXPIRY_SWEEP_SECS", 300);
    let ephemeral_sweep_secs = env_u64("EMBER_EPHEMERAL_SWEEP_SECS", 300);
    let stale_sweep_secs = env_u64("EMBER_STALE_SWEEP_SECS", 86_400);

    // Init database and photo storage
    let db = Arc::new(ember_db::Database::open(&PathBuf::from(&db_path))?);
    let store = Arc::new(DiskStore::new(photo_dir).await?);

    // Lifecycle sweeps run on independent timers; every pass is idempotent,
    // so overlap with each other or with request handlers is fine.
    tokio::spawn(ember_sweeper::run_moment_expiry_loop(
        db.clone(),
        expiry_sweep_secs,
    ));
    tokio::spawn(ember_sweeper::run_ephemeral_photo_loop(
        db.clone(),
        store.clone(),
        ephemeral_sweep_secs,
    ));
    tokio::spawn(ember_sweeper::run_stale_content_loop(
        db.clone(),
        store.clone(),
        stale_sweep_secs,
    ));

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/profiles", post(profiles::create_profile))
        .route("/profiles", put(profiles::update_profile))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/moments", post(moments::create_moment))
        .route("/moments/nearby", get(moments::nearby))
        .route("/moments/search", get(moments::search))
        .route("/moments/{id}", get(moments::get_moment))
        .route("/moments/{id}", delete(moments::delete_moment))
        .route("/moments/{id}/context", get(moments::moment_context))
        .route("/moments/{id}/join", post(participation::join))
        .route("/moments/{id}/leave", post(participation::leave))
        .route("/moments/{id}/participants", get(participation::participants))
        .route("/moments/{id}/participation", get(participation::participation))
        .route("/moments/{id}/messages", get(messages::list_messages))
        .route("/moments/{id}/messages", post(messages::send_message))
        .route("/moments/{id}/photos", get(photos::list_photos))
        .route("/moments/{id}/photos", post(photos::add_photo))
        .route("/flags", post(flags::create_flag))
        .route("/sos-alerts", post(sos::create_alert))
        .route("/sos-alerts", get(sos::list_active_alerts))
        .route("/admin/flags", get(admin::list_flagged))
        .route("/admin/flags/dismiss", post(admin::dismiss_target))
        .route("/admin/targets/hide", post(admin::hide_target))
        .route("/admin/targets/delete", post(admin::delete_target))
        .route("/admin/targets/ban", post(admin::ban_target))
        .route("/admin/sos-alerts/{id}/resolve", post(admin::resolve_sos))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Ember server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
