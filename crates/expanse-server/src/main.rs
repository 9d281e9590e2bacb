use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use expanse_api::state::AppStateInner;
use expanse_api::store::ContentStore;
use expanse_api::sweeper;
use expanse_server::build_router;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const SWEEP_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expanse=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("EXPANSE_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: EXPANSE_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it to a long random string in your .env file and restart.");
        std::process::exit(1);
    }

    let host = std::env::var("EXPANSE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("EXPANSE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("EXPANSE_DB_PATH")
        .unwrap_or_else(|_| "expanse.db".into())
        .into();
    let content_dir: PathBuf = std::env::var("EXPANSE_CONTENT_DIR")
        .unwrap_or_else(|_| "./content-store".into())
        .into();
    let teacher_domains: Vec<String> = std::env::var("EXPANSE_TEACHER_DOMAINS")
        .unwrap_or_default()
        .split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect();
    let quiz_time_limit_secs: u64 = std::env::var("EXPANSE_QUIZ_TIME_LIMIT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(600);
    let max_upload_bytes: u64 = std::env::var("EXPANSE_MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50 * 1024 * 1024);

    // Init database and blob store
    let db = expanse_db::Database::open(&db_path)?;
    let store = ContentStore::new(content_dir).await?;

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        store,
        jwt_secret,
        teacher_domains,
        quiz_time_limit_secs,
        max_upload_bytes,
    });

    // Background sweep for overdue quiz attempts
    tokio::spawn(sweeper::run_sweeper_loop(state.clone(), SWEEP_INTERVAL_SECS));

    // CORS: a pinned frontend origin in production, permissive otherwise
    let cors = match std::env::var("EXPANSE_CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin.parse()?))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        _ => CorsLayer::permissive(),
    };

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Expanse server listening on {}", addr);
    info!(
        "Quiz time limit: {}s, upload cap: {} bytes",
        quiz_time_limit_secs, max_upload_bytes
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
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
