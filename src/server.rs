use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    services::ServeDir,
    trace::TraceLayer,
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    cors::{AllowOrigin, Any, CorsLayer},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::config::{Config, MockCredentials};
use crate::handlers::{
    complete_upload, current_user, health_check, hello, init_upload, login, upload_chunk,
    upload_progress, user_profile,
};
use crate::middleware::{envelope_rejections, log_requests, resolve_user, AuthTokenHash};
use crate::state::AppState;
use crate::utils::shutdown_signal;

// room for multipart boundaries and the small text fields around a chunk
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// the `/api` routes with auth and request logging, without transport layers
pub fn build_api_router(state: Arc<AppState>, mock_auth: &MockCredentials) -> Router {
    let api = Router::new()
        .route("/upload/init", post(init_upload))
        // size is enforced by the outer RequestBodyLimitLayer
        .route("/upload/chunk", post(upload_chunk).layer(DefaultBodyLimit::disable()))
        .route("/upload/complete", post(complete_upload))
        .route("/upload/progress/:fileId", get(upload_progress))
        .route("/users/login", post(login))
        .route("/users/current", get(current_user))
        .route("/users/profile", get(user_profile))
        .route("/hello", get(hello))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(resolve_user))
        .layer(Extension(AuthTokenHash(Config::hash_token(&mock_auth.token))))
        .layer(Extension(mock_auth.clone()))
        .layer(axum::middleware::from_fn(log_requests))
        .with_state(state)
}

/// full application router: api, static frontend, and transport layers
pub fn build_app(state: Arc<AppState>, config: &Config) -> Router {
    let body_limit = config.chunk_size.saturating_add(MULTIPART_OVERHEAD);
    tracing::debug!("Building router with request body limit: {} bytes", body_limit);

    // configure rate limiting
    let replenish_ms = (1000 / config.rate_limit_per_second.max(1)).max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size(config.rate_limit_burst.max(1))
            .finish()
            .expect("rate limit settings are non-zero"),
    );

    // configure cors
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        tracing::warn!("No valid CORS_ORIGINS configured, allowing any origin");
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_origin(allow_origin)
        .allow_headers(Any);

    build_api_router(state, &config.mock_auth)
        .nest_service("/static", ServeDir::new(&config.frontend_dir))
        .layer(CompressionLayer::new()
            .gzip(true)
            .br(true)
            .zstd(true)
        )
        .layer(RequestBodyLimitLayer::new(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .layer(GovernorLayer { config: governor_conf })
        .layer(axum::middleware::map_response(envelope_rejections))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// periodically evict upload sessions older than `ttl`
pub fn spawn_session_sweeper(
    state: Arc<AppState>,
    ttl: Duration,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if ttl.is_zero() || every.is_zero() {
        tracing::info!("Upload session sweeping disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept = state.uploads.sweep_expired(ttl).await;
            if swept > 0 {
                tracing::info!("Swept {} expired upload sessions", swept);
            }
        }
    }))
}

/// serve `app` until a shutdown signal arrives
pub async fn start_server(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!("Listener bound to {}", addr);

    tracing::info!("Server running and ready to accept connections");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true)
    .await
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("tradejournal starting ({})...", config.app_env);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 API SERVER: http://{}:{}/api", config.http_host, config.http_port);
    tracing::info!("📁 Uploads stored in: {:?}", config.upload_dir.canonicalize().unwrap_or(config.upload_dir.clone()));
    tracing::info!("🗂️  Frontend assets: {:?}", config.frontend_dir);
    tracing::info!(
        "📦 Max upload {} bytes, chunk size {} bytes, session ttl {:?}",
        config.max_upload_size,
        config.chunk_size,
        config.upload_session_ttl
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
