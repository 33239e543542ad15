use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use tradejournal::config::{Config, UploadLimits};
use tradejournal::state::AppState;
use tradejournal::server::{build_app, print_startup_banner, spawn_session_sweeper, start_server};

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    // initialize tracing before config so bad env values get reported
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // load configuration from environment variables
    let config = Config::from_env();

    // build tokio runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads.max(1))
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        // create the upload directory if it doesn't exist
        if !config.upload_dir.exists() {
            std::fs::create_dir_all(&config.upload_dir).expect("Failed to create upload directory");
            tracing::info!("Created upload directory at: {:?}", config.upload_dir);
        }

        // create shared state
        let state = Arc::new(AppState::new(
            config.upload_dir.clone(),
            UploadLimits::from(&config),
        ));

        let sweeper = spawn_session_sweeper(
            state.clone(),
            config.upload_session_ttl,
            config.upload_sweep_interval,
        );

        let app = build_app(state, &config);

        let addr = SocketAddr::from((
            config.http_host.parse::<std::net::IpAddr>()
                .expect("Invalid HTTP_HOST"),
            config.http_port
        ));

        print_startup_banner(&config);
        if !config.is_production() {
            tracing::debug!("Running with development settings");
        }

        if let Err(e) = start_server(app, addr).await {
            tracing::error!("Server error: {}", e);
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        tracing::info!("Server exiting");
    });
}
