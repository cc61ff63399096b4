//! craftgen-api - HTTP API server for craftgen

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use craftgen_api::{build_router, AppConfig, AppState, Backends};
use craftgen_db::{log_pool_metrics, Database, PoolConfig};
use craftgen_inference::{DashScopeBackend, ImageStrategyConfig, OpenAIBackend};
use craftgen_storage::{FilesystemStore, HttpFetcher, StorageConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "craftgen_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "craftgen_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("craftgen-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = AppConfig::from_env();

    // Database
    let db = Database::connect(&config.database_url, PoolConfig::from_env()).await?;
    db.migrate().await?;
    log_pool_metrics(db.pool());
    info!(subsystem = "api", "Database connected and migrated");

    // Inference
    let text = Arc::new(OpenAIBackend::from_env()?);
    let images = Arc::new(DashScopeBackend::from_env()?);
    let image_config = ImageStrategyConfig::from_env();
    info!(
        subsystem = "api",
        text_model = %image_config.text_model,
        transfer_model = %image_config.transfer_model,
        "Image models configured"
    );

    // Storage
    let fetcher = HttpFetcher::from_env()?;
    let storage = StorageConfig::from_env()?;
    if let StorageConfig::Filesystem {
        base_path,
        public_url,
    } = &storage
    {
        FilesystemStore::new(base_path, public_url).validate().await?;
        info!(subsystem = "api", base_path = %base_path, "Filesystem storage validated");
    }
    let store = storage.build(reqwest::Client::new());

    let state = AppState::new(Backends {
        search: Arc::new(db.knowledge_search(text.clone())),
        generator: text,
        images,
        store,
        fetcher: Arc::new(fetcher),
        chat: Arc::new(db.chat.clone()),
        catalog: Arc::new(db.knowledge_bases.clone()),
        image_config,
    });

    let mut app = build_router(state, config.cors_origins());

    // Filesystem objects are served by this process under the public URL path.
    if let StorageConfig::Filesystem {
        base_path,
        public_url,
    } = &storage
    {
        let mount = reqwest::Url::parse(public_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        if !mount.is_empty() {
            info!(mount = %mount, base_path = %base_path, "Serving stored objects");
            app = app.nest_service(&mount, ServeDir::new(base_path));
        }
    }

    // Start server
    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
