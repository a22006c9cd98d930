//! Keyhold API Server
//!
//! REST server for user registration, login and JWT token management.

use anyhow::Context;
use clap::Parser;
use keyhold_api::{
    auth::{MemoryUserRepository, PgUserRepository, UserRepository},
    create_router,
    state::AppState,
};
use keyhold_core::{AppConfig, LoggingConfig, StoreBackend};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keyhold-api")]
#[command(version, about = "Keyhold authentication API server")]
struct Args {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, env = "KEYHOLD_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "keyhold_api={},tower_http=debug",
            logging.level
        ))
    });

    if logging.json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn UserRepository>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let repo =
                PgUserRepository::connect(&config.database.url, config.database.max_connections)
                    .await
                    .context("failed to connect to PostgreSQL")?;
            repo.migrate().await.context("failed to create users table")?;
            tracing::info!("Using PostgreSQL credential store");
            Ok(Arc::new(repo))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory credential store; accounts are lost on restart");
            Ok(Arc::new(MemoryUserRepository::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);
    config.validate()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let store = build_store(&config).await?;

    let state = Arc::new(AppState::new(config, store));
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Keyhold API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
