use axum::http::HeaderValue;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use floreria_backend::config::Config;
use floreria_backend::http::{self, AppState};
use floreria_backend::mailer::Mailer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    tracing::info!("connected to PostgreSQL");

    tokio::fs::create_dir_all(&config.export_dir).await?;

    let mailer = Mailer::from_config(&config.smtp)?;
    let origin: HeaderValue = config.allowed_origin.parse()?;
    let state = AppState::new(pool.clone(), mailer, &config);
    let app = http::router(state, origin);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Pool lifecycle is explicit: opened above, drained here on shutdown.
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
