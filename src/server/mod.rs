//! BMI Forecast Server Module
//!
//! Web UI for signing up, logging in and requesting BMI predictions, plus a
//! couple of JSON endpoints. Models are trained once before the listener binds
//! and shared read-only with every handler.

mod api;
mod error;
mod handlers;
mod state;
pub mod views;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::SqliteUserRepository;
use crate::config::TrainingConfig;
use crate::prediction::ModelContext;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub static_dir: String,
    /// Adds `Secure` to the session cookie
    pub secure_cookies: bool,
    pub training: TrainingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://users.db".to_string()),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            secure_cookies: !is_development(std::env::var("APP_ENV").ok().as_deref()),
            training: TrainingConfig::from_env(),
        }
    }
}

impl ServerConfig {
    pub fn with_address(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

fn is_development(app_env: Option<&str>) -> bool {
    matches!(app_env, Some(env) if env.eq_ignore_ascii_case("development"))
}

/// Train the models, open the user database and serve until ctrl+c
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    config.training.validate()?;
    info!(
        dataset = %config.training.dataset_path.display(),
        started_at = %start_time.to_rfc3339(),
        "Training models before accepting connections"
    );

    let training = config.training.clone();
    let context = tokio::task::spawn_blocking(move || ModelContext::train(&training)).await??;
    info!(
        models = context.bank().len(),
        best_model = %context.report().best().name,
        elapsed_ms = (chrono::Utc::now() - start_time).num_milliseconds(),
        "Model context ready"
    );

    if !config.secure_cookies {
        warn!("Session cookies are not marked Secure (APP_ENV=development)");
    }

    let users = SqliteUserRepository::connect(&config.database_url).await?;
    let state = Arc::new(AppState::new(config.clone(), Arc::new(context), Arc::new(users)));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        url = %format!("http://{}", addr),
        "BMI Forecast server listening"
    );

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = stop_time.signed_duration_since(start_time).num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
