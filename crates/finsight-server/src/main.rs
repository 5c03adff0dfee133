mod api;
mod middleware;

use std::sync::Arc;

use finsight_analysis::{ForecastContext, SourcingClient};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = finsight_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = match config.database_url.as_deref() {
        Some(url) => {
            let pool_config = finsight_db::PoolConfig::from_app_config(&config);
            let pool = finsight_db::connect_pool(url, pool_config).await?;
            let applied = finsight_db::run_migrations(&pool).await?;
            tracing::info!(applied, "database ready");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; request logs and documents will not be stored");
            None
        }
    };

    let transcripts = finsight_core::load_transcripts_or_default(&config.transcripts_path)?;
    tracing::info!(count = transcripts.len(), "transcripts loaded");

    let context = ForecastContext::build(&config, pool)?;
    let sourcing = SourcingClient::from_config(&config)?;

    let auth = AuthState::from_env(matches!(
        config.env,
        finsight_core::Environment::Development
    ))?;
    let state = AppState {
        context: Arc::new(context),
        sourcing: Arc::new(sourcing),
        transcripts: Arc::new(transcripts),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "finsight-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
