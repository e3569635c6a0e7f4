mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bazaar_api::notifier::{LogNotifier, MailApiNotifier, Notifier};
use bazaar_api::sessions::SessionIssuer;
use bazaar_api::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = bazaar_db::Database::open(&config.db_path)?;

    let notifier: Arc<dyn Notifier> = match config.mail.clone() {
        Some(mail) => {
            info!("Confirmation codes will be mailed through {}", mail.api_url);
            Arc::new(MailApiNotifier::new(mail)?)
        }
        None => {
            warn!("Mail API not configured, confirmation codes are only logged");
            Arc::new(LogNotifier)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: SessionIssuer::new(
            config.jwt_secret.clone(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        ),
        notifier,
        upload_dir: config.upload_dir.clone(),
    });

    let app = bazaar_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Bazaar server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
