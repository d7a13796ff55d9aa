mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use outreach_api::sender::{HttpSender, MessageSender, SimulatedSender};
use outreach_api::token::TokenService;
use outreach_api::{AppState, AppStateInner, CampaignEngine, auth};
use outreach_db::Database;

use crate::config::{Config, SenderConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "outreach=debug,outreach_api=debug,outreach_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.has_placeholder_secret() {
        eprintln!("FATAL: OUTREACH_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db = Arc::new(Database::open(&config.db_path)?);

    if let Some((email, password)) = &config.admin {
        if auth::seed_admin(&db, email, password)? {
            info!("Seeded admin {}", email);
        }
    }

    let sender: Arc<dyn MessageSender> = match &config.sender {
        SenderConfig::Simulated { success_rate } => {
            info!("Using simulated sender (success rate {})", success_rate);
            Arc::new(SimulatedSender::new(*success_rate))
        }
        SenderConfig::Http { url } => {
            info!("Using HTTP sender at {}", url);
            Arc::new(HttpSender::new(url.as_str())?)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        tokens: TokenService::new(&config.jwt_secret, config.jwt_expires_secs),
        engine: CampaignEngine::new(db, sender, config.send_concurrency),
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            axum::http::HeaderName::from_static(outreach_api::middleware::WORKSPACE_HEADER),
        ])
        .allow_credentials(false);

    let app = outreach_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Outreach server listening on {}", addr);

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
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
