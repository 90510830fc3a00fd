use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pricebot::config::AppConfig;
use pricebot::context::AppContext;
use pricebot::localization::init_localization;
use pricebot::store::JsonStore;
use pricebot::{bot, scheduler, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let config = AppConfig::from_env();

    // Initialize tracing, RUST_LOG overrides the default level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting price bot");

    init_localization(&config.default_locale)?;

    let store = JsonStore::open(&config.data_file)?;
    info!(path = %store.path().display(), "Data store ready");

    let bot = match &config.bot_token {
        Some(token) => Some(Bot::new(token)),
        None => {
            warn!("TELEGRAM_BOT_TOKEN is not set, only the REST server will run");
            None
        }
    };
    if config.owner_id == 0 {
        warn!("OWNER_ID is not set, automatic backups are disabled");
    }

    let bind_address = config.bind_address.clone();
    let ctx = Arc::new(AppContext::new(config, store, bot.clone())?);
    scheduler::start(&ctx).await;

    let app = server::build(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "HTTP server listening");
    let http = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    match bot {
        Some(bot) => {
            let telegram = bot::run(bot, Arc::clone(&ctx));
            let (served, ()) = tokio::join!(http, telegram);
            served?;
        }
        None => http.await?,
    }

    ctx.scheduler.shutdown();
    info!("Price bot stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
