use std::sync::Arc;

use secrecy::ExposeSecret;

use prizewheel::channels::{Gateway, TelegramGateway};
use prizewheel::config::Config;
use prizewheel::funnel::{EngineOptions, FunnelHandler};
use prizewheel::server::{self, AppState};
use prizewheel::store::{Database, LibSqlBackend, MemoryBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC-...");
        std::process::exit(1);
    });

    eprintln!("🎰 Prizewheel v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Web app: {}", config.webapp_url());
    eprintln!("   Leads API: http://0.0.0.0:{}/api/leads", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = match &config.db_path {
        Some(path) => {
            let backend = LibSqlBackend::new_local(path).await.unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", path.display(), e);
                std::process::exit(1);
            });
            eprintln!("   Database: {}", path.display());
            Arc::new(backend)
        }
        None => {
            eprintln!("   Database: in-memory (set PRIZEWHEEL_DB_PATH to persist leads)");
            Arc::new(MemoryBackend::new())
        }
    };

    // ── Gateway ──────────────────────────────────────────────────────────
    let gateway = Arc::new(TelegramGateway::new(config.bot_token.expose_secret().to_string()));
    if let Err(e) = gateway.health_check().await {
        eprintln!("   Warning: Telegram health check failed: {e}");
    }

    match &config.admin_chat_id {
        Some(admin) => eprintln!("   Admin reports: chat {admin}"),
        None => eprintln!("   Admin reports: disabled (set ADMIN_CHAT_ID to enable)"),
    }

    // ── Funnel handler ───────────────────────────────────────────────────
    let options = EngineOptions {
        webapp_url: config.webapp_url(),
        forward_unsolicited: config.forward_unsolicited,
    };
    let handler = Arc::new(FunnelHandler::new(
        Arc::clone(&db),
        Arc::clone(&gateway) as Arc<dyn Gateway>,
        options,
        config.admin_chat_id.clone(),
    ));

    // ── Event pipeline ───────────────────────────────────────────────────
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    // Webhook mode when a public base URL is configured, otherwise
    // long-polling (the two never run at once; Telegram rejects
    // getUpdates while a webhook is registered).
    match config.webhook_url() {
        Some(url) => {
            gateway.set_webhook(&url).await?;
            eprintln!("   Mode: webhook");
        }
        None => {
            gateway.delete_webhook().await.ok();
            let _poll = gateway.spawn_polling(tx.clone());
            eprintln!("   Mode: long-polling");
        }
    }

    // ── HTTP server ──────────────────────────────────────────────────────
    let state = AppState {
        db: Arc::clone(&db),
        events: tx,
        webhook_token: Arc::new(config.bot_token.expose_secret().to_string()),
    };
    let app = server::routes(state, config.webapp_dir.clone());
    let port = config.port;
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .expect("Failed to bind HTTP port");
        tracing::info!(port, "HTTP server started");
        axum::serve(listener, app).await.ok();
    });

    eprintln!();

    // One task per inbound event; the handler's per-user lock keeps
    // same-user events serialized while distinct users run in parallel.
    while let Some(event) = rx.recv().await {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            handler.handle_event(event).await;
        });
    }

    Ok(())
}
