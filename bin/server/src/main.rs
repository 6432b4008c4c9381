use relaydesk_ai::OpenAiCompatibleBackend;
use relaydesk_assistant::{Assistant, InboundGateway};
use relaydesk_conversation::Deduplicator;
use relaydesk_operators::NatsNotifier;
use relaydesk_server::{
    config::ServerConfig,
    db::{PgConversationStore, PgOperatorDirectory},
    error::ServerError,
    routes::{self, AppState},
    whatsapp::WhatsAppSender,
};
use rootcause::prelude::Report;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Report<ServerError>> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| ServerError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| ServerError::Database {
            details: e.to_string(),
        })?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| ServerError::Migration {
            details: e.to_string(),
        })?;

    let directory = PgOperatorDirectory::new(db_pool.clone());
    directory
        .ensure_areas(&config.assistant.areas)
        .await
        .map_err(|e| ServerError::Database {
            details: e.to_string(),
        })?;

    tracing::info!(url = %config.nats.url, "Connecting to NATS...");
    let notifier = NatsNotifier::connect(config.nats)
        .await
        .map_err(|e| ServerError::Component {
            component: "nats notifier",
            details: e.to_string(),
        })?;

    let backend = OpenAiCompatibleBackend::new(config.llm).map_err(|e| ServerError::Component {
        component: "language model backend",
        details: e.to_string(),
    })?;

    let sender = WhatsAppSender::new(config.whatsapp).map_err(|e| ServerError::Component {
        component: "whatsapp sender",
        details: e.to_string(),
    })?;

    let dedup = Deduplicator::new(config.assistant.dedup_capacity);
    let assistant = Assistant::new(
        Arc::new(PgConversationStore::new(db_pool)),
        Arc::new(directory),
        Arc::new(notifier),
        Arc::new(backend),
        config.assistant,
    )
    .map_err(|e| ServerError::Component {
        component: "assistant",
        details: e.to_string(),
    })?;

    let gateway = InboundGateway::new(Arc::new(assistant), Arc::new(dedup), Arc::new(sender));
    let app = routes::router(AppState::new(Arc::new(gateway)));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| ServerError::Http {
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Http {
            details: e.to_string(),
        })?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
