use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaydraw::{
    api::{self, ServerState},
    config::ServerConfig,
    fanout::FanOut,
    notifier::ChangeNotifier,
    origin::OriginPolicy,
    state::AppState,
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaydraw=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting relaydraw...");

    let config = ServerConfig::from_env();

    let store = Arc::new(MemoryStore::new());
    let notifier = ChangeNotifier::new(config.notifier_capacity);
    let app = AppState::new(store.clone(), notifier.clone(), config.rules.clone());

    // Push every change to connected sockets
    let fanout = Arc::new(FanOut::new(store));
    let listener_handle = notifier.listen(fanout.clone());

    let state = ServerState {
        app,
        fanout,
        keepalive: config.keepalive,
    };
    let origin = Arc::new(OriginPolicy::new(config.origin.clone()));

    let router = api::router(state, origin).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    listener_handle.unsubscribe();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, run until killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
