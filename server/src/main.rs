use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

// Use jemalloc on Linux for reduced fragmentation and better throughput on
// long-running server processes. Other platforms keep the system allocator.
#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use parley_server::config::ServerConfig;
use parley_server::dispatcher::Dispatcher;
use parley_server::ingress::Ingress;
use parley_server::routing::create_router;
use parley_server::stats::ServerStats;
use parley_server::websocket::ServerState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("parley_server=debug".parse()?)
                .add_directive("axum=info".parse()?),
        )
        .init();

    info!("Starting Parley signaling server");

    let config = ServerConfig::from_env()?;
    info!("Configuration loaded");
    info!("  max clients:    {}", config.max_clients);
    info!("  max rooms:      {}", config.max_rooms);
    info!("  client timeout: {}s", config.client_timeout_secs);
    info!("  queue capacity: {}", config.queue_capacity);

    let stats = Arc::new(ServerStats::new());
    let (ingress, events) = Ingress::channel(config.queue_capacity, stats.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Dispatcher::new(&config, stats.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run(events, shutdown_rx.clone()));

    let state = Arc::new(ServerState::new(config.clone(), ingress, stats.clone()));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    // Graceful shutdown: ctrl-c flips the watch observed by both axum and
    // the dispatcher; the dispatcher drops every outbound sender on exit,
    // which drains the remaining sockets.
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received, draining connections...");
        let _ = shutdown_tx.send(true);
    });

    let mut serve_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = serve_shutdown.changed().await;
        })
        .await?;

    let _ = dispatcher_task.await;

    info!("Server stopped cleanly");
    info!(
        "  total connections: {}",
        stats.total_connections.load(Ordering::Relaxed)
    );
    info!(
        "  total messages:    {}",
        stats.total_messages.load(Ordering::Relaxed)
    );
    info!(
        "  total rooms:       {}",
        stats.total_rooms_created.load(Ordering::Relaxed)
    );
    info!(
        "  total errors:      {}",
        stats.total_errors.load(Ordering::Relaxed)
    );
    Ok(())
}
