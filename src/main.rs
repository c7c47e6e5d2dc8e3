use query_kit::backend::InMemoryBackend;
use query_kit::client::PostsClient;
use query_kit::config::Settings;
use query_kit::observability::{LogMetrics, TtlPolicy};
use query_kit::routes::{router, ServerState};
use query_kit::swr::SwrCache;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("query-kit-server: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> query_kit::Result<()> {
    let settings = Settings::load()?;

    env_logger::Builder::new()
        .filter_level(settings.log_level())
        .parse_default_env()
        .try_init()
        .ok();

    // the route itself must never read through the site route
    let upstream = PostsClient::with_timeout(&settings.api_base_url, settings.http_timeout())?;
    let cache = SwrCache::new(InMemoryBackend::new())
        .with_metrics(Arc::new(LogMetrics))
        .with_ttl_policy(TtlPolicy::Fixed(settings.max_age()));
    spawn_stats_logger(cache.backend().clone(), settings.max_age());
    let app = router(ServerState::new(cache, Arc::new(upstream), settings.max_age()));

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!(
        "query-kit {} ({}) listening on http://{}",
        query_kit::VERSION,
        settings.environment,
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

/// Log backend size once per freshness window.
fn spawn_stats_logger(backend: InMemoryBackend, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            backend.log_stats();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
