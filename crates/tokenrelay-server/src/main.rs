use clap::Parser;
use std::sync::Arc;
use tokenrelay_core::record::TokenRequest;
use tokenrelay_server::config::{CliArgs, ServiceConfig};
use tokenrelay_server::engine::ingest::{run_cache_writer, run_response_ingest};
use tokenrelay_server::engine::{ReplayBus, RequestDispatcher, ResponseCache, TokenIssuer};
use tokenrelay_server::issuance::{IssuancePool, SimulatedIssuer, run_request_processor};
use tokenrelay_server::telemetry::init_telemetry;
use tokenrelay_server::transport::ResponseChannel;
use tokenrelay_server::transport::memory::{MemoryResponseChannel, request_channel};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServiceConfig::try_from(args)?;

    init_telemetry();
    log_startup_info(&config);

    let (requests_tx, requests_rx) = request_channel(config.channel_capacity);
    let responses = Arc::new(MemoryResponseChannel::new(config.channel_capacity));

    let bus = Arc::new(ReplayBus::new(config.bus_capacity));
    let cache = Arc::new(ResponseCache::new(config.grace_period));
    let shutdown = CancellationToken::new();

    // The cache writer's subscription must exist before any request can be
    // dispatched, otherwise an early response would never reach the cache.
    let cache_subscription = bus.subscribe();

    let mut ingest = tokio::spawn(run_response_ingest(
        responses.clone() as Arc<dyn ResponseChannel>,
        bus.clone(),
        shutdown.clone(),
    ));
    let mut cache_writer = tokio::spawn(run_cache_writer(
        cache_subscription,
        cache.clone(),
        shutdown.clone(),
    ));

    let pool = Arc::new(IssuancePool::spawn(
        config.num_workers,
        Arc::new(SimulatedIssuer::default()),
        responses.clone(),
        config.token_validity,
        shutdown.clone(),
    ));
    let mut processor = tokio::spawn(run_request_processor(
        requests_rx,
        pool.clone(),
        shutdown.clone(),
    ));

    let issuer = TokenIssuer::new(
        cache,
        bus,
        RequestDispatcher::new(Arc::new(requests_tx)),
        config.wait_timeout,
    );
    let demo = tokio::spawn(run_demo_loop(
        issuer,
        config.demo_users.clone(),
        config.demo_interval,
        shutdown.clone(),
    ));

    let result = tokio::select! {
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received, terminating gracefully...");
            Ok(())
        }
        res = &mut cache_writer => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!(e).context("cache writer failed")),
            Err(e) => Err(anyhow::anyhow!(e).context("cache writer panicked")),
        },
        res = &mut ingest => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!(e).context("response ingest failed")),
            Err(e) => Err(anyhow::anyhow!(e).context("response ingest panicked")),
        },
        res = &mut processor => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!(e).context("request processor failed")),
            Err(e) => Err(anyhow::anyhow!(e).context("request processor panicked")),
        },
    };

    shutdown.cancel();
    pool.shutdown().await;

    if tokio::time::timeout(core::time::Duration::from_secs(3), demo)
        .await
        .is_err()
    {
        tracing::warn!(task = "demo loop", "task did not stop in time");
    }
    for (name, handle) in [
        ("response ingest", ingest),
        ("cache writer", cache_writer),
        ("request processor", processor),
    ] {
        if handle.is_finished() {
            continue;
        }
        if tokio::time::timeout(core::time::Duration::from_secs(3), handle)
            .await
            .is_err()
        {
            tracing::warn!(task = name, "task did not stop in time");
        }
    }

    if result.is_ok() {
        tracing::info!("service shut down successfully");
    }
    result
}

fn log_startup_info(config: &ServiceConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("starting token relay with full config: {:#?}", config);
    } else {
        tracing::info!(
            num_workers = config.num_workers,
            wait_timeout_secs = config.wait_timeout.as_secs(),
            "starting token relay"
        );
    }
}

/// Periodically issues tokens for the configured demo users.
///
/// Rounds after the first are expected to hit the cache until the grace
/// window erodes the entry, at which point a fresh dispatch goes out.
async fn run_demo_loop(
    issuer: TokenIssuer,
    users: Vec<String>,
    interval: core::time::Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        for user in &users {
            let request = TokenRequest::new(user, "s3cret");
            match issuer.issue(request).await {
                Ok(response) => tracing::info!(
                    user = %response.user,
                    correlation_id = %response.correlation_id,
                    expires_at = ?response.expires_at,
                    "token available"
                ),
                Err(e) => tracing::warn!(user = %user, error = %e, "token issuance failed"),
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C signal"),
        () = terminate => tracing::info!("received SIGTERM signal"),
    }
}
