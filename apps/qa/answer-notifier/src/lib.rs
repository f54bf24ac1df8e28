//! Answer Notifier Service
//!
//! Emails question owners when an answer on their question is created,
//! updated or deleted.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (qa:answer-events)          stdin (SNS document)
//!   ↓ (Consumer Group: answer_notifiers)     ↓
//!   └──────────────┬─────────────────────────┘
//!                  ↓
//! Dispatcher: parse → render → claim dedup key (Redis SET NX) → send
//!                  ↓
//! Email provider (Amazon SES | SMTP | recording)
//! ```
//!
//! Stream entries are acknowledged once their batch has been dispatched,
//! whatever the per-record outcome. Failed records are logged and counted,
//! never retried.

pub mod config;
pub mod health;
pub mod source;

use crate::config::{Mode, NotifierConfig, StreamConfig};
use crate::health::{HealthState, health_router};
use crate::source::{StreamSource, split_batch};
use axum::Router;
use core_config::redis::{RedisConfig, connect_with_retry};
use core_config::{Environment, FromEnv, app_info};
use domain_answer_notifications::{
    Branding, DedupStore, Dispatcher, DispatcherConfig, EmailProvider,
    PositionalEventParser, ProviderConfig, RedisDedupStore, TemplateEngine, build_provider,
    decode_sns_event,
};
use eyre::{Result, WrapErr};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Pause after a failed stream read or acknowledgement before trying again.
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Run the notifier.
///
/// 1. Sets up structured logging (JSON in production, pretty otherwise)
/// 2. Loads configuration and connects to Redis with retry
/// 3. Builds the dispatcher once and shares it for the lifetime of the process
/// 4. Consumes the stream until SIGINT/SIGTERM, or processes one stdin document
///
/// # Errors
///
/// Configuration errors, an unreachable Redis, a provider that cannot be
/// constructed, or (stdin mode) a malformed trigger document.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting answer notifier");
    info!("Environment: {:?}", environment);

    let config = NotifierConfig::from_env().wrap_err("Failed to load notifier configuration")?;

    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    info!("Connecting to Redis...");
    let redis = connect_with_retry(&redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;
    info!("Connected to Redis successfully");

    let dispatcher = build_dispatcher(redis.clone()).await?;

    match config.mode {
        Mode::Stdin => run_stdin(&dispatcher).await,
        Mode::Stream => {
            health::init_metrics().wrap_err("Failed to initialize metrics")?;

            let health_state = HealthState::new(
                Arc::new(redis.clone()),
                app_info.name,
                app_info.version,
                config.stream.stream_name.clone(),
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = shutdown_signal().await {
                    error!("Error waiting for shutdown signal: {}", e);
                }
                let _ = shutdown_tx.send(true);
            });

            let health_port = config.health_port;
            let health_shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = start_health_server(health_state, health_port, health_shutdown).await {
                    error!(error = %e, "Health server failed");
                }
            });

            run_stream(redis, config.stream, &dispatcher, shutdown_rx).await
        }
    }
}

/// Assemble the dispatcher from environment configuration.
async fn build_dispatcher(redis: ConnectionManager) -> Result<Dispatcher> {
    let dispatcher_config =
        DispatcherConfig::from_env().wrap_err("Failed to load dispatcher configuration")?;
    let branding = Branding::from_env().wrap_err("Failed to load branding")?;
    let provider_config =
        ProviderConfig::from_env().wrap_err("Failed to load email provider configuration")?;

    let templates = TemplateEngine::new(branding).wrap_err("Failed to compile email templates")?;
    let store: Arc<dyn DedupStore> = Arc::new(RedisDedupStore::new(redis));

    let provider_kind = provider_config.kind();
    let provider: Arc<dyn EmailProvider> = build_provider(provider_config)
        .await
        .wrap_err("Failed to build email provider")?;

    info!(
        provider = %provider_kind,
        dedup_store = store.name(),
        dedup_key_prefix = %dispatcher_config.dedup_key_prefix,
        call_timeout_ms = dispatcher_config.call_timeout.as_millis() as u64,
        "Dispatcher configured"
    );

    Ok(Dispatcher::new(
        Arc::new(PositionalEventParser::new()),
        Arc::new(templates),
        store,
        provider,
        dispatcher_config,
    ))
}

/// Process one SNS-shaped document read from stdin.
async fn run_stdin(dispatcher: &Dispatcher) -> Result<()> {
    let mut document = String::new();
    tokio::io::stdin()
        .read_to_string(&mut document)
        .await
        .wrap_err("Failed to read trigger document from stdin")?;

    let records = decode_sns_event(&document).wrap_err("Malformed trigger document")?;
    let report = dispatcher.dispatch_batch(&records).await;
    if report.failed > 0 {
        warn!(failed = report.failed, total = report.total, "Some notifications were not sent");
    }

    Ok(())
}

/// Consume the notification stream until shutdown.
///
/// Pending entries of this consumer are drained first so that a restart
/// finishes the batch it was interrupted in.
async fn run_stream(
    redis: ConnectionManager,
    config: StreamConfig,
    dispatcher: &Dispatcher,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    info!(
        stream = %config.stream_name,
        consumer_group = %config.consumer_group,
        consumer_id = %config.consumer_id,
        batch_size = config.batch_size,
        block_ms = config.block_ms,
        "Stream configuration loaded"
    );

    let source = StreamSource::new(redis, config);
    source
        .init_consumer_group()
        .await
        .wrap_err("Failed to create consumer group")?;

    let mut draining_pending = true;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let read = if draining_pending {
            source.read_pending().await
        } else {
            tokio::select! {
                read = source.read_new() => read,
                _ = shutdown_rx.changed() => break,
            }
        };

        let entries = match read {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to read from stream, backing off");
                if wait_or_shutdown(&mut shutdown_rx, READ_ERROR_BACKOFF).await {
                    break;
                }
                continue;
            }
        };

        if entries.is_empty() {
            if draining_pending {
                info!("No pending entries left, reading new entries");
                draining_pending = false;
            }
            continue;
        }

        let (records, ids) = split_batch(entries);
        dispatcher.dispatch_batch(&records).await;

        if let Err(e) = source.ack(&ids).await {
            // Unacknowledged entries stay pending and are read again; dedup
            // keeps them from being emailed twice.
            error!(error = %e, count = ids.len(), "Failed to acknowledge entries, backing off");
            if wait_or_shutdown(&mut shutdown_rx, READ_ERROR_BACKOFF).await {
                break;
            }
        }
    }

    info!("Answer notifier stopped");
    Ok(())
}

/// Sleep for `delay` unless shutdown comes first. Returns `true` on shutdown.
async fn wait_or_shutdown(shutdown_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *shutdown_rx.borrow(),
        _ = shutdown_rx.changed() => true,
    }
}

/// Serve `/health`, `/ready` and `/metrics` until shutdown.
async fn start_health_server(
    health_state: HealthState,
    port: u16,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app: Router = health_router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .wrap_err("Failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = ctrl_c => {
            result.wrap_err("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
