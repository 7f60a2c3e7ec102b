//! Process wiring and graceful shutdown.
//!
//! [`run`] connects to Postgres, installs the metrics recorder, spawns the
//! background workers and serves HTTP until Ctrl+C or SIGTERM. On shutdown:
//!
//! 1. The HTTP server stops accepting connections and drains in-flight requests
//! 2. The expiry sweep is told to stop
//! 3. The notification queue closes once the last sender is dropped, and the
//!    dispatcher finishes what is already queued
//! 4. Each background task gets `shutdown_timeout` to exit

use crate::config::{Config, GatewayKind};
use crate::metrics;
use crate::notify::{ConsoleNotifier, NotificationDispatcher, WebhookNotifier};
use crate::payments::{MockPaymentGateway, PaymentGateway, RazorpayGateway};
use crate::retry::RetryPolicy;
use crate::server::{build_router, AppState, Dependencies};
use crate::sweep::ExpirySweep;
use anyhow::Context;
use axum::Router;
use axum::routing::get;
use gatepass_core::environment::{Clock, SystemClock};
use gatepass_core::notify::NotificationSender;
use gatepass_core::ticket_code::RandomCodes;
use gatepass_postgres::{PostgresClaimLog, PostgresSessionResolver, PostgresTicketStore};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Run the service until a shutdown signal arrives.
///
/// # Errors
///
/// Fails if the database, metrics recorder, gateway client or listeners
/// cannot be set up, or if the HTTP server itself errors.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL");

    if config.postgres.run_migrations {
        gatepass_postgres::migrate(&pool)
            .await
            .context("failed to run migrations")?;
        info!("Migrations applied");
    }

    let handle = metrics::install_recorder()?;
    let metrics_task = spawn_metrics_server(&config, handle).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = payment_gateway(&config)?;
    let sender = notification_sender(&config)?;

    let policy = RetryPolicy::builder()
        .max_retries(config.notifications.max_retries)
        .initial_delay(Duration::from_millis(config.notifications.initial_backoff_ms))
        .build();
    let (queue, dispatcher) =
        NotificationDispatcher::new(sender, policy, config.notifications.queue_capacity).spawn();

    let deps = Dependencies {
        store: Arc::new(PostgresTicketStore::new(pool.clone())),
        claims: Arc::new(PostgresClaimLog::new(pool.clone())),
        sessions: Arc::new(PostgresSessionResolver::new(pool.clone())),
        gateway,
        codes: Arc::new(RandomCodes),
        clock: Arc::clone(&clock),
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut workers: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    if config.sweep.enabled {
        let sweep = ExpirySweep::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.claims),
            Arc::clone(&clock),
            Duration::from_secs(config.sweep.interval_secs),
            config.sweep.batch,
        );
        workers.push(("expiry_sweep", sweep.spawn(shutdown_tx.subscribe())));
    }

    let state = AppState::new(deps, &config, queue);
    let router = build_router(state, config.server.request_timeout());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "HTTP server listening");

    // Serving consumes the router; once it returns every queue sender is gone.
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("HTTP server stopped, shutting down background tasks");
    let _ = shutdown_tx.send(());
    workers.push(("notification_dispatcher", dispatcher));

    let timeout = config.server.shutdown_timeout();
    for (name, handle) in workers {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => info!(task = name, "Task stopped gracefully"),
            Ok(Err(e)) => warn!(task = name, error = %e, "Task failed"),
            Err(_) => warn!(task = name, "Task shutdown timed out"),
        }
    }

    metrics_task.abort();
    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

fn payment_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let payments = &config.payments;
    match payments.gateway {
        GatewayKind::Mock => {
            info!("Using mock payment gateway");
            Ok(Arc::new(MockPaymentGateway::new(payments.key_id.clone())))
        }
        GatewayKind::Razorpay => {
            if payments.key_secret.is_empty() {
                anyhow::bail!("RAZORPAY_KEY_SECRET must be set when PAYMENT_GATEWAY=razorpay");
            }
            let gateway = RazorpayGateway::new(
                payments.api_base.clone(),
                payments.key_id.clone(),
                payments.key_secret.clone(),
                Duration::from_secs(payments.gateway_timeout),
            )?;
            info!(api_base = %payments.api_base, "Using Razorpay gateway");
            Ok(Arc::new(gateway))
        }
    }
}

fn notification_sender(config: &Config) -> anyhow::Result<Arc<dyn NotificationSender>> {
    match &config.notifications.webhook_url {
        Some(url) => {
            info!(url = %url, "Delivering notifications by webhook");
            Ok(Arc::new(WebhookNotifier::new(
                url.clone(),
                Duration::from_secs(10),
            )?))
        }
        None => {
            info!("No notification webhook configured, logging notifications");
            Ok(Arc::new(ConsoleNotifier))
        }
    }
}

async fn spawn_metrics_server(
    config: &Config,
    handle: PrometheusHandle,
) -> anyhow::Result<JoinHandle<()>> {
    let addr = format!("{}:{}", config.server.metrics_host, config.server.metrics_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    info!(address = %addr, "Metrics endpoint listening");

    let app = Router::new().route("/metrics", get(move || async move { handle.render() }));
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server failed");
        }
    }))
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
