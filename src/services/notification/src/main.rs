//! Main binary for the society notification dispatcher
//!
//! Serves the trigger ingress over HTTP and runs the daily bill jobs on
//! their cron schedules until Ctrl+C or SIGTERM.

use society_notifier::{NotifierConfig, NotifierService};

use anyhow::{anyhow, Context};
use clap::{Arg, ArgMatches, Command};
use std::net::SocketAddr;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(anyhow!("Failed to read .env file: {}", e));
        }
    }

    // Parse command line arguments
    let matches = create_cli().get_matches();

    init_tracing(matches.get_one::<String>("log-format").map(String::as_str))?;

    let config = load_config(&matches)?;
    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        anyhow!(e)
    })?;

    info!("Starting society notifier");
    info!(
        "Configuration: Server {}:{}",
        config.server.host, config.server.port
    );
    info!(
        push = ?config.push.provider,
        store = ?config.store.backend,
        scheduler = config.scheduler.enabled,
        utc_offset_minutes = config.scheduler.utc_offset_minutes,
        "Dispatcher settings"
    );

    let cancellation_token = CancellationToken::new();

    let service = NotifierService::new(config.clone()).await.map_err(|e| {
        error!("Failed to initialize notifier: {}", e);
        e
    })?;

    match service.scheduler().start().await {
        Ok(job_ids) if !job_ids.is_empty() => {
            info!(jobs = job_ids.len(), "Daily job scheduler started");
        }
        Ok(_) => {}
        Err(e) => {
            warn!(
                "Failed to start scheduler: {}, continuing without daily jobs",
                e
            );
        }
    }

    let app = service.router();

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address '{}'", config.server.host))?,
        config.server.port,
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;

    info!("Notifier listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    if config.metrics.enabled {
        info!("Metrics: http://{}/metrics", addr);
    }

    let server_task = tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(cancellation_token.cancelled_owned());
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        }
    });

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    cancellation_token.cancel();

    if let Err(e) = service.scheduler().stop().await {
        warn!("Failed to stop scheduler gracefully: {}", e);
    }

    if let Err(e) = server_task.await {
        error!("Server task error during shutdown: {}", e);
    }

    info!("Society notifier stopped gracefully");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(format: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "society_notifier=info,tower_http=info,mongodb=warn".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        Some("json") => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        _ => registry.with(fmt::layer().with_target(true)).try_init(),
    }
    .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}

/// Create CLI argument parser
fn create_cli() -> Command {
    Command::new("society-notifier")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Society notifier - push notifications for society management events")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Server host address"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log output format")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
}

/// Load configuration from file and environment, then apply CLI overrides
fn load_config(matches: &ArgMatches) -> anyhow::Result<NotifierConfig> {
    let mut config = if let Some(config_file) = matches.get_one::<String>("config") {
        info!("Loading configuration from file: {}", config_file);
        std::env::set_var("NOTIFIER_CONFIG_FILE", config_file);
        NotifierConfig::from_env().context("Failed to load configuration from file")?
    } else {
        NotifierConfig::from_env().context("Failed to load configuration from environment")?
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }

    if let Some(port_str) = matches.get_one::<String>("port") {
        config.server.port = port_str
            .parse()
            .with_context(|| format!("Invalid port number '{}'", port_str))?;
    }

    Ok(config)
}

/// Wait for shutdown signals
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
