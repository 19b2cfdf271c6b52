use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vulntrack_core::{
    config::{LogConfig, LogFormat, StreamBackend},
    events::{BusConsumer, FindingsStream, StreamConsumer, StreamError},
    load_config,
    secrets::build_credential_provider,
    tracker_client::DefaultTicketClientFactory,
    tracking::TomlConfigStore,
    validate_config, Config, ConsumerSupervisor, FindingReconciler, FindingTicketStore,
    SanitizedConfig, SqliteFindingTicketStore, SupervisorHandle, TicketServer,
};
use vulntrack_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("VULNTRACK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration, logging with defaults if that fails
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path));
    init_tracing(config.as_ref().map(|c| &c.log).unwrap_or(&LogConfig::default()));
    let config = config?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded from {:?}",
        config_path
    );
    info!(
        config = %serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default(),
        "Effective configuration"
    );

    // Create SQLite finding ticket index
    let finding_tickets: Arc<dyn FindingTicketStore> = Arc::new(
        SqliteFindingTicketStore::new(&config.database.path)
            .context("Failed to create finding ticket store")?,
    );
    info!("Finding ticket index initialized at {:?}", config.database.path);

    // Tracker access: project config, credentials and clients
    let credentials = build_credential_provider(&config);
    info!("Using credential provider: {}", credentials.name());
    let tickets = Arc::new(TicketServer::new(
        Arc::new(TomlConfigStore::from_config(&config)),
        credentials,
        Arc::new(DefaultTicketClientFactory),
    ));

    // Start the finding consumer if enabled
    let supervisor = if config.stream.enabled {
        let reconciler = Arc::new(FindingReconciler::new(
            Arc::clone(&tickets),
            Arc::clone(&finding_tickets),
        ));
        Some(spawn_consumer(&config, reconciler))
    } else {
        info!("Finding consumer disabled in config");
        None
    };

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), tickets, finding_tickets));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // A fatal consumer error stops the server
    let (consumer_failed_tx, consumer_failed_rx) = oneshot::channel();
    let consumer = supervisor.map(|handle| {
        let trigger = handle.trigger();
        let task = tokio::spawn(async move {
            let result = handle.wait().await;
            if result.is_err() {
                let _ = consumer_failed_tx.send(());
            }
            result
        });
        (trigger, task)
    });

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(consumer_failed_rx))
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Some((trigger, task)) = consumer {
        info!("Stopping finding consumer...");
        trigger.shutdown();
        task.await
            .context("Finding consumer task panicked")?
            .context("Finding consumer stopped with an error")?;
        info!("Finding consumer stopped");
    }

    Ok(())
}

/// Initialize logging from the `[log]` section; `RUST_LOG` overrides the level.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Build the bus consumer for one consumer cycle.
fn bus_consumer(config: &Config) -> Result<Arc<dyn BusConsumer>, StreamError> {
    match config.stream.backend {
        StreamBackend::Memory => Err(StreamError::Transport(
            "the memory backend has no publishers outside the process".to_string(),
        )),
        #[cfg(feature = "kafka")]
        StreamBackend::Kafka => {
            let kafka = config.stream.kafka.as_ref().ok_or_else(|| {
                StreamError::Transport("missing [stream.kafka] configuration".to_string())
            })?;
            Ok(Arc::new(vulntrack_core::events::KafkaConsumer::new(
                kafka,
                &config.stream.group_id,
            )?))
        }
        #[cfg(not(feature = "kafka"))]
        StreamBackend::Kafka => Err(StreamError::Transport(
            "kafka backend requires the kafka feature".to_string(),
        )),
    }
}

/// Spawn the supervisor running the finding consumer.
fn spawn_consumer(config: &Config, reconciler: Arc<FindingReconciler>) -> SupervisorHandle {
    let config = config.clone();
    let poll_timeout = Duration::from_millis(config.stream.poll_timeout_ms);

    info!(
        backend = ?config.stream.backend,
        topic = %config.stream.topic,
        group_id = %config.stream.group_id,
        "Starting finding consumer"
    );

    ConsumerSupervisor::spawn(
        Duration::from_secs(config.stream.retry_delay_secs),
        move |shutdown| {
            let bus = bus_consumer(&config);
            let topic = config.stream.topic.clone();
            let reconciler = Arc::clone(&reconciler);
            async move {
                let stream = FindingsStream::with_topic(StreamConsumer::new(bus?, poll_timeout), topic);
                stream.process_findings(&shutdown, reconciler.as_ref()).await
            }
        },
    )
}

/// Wait for shutdown signal (Ctrl+C, SIGTERM or a failed consumer)
async fn shutdown_signal(consumer_failed: oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let consumer_failed = async {
        if consumer_failed.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = consumer_failed => {
            error!("Finding consumer stopped, shutting down server");
        },
    }
}
