//! Prometheus exporter for simulated GPU telemetry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::builder::BoolishValueParser;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use fakegpu_common::init_tracing;
use fakegpu_exporter::config::SourceKind;
use fakegpu_exporter::{
    DcgmiSource, DeviceDirectory, DeviceSource, ExporterConfig, HttpServer, MetricCache,
    MetricCollector, MetricsProxy, Refresher, UdsServer,
};
use fakegpu_profiles::{ProfileAssignment, ProfileEngine, ProfileKind};

/// Prometheus exporter for simulated GPU telemetry.
#[derive(Parser, Debug)]
#[command(name = "fakegpu-exporter")]
#[command(about = "Serve simulated DCGM GPU metrics for Prometheus")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long, env = "EXPORTER_LISTEN")]
    listen: Option<String>,

    /// Sample source.
    #[arg(long, value_enum, env = "COLLECTION_SOURCE")]
    source: Option<SourceKind>,

    /// Seconds between metric refreshes.
    #[arg(short, long, env = "METRIC_UPDATE_INTERVAL")]
    interval: Option<u64>,

    /// Path to the dcgmi binary.
    #[arg(long, env = "DCGMI_PATH")]
    dcgmi_path: Option<String>,

    /// Number of simulated devices.
    #[arg(short, long, env = "NUM_FAKE_GPUS")]
    num_devices: Option<u32>,

    /// Id of the first device.
    #[arg(long, env = "GPU_START_INDEX")]
    start_index: Option<u32>,

    /// Profile for every device.
    #[arg(short, long, env = "METRIC_PROFILE")]
    profile: Option<String>,

    /// Per-device profiles, comma separated, assigned cyclically.
    #[arg(long, env = "GPU_PROFILES", value_delimiter = ',')]
    device_profiles: Vec<String>,

    /// Value of the Hostname label ("auto" for the system hostname).
    #[arg(long, env = "EXPORTER_HOSTNAME")]
    hostname: Option<String>,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Also serve metrics on a Unix domain socket.
    #[arg(long, env = "ENABLE_UDS", value_parser = BoolishValueParser::new())]
    uds: bool,

    /// Unix socket path.
    #[arg(long, env = "UDS_SOCKET_PATH")]
    socket_path: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Layer command-line and environment overrides onto the file config.
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(listen) = self.listen {
            config.http.listen = listen;
        }
        if let Some(source) = self.source {
            config.collection.source = source;
        }
        if let Some(interval) = self.interval {
            config.collection.refresh_interval_secs = interval;
        }
        if let Some(path) = self.dcgmi_path {
            config.collection.dcgmi_path = path;
        }
        if let Some(count) = self.num_devices {
            config.devices.count = count;
        }
        if let Some(start) = self.start_index {
            config.devices.start_index = start;
        }
        if let Some(profile) = self.profile {
            config.devices.profile = profile;
        }
        if !self.device_profiles.is_empty() {
            config.devices.profiles = self.device_profiles;
        }
        if let Some(hostname) = self.hostname {
            config.devices.hostname = hostname;
        }
        if self.seed.is_some() {
            config.devices.seed = self.seed;
        }
        if self.uds {
            config.uds.enabled = true;
        }
        if let Some(path) = self.socket_path {
            config.uds.path = path;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

/// Build the configured sample source. A missing `dcgmi` is fatal.
fn build_source(config: &ExporterConfig) -> anyhow::Result<DeviceSource> {
    match config.collection.source {
        SourceKind::Synthetic => {
            let assignment =
                ProfileAssignment::from_names(&config.devices.profile, &config.devices.profiles);
            let engine = ProfileEngine::new(
                &assignment,
                config.devices.device_ids(),
                config.devices.seed,
            );
            Ok(DeviceSource::Synthetic(engine))
        }
        SourceKind::Dcgmi => {
            let source = DcgmiSource::new(
                &config.collection.dcgmi_path,
                config.collection.command_timeout(),
            );
            source.ensure_available()?;
            Ok(DeviceSource::Dcgmi(source))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };
    args.apply(&mut config);

    init_tracing(&config.logging)?;
    config.validate()?;

    info!("Starting fakegpu exporter");

    let hostname = config.devices.get_hostname();
    let listen_addr = config.listen_addr()?;
    info!(
        source = ?config.collection.source,
        devices = config.devices.count,
        start_index = config.devices.start_index,
        hostname = %hostname,
        interval_secs = config.collection.refresh_interval_secs,
        "Configuration loaded"
    );
    debug!(profiles = ?ProfileKind::names(), "Available profiles");

    let source = build_source(&config)?;
    let collector = MetricCollector::new(
        source,
        DeviceDirectory::new(config.devices.start_index, config.devices.count),
        hostname,
    );

    // Serve a populated document from the first request on
    let cache = Arc::new(MetricCache::new());
    let mut refresher = Refresher::new(
        cache.clone(),
        collector,
        config.collection.refresh_interval(),
    );
    let initial = refresher.refresh_now().await;
    if initial.ok {
        let preview: String = initial.body.chars().take(500).collect();
        debug!(bytes = initial.body.len(), "Initial metrics:\n{}", preview);
    } else {
        warn!(marker = %initial.body.trim_end(), "Initial collection failed");
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Bind front ends before serving; failures here are fatal
    let http_server = HttpServer::new(cache.clone(), listen_addr, config.http.path.clone());
    let listener = http_server.bind().await?;
    let bound_port = listener.local_addr()?.port();

    let uds_server = if config.uds.enabled {
        let proxy = MetricsProxy::new(
            config.upstream_url(bound_port),
            config.uds.retry.policy(),
            config.uds.retry.request_timeout(),
        )?;
        Some(UdsServer::bind(&config.uds.path, config.uds.socket_mode, proxy)?)
    } else {
        None
    };

    // Start refresher
    let refresher_task = tokio::spawn(refresher.run(shutdown_rx.clone()));

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve(listener, http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Start Unix socket server
    let uds_task = uds_server.map(|server| {
        let uds_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = server.run(uds_shutdown).await {
                error!("Unix socket server error: {}", e);
            }
        })
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let joined = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = refresher_task.await;
        let _ = http_task.await;
        if let Some(task) = uds_task {
            let _ = task.await;
        }
    })
    .await;
    if joined.is_err() {
        warn!("Tasks did not stop within 5s");
    }

    // Print final stats
    let stats = cache.stats();
    info!(
        refreshes = stats.refreshes,
        failed_refreshes = stats.failed_refreshes,
        last_success = ?stats.last_success,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

/// Resolve on SIGTERM. Never resolves where the signal is unavailable.
async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
