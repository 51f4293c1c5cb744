// # refscoped - refscope daemon
//
// Thin integration layer around refscope-core. All catalog logic lives in
// the library; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Loads a host fixture and fills the catalog
// 4. Runs the Poller until SIGINT/SIGTERM
//
// ## Configuration
//
// - `REFSCOPE_HOST_FIXTURE`: JSON host fixture (required)
// - `REFSCOPE_NAMES_FILE`: Extra name list, one name per line (optional)
// - `REFSCOPE_OUTPUT_DIR`: Base directory for name snapshots (optional)
// - `REFSCOPE_TICK_INTERVAL_MS`: Update tick interval (default 100)
// - `REFSCOPE_BLACKLIST`: Comma-separated names that are never sampled
// - `REFSCOPE_QUERY`: Query whose results are logged once at startup
// - `REFSCOPE_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export REFSCOPE_HOST_FIXTURE=./fixtures/cessna.json
// export REFSCOPE_OUTPUT_DIR=/tmp/refscope
// export REFSCOPE_BLACKLIST=sim/flightmodel/forces/fnrml_total
// export REFSCOPE_QUERY="autopilot heading"
//
// refscoped
// ```

use anyhow::{Context, Result};
use refscope_core::host::MemoryHost;
use refscope_core::{Catalog, CatalogConfig, CatalogEvent, Poller, RefSource, SearchQuery};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum RefscopeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RefscopeExitCode> for ExitCode {
    fn from(code: RefscopeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    host_fixture: PathBuf,
    names_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    tick_interval_ms: u64,
    blacklist: Vec<String>,
    query: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let tick_interval_ms: u64 = match env::var("REFSCOPE_TICK_INTERVAL_MS") {
            Ok(raw) => raw.trim().parse().with_context(|| {
                format!("REFSCOPE_TICK_INTERVAL_MS must be a whole number of milliseconds. Got: {}", raw)
            })?,
            Err(_) => 100,
        };

        Ok(Self {
            host_fixture: env::var("REFSCOPE_HOST_FIXTURE")
                .context("REFSCOPE_HOST_FIXTURE is required")?
                .into(),
            names_file: non_empty_var("REFSCOPE_NAMES_FILE").map(PathBuf::from),
            output_dir: non_empty_var("REFSCOPE_OUTPUT_DIR").map(PathBuf::from),
            tick_interval_ms,
            blacklist: env::var("REFSCOPE_BLACKLIST")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            query: non_empty_var("REFSCOPE_QUERY"),
            log_level: env::var("REFSCOPE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !self.host_fixture.is_file() {
            anyhow::bail!(
                "REFSCOPE_HOST_FIXTURE does not point to a file: {}",
                self.host_fixture.display()
            );
        }

        if let Some(names_file) = &self.names_file
            && !names_file.is_file()
        {
            anyhow::bail!(
                "REFSCOPE_NAMES_FILE does not point to a file: {}",
                names_file.display()
            );
        }

        if !(1..=60_000).contains(&self.tick_interval_ms) {
            anyhow::bail!(
                "REFSCOPE_TICK_INTERVAL_MS must be between 1 and 60000. Got: {}",
                self.tick_interval_ms
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "REFSCOPE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Library configuration derived from the environment
    fn catalog_config(&self) -> CatalogConfig {
        let mut config = CatalogConfig::new().with_blacklist(self.blacklist.iter().cloned());
        if let Some(dir) = &self.output_dir {
            config = config.with_export_dir(dir);
        }
        config.poller.tick_interval_ms = self.tick_interval_ms;
        config
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return RefscopeExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RefscopeExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RefscopeExitCode::ConfigError.into();
    }

    info!("Starting refscoped");

    // Startup failures (bad fixture, invalid catalog config) are config errors.
    let catalog = match build_catalog(&config) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return RefscopeExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RefscopeExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(catalog, &config).await {
            error!("Daemon error: {:#}", e);
            RefscopeExitCode::RuntimeError
        } else {
            RefscopeExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Load the host fixture and fill a catalog from it
fn build_catalog(config: &Config) -> Result<Catalog> {
    let host = MemoryHost::load_fixture(&config.host_fixture)
        .with_context(|| format!("Failed to load host fixture {}", config.host_fixture.display()))?;

    let mut catalog = Catalog::new(Box::new(host), config.catalog_config())?;

    let enumerated = catalog.ingest_enumerated();
    info!("Registered {} enumerated names", enumerated);

    if let Some(names_file) = &config.names_file {
        let registered = catalog
            .ingest_file(names_file, RefSource::NameFile)
            .with_context(|| format!("Failed to read names file {}", names_file.display()))?;
        info!("Registered {} names from {}", registered, names_file.display());
    }

    let store = catalog.store();
    info!(
        "Catalog ready: {} values, {} commands",
        store.values().len(),
        store.commands().len()
    );
    Ok(catalog)
}

/// Run the daemon
async fn run_daemon(catalog: Catalog, config: &Config) -> Result<()> {
    let poller_config = catalog.config().poller.clone();
    let (mut poller, handle, events) = Poller::new(catalog, poller_config)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task = tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });
    let events_task = tokio::spawn(log_events(events));

    if let Some(text) = &config.query {
        let query = SearchQuery::new(text.as_str()).case_insensitive(true);
        match handle.search(query).await {
            Ok(hits) => {
                for hit in &hits {
                    info!("{:?} {}", hit.kind, hit.name);
                }
            }
            Err(e) => warn!("Startup query failed: {}", e),
        }
    }
    drop(handle);

    info!("Ready to track changes");

    match wait_for_shutdown().await {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => error!("Shutdown error: {}", e),
    }

    // The poller may already be gone if it failed; nothing to signal then.
    let _ = shutdown_tx.send(());
    poller_task.await??;
    events_task.await?;

    info!("Shutting down refscoped");
    Ok(())
}

/// Log poller events until the poller drops its sender
async fn log_events(mut events: mpsc::Receiver<CatalogEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            CatalogEvent::Ticked { changed, big_changes } => {
                debug!("Tick: {} changed, {} big", changed, big_changes);
            }
            other => info!("Poller event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
