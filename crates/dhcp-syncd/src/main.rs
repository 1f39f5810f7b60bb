// # dhcp-syncd - DHCP Sync Daemon
//
// Thin integration layer: all eligibility, registry and sync logic lives in
// dhcp-core. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the push transport and building the coordinator
// 4. Seeding DHCP/DNS servers and running the sync loop
//
// ## Configuration
//
// ### Identity Store
// - `DHCP_SYNC_IDENTITY_PATH`: JSON snapshot of IP address records (required)
//
// ### Target Store
// - `DHCP_SYNC_TARGET_STORE_TYPE`: file, memory (default: file)
// - `DHCP_SYNC_TARGET_STORE_PATH`: Path to the target file (for file store)
// - `DHCP_SYNC_SERVERS`: Comma-separated DHCP server IPs registered at startup
// - `DHCP_SYNC_DNS_SERVERS`: Comma-separated DNS servers, `ip` or `ip=default`
//
// ### Push Transport
// - `DHCP_SYNC_PUSH_PORT`: Agent port (default: 8067)
// - `DHCP_SYNC_PUSH_PATH`: Agent path (default: /dhcp/entries)
// - `DHCP_SYNC_PUSH_TOKEN`: Bearer token (optional)
// - `DHCP_SYNC_PUSH_TLS`: Use HTTPS (default: false)
// - `DHCP_SYNC_MODE`: `dry-run` to log pushes without sending them
//
// ### Coordinator
// - `DHCP_SYNC_INTERVAL_SECS`: Seconds between runs (default: 300)
// - `DHCP_SYNC_MAX_CONCURRENCY`: Parallel pushes (default: 8)
// - `DHCP_SYNC_ONCE`: Run a single sync and exit (default: false)
// - `DHCP_SYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export DHCP_SYNC_IDENTITY_PATH=/var/lib/inventory/ip_addresses.json
// export DHCP_SYNC_TARGET_STORE_PATH=/var/lib/dhcp-sync/targets.json
// export DHCP_SYNC_SERVERS=10.0.0.1,10.0.0.2
// export DHCP_SYNC_DNS_SERVERS=10.0.0.53=default,10.0.0.54
//
// dhcp-syncd
// ```

use anyhow::{Context, Result};
use dhcp_core::config::{
    CoordinatorConfig, IdentityStoreConfig, SyncConfig, TargetStoreConfig, TransportConfig,
};
use dhcp_core::{ComponentRegistry, Error, SyncEvent, SyncTargetRegistry};
use std::env;
use std::net::IpAddr;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown (or a one-shot run where every push succeeded)
/// - 1: Configuration or startup error
/// - 2: Runtime error, including failed pushes in one-shot mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// A DNS server to register at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DnsSeed {
    ip: IpAddr,
    is_default: bool,
}

/// Application configuration
struct Config {
    identity_path: String,
    target_store_type: String,
    target_store_path: Option<String>,
    dhcp_servers: Vec<IpAddr>,
    dns_servers: Vec<DnsSeed>,
    push_port: u16,
    push_path: String,
    push_token: Option<String>,
    push_tls: bool,
    interval_secs: u64,
    max_concurrency: usize,
    once: bool,
    dry_run: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            identity_path: lookup("DHCP_SYNC_IDENTITY_PATH").unwrap_or_default(),
            target_store_type: lookup("DHCP_SYNC_TARGET_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            target_store_path: lookup("DHCP_SYNC_TARGET_STORE_PATH"),
            dhcp_servers: parse_dhcp_servers(&lookup("DHCP_SYNC_SERVERS").unwrap_or_default())?,
            dns_servers: parse_dns_servers(&lookup("DHCP_SYNC_DNS_SERVERS").unwrap_or_default())?,
            push_port: parse_or(&lookup, "DHCP_SYNC_PUSH_PORT", 8067)?,
            push_path: lookup("DHCP_SYNC_PUSH_PATH").unwrap_or_else(|| "/dhcp/entries".to_string()),
            push_token: lookup("DHCP_SYNC_PUSH_TOKEN").filter(|t| !t.is_empty()),
            push_tls: parse_flag(&lookup, "DHCP_SYNC_PUSH_TLS")?,
            interval_secs: parse_or(&lookup, "DHCP_SYNC_INTERVAL_SECS", 300)?,
            max_concurrency: parse_or(&lookup, "DHCP_SYNC_MAX_CONCURRENCY", 8)?,
            once: parse_flag(&lookup, "DHCP_SYNC_ONCE")?,
            dry_run: lookup("DHCP_SYNC_MODE")
                .unwrap_or_default()
                .eq_ignore_ascii_case("dry-run"),
            log_level: lookup("DHCP_SYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.identity_path.is_empty() {
            anyhow::bail!(
                "DHCP_SYNC_IDENTITY_PATH is required. \
                Set it via: export DHCP_SYNC_IDENTITY_PATH=/var/lib/inventory/ip_addresses.json"
            );
        }

        match self.target_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "DHCP_SYNC_TARGET_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.target_store_type
            ),
        }

        if self.target_store_type == "file" {
            match self.target_store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "DHCP_SYNC_TARGET_STORE_PATH is required when DHCP_SYNC_TARGET_STORE_TYPE=file. \
                    Set it via: export DHCP_SYNC_TARGET_STORE_PATH=/var/lib/dhcp-sync/targets.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "DHCP_SYNC_TARGET_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            }
        }

        if !(10..=86_400).contains(&self.interval_secs) {
            anyhow::bail!(
                "DHCP_SYNC_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                self.interval_secs
            );
        }

        if !(1..=256).contains(&self.max_concurrency) {
            anyhow::bail!(
                "DHCP_SYNC_MAX_CONCURRENCY must be between 1 and 256. Got: {}",
                self.max_concurrency
            );
        }

        if self.push_token.is_some() && !self.push_tls {
            eprintln!(
                "WARNING: DHCP_SYNC_PUSH_TOKEN is set but DHCP_SYNC_PUSH_TLS is off. \
                The token will be sent in clear text."
            );
        }

        if parse_log_level(&self.log_level).is_none() {
            anyhow::bail!(
                "DHCP_SYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        // Remaining checks (port, path) are shared with library callers
        self.to_sync_config().validate()?;

        Ok(())
    }

    /// Library configuration equivalent to these settings
    ///
    /// Dry-run forces an in-memory target store so no timestamps are persisted
    /// for pushes that never happened.
    fn to_sync_config(&self) -> SyncConfig {
        let target_store = match (self.target_store_type.as_str(), &self.target_store_path) {
            ("file", Some(path)) if !self.dry_run => TargetStoreConfig::File { path: path.clone() },
            _ => TargetStoreConfig::Memory,
        };

        SyncConfig {
            identity_store: IdentityStoreConfig::File {
                path: self.identity_path.clone(),
            },
            target_store,
            transport: TransportConfig::Http {
                port: self.push_port,
                path: self.push_path.clone(),
                token: self.push_token.clone(),
                use_tls: self.push_tls,
                timeout_secs: 30,
                dry_run: self.dry_run,
            },
            coordinator: CoordinatorConfig {
                interval_secs: self.interval_secs,
                max_concurrent_pushes: self.max_concurrency,
                ..CoordinatorConfig::default()
            },
        }
    }
}

/// Parse a numeric variable, falling back to `default` when unset
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, raw)),
        _ => Ok(default),
    }
}

/// Parse a boolean variable; unset means false
fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_default();
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => anyhow::bail!("{} must be true or false. Got: '{}'", key, raw),
    }
}

/// Parse `10.0.0.1,10.0.0.2`
fn parse_dhcp_servers(raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .with_context(|| format!("DHCP_SYNC_SERVERS contains an invalid IP: '{}'", s))
        })
        .collect()
}

/// Parse `10.0.0.53=default,10.0.0.54`
fn parse_dns_servers(raw: &str) -> Result<Vec<DnsSeed>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| -> Result<DnsSeed> {
            let (addr, flag) = match item.split_once('=') {
                Some((addr, flag)) => (addr.trim(), Some(flag.trim())),
                None => (item, None),
            };

            let is_default = match flag {
                None => false,
                Some(flag) if flag.eq_ignore_ascii_case("default") => true,
                Some(flag) => anyhow::bail!(
                    "DHCP_SYNC_DNS_SERVERS entry '{}' has an unknown flag '{}'. \
                    Use 'ip' or 'ip=default'",
                    item,
                    flag
                ),
            };

            let ip = addr
                .parse::<IpAddr>()
                .with_context(|| format!("DHCP_SYNC_DNS_SERVERS contains an invalid IP: '{}'", addr))?;

            Ok(DnsSeed { ip, is_default })
        })
        .collect()
}

fn parse_log_level(raw: &str) -> Option<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SyncExitCode::ConfigError.into();
    }

    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting dhcp-syncd daemon");
    info!(
        "Configuration loaded: {} DHCP server(s), {} DNS server(s) to seed",
        config.dhcp_servers.len(),
        config.dns_servers.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                SyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<SyncExitCode> {
    let components = ComponentRegistry::with_builtin_stores();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP push transport");
        dhcp_push_http::register(&components);
    }

    if config.dry_run && config.target_store_type == "file" {
        warn!("DRY-RUN mode: using an in-memory target store, timestamps will not be persisted");
    }

    let sync_config = config.to_sync_config();
    let (coordinator, events) = components
        .build_coordinator(&sync_config)
        .await
        .context("Failed to build sync coordinator")?;

    seed_targets(coordinator.registry(), &config).await?;

    let event_logger = tokio::spawn(log_events(events));

    let code = if config.once {
        let outcomes = coordinator.sync_all().await?;
        coordinator.registry().flush().await?;

        let failed = outcomes.iter().filter(|o| !o.success).count();
        if failed > 0 {
            error!("{} of {} DHCP server(s) failed to sync", failed, outcomes.len());
            SyncExitCode::RuntimeError
        } else {
            info!("All {} DHCP server(s) synchronized", outcomes.len());
            SyncExitCode::CleanShutdown
        }
    } else {
        let signals = ShutdownSignals::install()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let name = signals.recv().await;
            info!("Received shutdown signal: {}", name);
            let _ = shutdown_tx.send(());
        });

        info!(
            "Sync loop started (every {}s, up to {} parallel pushes)",
            config.interval_secs, config.max_concurrency
        );
        coordinator.run_with_shutdown(shutdown_rx).await?;
        SyncExitCode::CleanShutdown
    };

    // Closing the event channel ends the logger
    drop(coordinator);
    if let Err(e) = event_logger.await {
        warn!("Event logger did not finish cleanly: {}", e);
    }

    info!("Shutting down daemon");
    Ok(code)
}

/// Register configured DHCP and DNS servers; existing ones are left untouched
async fn seed_targets(registry: &SyncTargetRegistry, config: &Config) -> Result<()> {
    for ip in &config.dhcp_servers {
        match registry.register_dhcp_server(*ip).await {
            Ok(_) => {}
            Err(Error::DuplicateIp { .. }) => debug!("DHCP server {} already registered", ip),
            Err(e) => return Err(e).context(format!("Failed to register DHCP server {}", ip)),
        }
    }

    for seed in &config.dns_servers {
        match registry.register_dns_server(seed.ip, seed.is_default).await {
            Ok(_) => {}
            Err(Error::DuplicateIp { .. }) => debug!("DNS server {} already registered", seed.ip),
            Err(e) => return Err(e).context(format!("Failed to register DNS server {}", seed.ip)),
        }
    }

    let defaults = registry.list_dns_servers(true).await?;
    if !defaults.is_empty() {
        let list: Vec<String> = defaults.iter().map(ToString::to_string).collect();
        info!("Default DNS servers: {}", list.join(", "));
    }

    Ok(())
}

/// Log coordinator events until the channel closes
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::RunStarted { targets, entries } => {
                debug!("Run started: {} entries, {} target(s)", entries, targets)
            }
            SyncEvent::PushStarted { target, entries } => {
                debug!("Pushing {} entries to {}", entries, target)
            }
            SyncEvent::PushSucceeded { target, entries } => {
                debug!("{} accepted {} entries", target, entries)
            }
            SyncEvent::PushFailed { target, error } => {
                debug!("{} not synchronized: {}", target, error)
            }
            SyncEvent::RunFinished { succeeded, failed } => {
                debug!("Run finished: {} ok, {} failed", succeeded, failed)
            }
            SyncEvent::RunFailed { error } => warn!("Run failed: {}", error),
            SyncEvent::Stopped { reason } => info!("Coordinator stopped: {}", reason),
        }
    }
}

/// Installed handlers for SIGTERM and SIGINT
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the first signal and return its name
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Ctrl-C only on non-Unix platforms
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<&'static str>().await
            }
        }
    }
}
