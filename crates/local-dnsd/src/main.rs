// # local-dnsd - Local DNS Daemon
//
// A thin integration layer: all reconciliation logic lives in
// local-dns-core. The daemon is responsible for:
// 1. Reading settings from environment variables
// 2. Loading and validating the JSON configuration
// 3. Registering provider factories and provisioning every provider
// 4. Serving the request adapter as HTTP middleware
//
// ## Configuration
//
// - `LOCAL_DNS_CONFIG`: Path to the JSON configuration file (required)
// - `LOCAL_DNS_LISTEN`: Listen address (default `127.0.0.1:8053`)
// - `LOCAL_DNS_LOG_LEVEL`: trace, debug, info, warn or error (default info,
//   or debug when the configuration sets `debug`)
//
// ## Example
//
// ```bash
// export LOCAL_DNS_CONFIG=/etc/local-dns/config.json
// export LOCAL_DNS_LISTEN=0.0.0.0:8053
//
// local-dnsd
// ```
//
// Then point the reverse proxy's forward-auth hook at the listen address.

mod server;

use anyhow::{Context, Result};
use local_dns_core::{LocalDnsConfig, ProviderFactories, ProviderRegistry, Reconciler, SiteRouter};
use std::env;
use std::future::Future;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_LISTEN: &str = "127.0.0.1:8053";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or provisioning error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum LocalDnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or provisioning failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<LocalDnsExitCode> for ExitCode {
    fn from(code: LocalDnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process settings read from the environment
struct Settings {
    config_path: String,
    listen: SocketAddr,
    log_level: Option<String>,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        let config_path = env::var("LOCAL_DNS_CONFIG").context(
            "LOCAL_DNS_CONFIG is required. \
            Set it via: export LOCAL_DNS_CONFIG=/etc/local-dns/config.json",
        )?;

        let listen_raw = env::var("LOCAL_DNS_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string());
        let listen = listen_raw
            .parse()
            .with_context(|| format!("LOCAL_DNS_LISTEN is not a socket address: {}", listen_raw))?;

        let log_level = env::var("LOCAL_DNS_LOG_LEVEL")
            .ok()
            .map(|level| level.to_lowercase());

        if let Some(level) = &log_level {
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                _ => anyhow::bail!(
                    "LOCAL_DNS_LOG_LEVEL '{}' is not valid. \
                    Valid levels: trace, debug, info, warn, error",
                    level
                ),
            }
        }

        Ok(Self {
            config_path,
            listen,
            log_level,
        })
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return LocalDnsExitCode::ConfigError.into();
        }
    };

    let config = match LocalDnsConfig::from_file(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error ({}): {}", settings.config_path, e);
            return LocalDnsExitCode::ConfigError.into();
        }
    };

    // The config debug flag only raises the default level
    let level = settings
        .log_level
        .clone()
        .unwrap_or_else(|| (if config.debug { "debug" } else { "info" }).to_string());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LocalDnsExitCode::ConfigError.into();
    }

    info!("Starting local-dnsd daemon");

    let sites = match provision(&config) {
        Ok(sites) => sites,
        Err(e) => {
            error!("Provisioning failed: {:#}", e);
            return LocalDnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LocalDnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(settings.listen, sites).await {
            error!("Daemon error: {:#}", e);
            LocalDnsExitCode::RuntimeError
        } else {
            LocalDnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build every provider and bind every site, all or nothing
fn provision(config: &LocalDnsConfig) -> Result<SiteRouter> {
    #[allow(unused_mut)]
    let mut factories = ProviderFactories::with_builtins();

    #[cfg(feature = "opnsense")]
    {
        info!("Registering OPNsense provider");
        local_dns_provider_opnsense::register(&mut factories);
    }

    let registry = ProviderRegistry::provision(&config.providers, &factories, config.debug)?;
    info!(providers = registry.len(), "Providers provisioned");

    let reconciler = Arc::new(Reconciler::from_config(Arc::new(registry), config)?);
    let sites = SiteRouter::provision(reconciler, &config.sites)?;
    info!(sites = sites.len(), "Sites bound");

    Ok(sites)
}

/// Serve until a shutdown signal arrives
async fn run_daemon(listen: SocketAddr, sites: SiteRouter) -> Result<()> {
    let shutdown = shutdown_signal()?;

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!(address = %listen, "Listening for proxied requests");

    axum::serve(listener, server::router(Arc::new(sites)))
        .with_graceful_shutdown(async move {
            let signal = shutdown.await;
            info!("Received shutdown signal: {}", signal);
        })
        .await
        .context("HTTP server failed")?;

    info!("Shutting down daemon");
    Ok(())
}

/// Install handlers for SIGTERM and SIGINT
///
/// The returned future resolves with the name of the first signal received.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Install a CTRL-C handler
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    })
}
