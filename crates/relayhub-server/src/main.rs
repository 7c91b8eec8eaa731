//! Relayhub server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! RELAYHUB_SUPERVISOR_KEY=secret relayhub-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate (production)
//! relayhub-server --bind 0.0.0.0:4433 --cert cert.pem --key key.pem
//!
//! # Static permission table instead of prefix matching
//! relayhub-server --grant guard=sarah_phone1,john_laptop --grant nanny=kid_tablet
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};
use relayhub_core::{ClassifierConfig, Grant, PermissionPolicy, StaticPermissions};
use relayhub_server::{DriverConfig, Server, ServerRuntimeConfig, SupervisorMode};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Supervisor admission mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SupervisorModeArg {
    /// One supervisor at a time
    Single,
    /// Any number of supervisors
    Group,
}

impl From<SupervisorModeArg> for SupervisorMode {
    fn from(mode: SupervisorModeArg) -> Self {
        match mode {
            SupervisorModeArg::Single => Self::SingleSlot,
            SupervisorModeArg::Group => Self::Group,
        }
    }
}

/// Relayhub relay server
#[derive(Parser, Debug)]
#[command(name = "relayhub-server")]
#[command(about = "Real-time relay hub with role-scoped fan-out")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, env = "RELAYHUB_BIND", default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long, env = "RELAYHUB_CERT")]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long, env = "RELAYHUB_KEY")]
    key: Option<String>,

    /// Secret required to claim the supervisor name
    #[arg(long, env = "RELAYHUB_SUPERVISOR_KEY", hide_env_values = true)]
    supervisor_key: Option<String>,

    /// Reserved supervisor name
    #[arg(long, env = "RELAYHUB_SUPERVISOR_NAME", default_value = "admin")]
    supervisor_name: String,

    /// Supervisor admission mode
    #[arg(long, value_enum, default_value = "group")]
    supervisor_mode: SupervisorModeArg,

    /// Static grant `monitor=node1,node2` (repeatable; replaces prefix matching)
    #[arg(long = "grant")]
    grants: Vec<Grant>,

    /// Maximum concurrent monitors
    #[arg(long)]
    max_monitors: Option<usize>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Command action that schedules the follow-up
    #[arg(long, default_value = "START_LIVE")]
    live_action: String,

    /// Follow-up command action
    #[arg(long, default_value = "START_ECO")]
    eco_action: String,

    /// Seconds before the follow-up command fires
    #[arg(long, default_value = "300")]
    eco_delay_secs: u64,

    /// Milliseconds between driver ticks
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn runtime_config(self) -> ServerRuntimeConfig {
        let mut classifier =
            ClassifierConfig { supervisor_name: self.supervisor_name, supervisor_key: None };
        if let Some(secret) = self.supervisor_key.as_deref() {
            classifier = classifier.with_supervisor_key(secret);
        }

        let permissions = if self.grants.is_empty() {
            PermissionPolicy::Prefix
        } else {
            PermissionPolicy::Static(self.grants.into_iter().collect::<StaticPermissions>())
        };

        ServerRuntimeConfig {
            bind_address: self.bind,
            cert_path: self.cert,
            key_path: self.key,
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            driver: DriverConfig {
                max_connections: self.max_connections,
                classifier,
                supervisor_mode: self.supervisor_mode.into(),
                permissions,
                max_monitors: self.max_monitors,
                live_action: self.live_action,
                eco_action: self.eco_action,
                eco_delay: Duration::from_secs(self.eco_delay_secs),
            },
            ..ServerRuntimeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Relayhub server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    if args.supervisor_key.is_none() {
        tracing::warn!("No supervisor key configured - every supervisor claim will be rejected");
    }

    let config = args.runtime_config();
    if let PermissionPolicy::Static(table) = &config.driver.permissions {
        tracing::info!("Using static permission table for {} monitor(s)", table.monitor_count());
    }

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_grants_merge_per_monitor() {
        let args = Args::try_parse_from([
            "relayhub-server",
            "--grant",
            "guard=sarah_phone1",
            "--grant",
            "nanny=kid_tablet",
            "--grant",
            "Guard=john_laptop",
        ])
        .unwrap();

        let config = args.runtime_config();
        let PermissionPolicy::Static(table) = &config.driver.permissions else {
            panic!("expected a static table");
        };
        assert_eq!(table.monitor_count(), 2);
        assert!(config.driver.permissions.permits("guard", "john_laptop"));
        assert!(!config.driver.permissions.permits("nanny", "sarah_phone1"));
    }

    #[test]
    fn no_grants_means_prefix_matching() {
        let config = Args::try_parse_from(["relayhub-server"]).unwrap().runtime_config();
        assert!(matches!(config.driver.permissions, PermissionPolicy::Prefix));
    }
}
