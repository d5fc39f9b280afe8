//! # tetherd
//!
//! tether RPC server binary: loads settings, wires the token issuer and
//! user directory into each configured service, and runs the HTTP/WebSocket
//! server until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tether_auth::TokenIssuer;
use tether_rpc::AuditLog;
use tether_server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT;
use tether_server::{
    BuiltinDeps, ServerConfig, ServiceOptions, ServiceRegistry, StaticDirectory, TetherServer,
    register_builtin, token_config,
};
use tether_settings::{AuthSettings, TetherSettings};

/// tether RPC server.
#[derive(Parser, Debug)]
#[command(name = "tetherd", about = "tether RPC server", version)]
struct Cli {
    /// Settings file (defaults to `~/.tether/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(tether_settings::settings_path)
    }

    /// Command-line flags win over file and environment.
    fn apply(&self, settings: &mut TetherSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn build_issuer(auth: &AuthSettings) -> Result<TokenIssuer> {
    let Some(config) = token_config(auth) else {
        bail!("no signing secret configured; set auth.secret or TETHER_AUTH_SECRET");
    };
    TokenIssuer::new(config).context("Failed to build token issuer")
}

/// One service per configured name, each with the built-in methods and audit log.
fn build_registry(settings: &TetherSettings, deps: &BuiltinDeps) -> Result<Arc<ServiceRegistry>> {
    let registry = Arc::new(ServiceRegistry::new());
    let options = ServiceOptions {
        handler_timeout: ServerConfig::from(&settings.server).handler_timeout,
    };
    for name in &settings.services {
        let service = registry
            .register(name, options.clone())
            .with_context(|| format!("Failed to register service {name:?}"))?;
        register_builtin(&service, deps)
            .with_context(|| format!("Failed to register built-in methods on {name:?}"))?;
        service
            .use_text_middleware(AuditLog)
            .with_context(|| format!("Failed to attach audit log to {name:?}"))?;
    }
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings_path();
    let mut settings = tether_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);

    tether_core::init_subscriber(&settings.logging.level, settings.logging.format);

    let issuer = Arc::new(build_issuer(&settings.auth)?);
    let directory = StaticDirectory::new(&settings.users);
    if directory.is_empty() {
        tracing::warn!("no users configured; login will always fail");
    }
    let deps = BuiltinDeps {
        issuer,
        directory: Arc::new(directory),
    };
    let registry = build_registry(&settings, &deps)?;

    let metrics = match tether_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed; /metrics disabled");
            None
        }
    };

    let server = TetherServer::new(ServerConfig::from(&settings.server), registry, metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        services = ?server.registry().names(),
        "tether listening on ws://{addr}/ws/{{service}}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if server.shutdown().drain(handle, DEFAULT_SHUTDOWN_TIMEOUT).await {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_secret() -> TetherSettings {
        let mut settings = TetherSettings::default();
        settings.auth.secret = Some("daemon-test-secret".into());
        settings
    }

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["tetherd"]);
        let mut settings = TetherSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, TetherSettings::default().server.host);
        assert_eq!(settings.server.port, TetherSettings::default().server.port);
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "tetherd",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--log-level",
            "debug",
        ]);
        let mut settings = TetherSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["tetherd", "--config", "/etc/tether.json"]);
        assert_eq!(cli.settings_path(), PathBuf::from("/etc/tether.json"));
    }

    #[test]
    fn missing_secret_refuses_to_start() {
        let err = build_issuer(&AuthSettings::default()).unwrap_err();
        assert!(err.to_string().contains("signing secret"));
    }

    #[test]
    fn registry_exposes_configured_services() {
        let mut settings = settings_with_secret();
        settings.services = vec!["rpc".into(), "admin".into()];
        let deps = BuiltinDeps {
            issuer: Arc::new(build_issuer(&settings.auth).unwrap()),
            directory: Arc::new(StaticDirectory::default()),
        };

        let registry = build_registry(&settings, &deps).unwrap();
        assert_eq!(registry.names(), vec!["admin".to_string(), "rpc".to_string()]);
        let rpc = registry.lookup("rpc").unwrap();
        assert!(rpc.table().has_method("login"));
        assert!(rpc.table().has_method("version"));
    }

    #[test]
    fn settings_file_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let body = serde_json::json!({
            "auth": {"secret": "from-file"},
            "services": ["edge"],
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let settings = tether_settings::load_settings_from_path(&path).unwrap();
        assert_eq!(settings.services, vec!["edge".to_string()]);
        assert!(build_issuer(&settings.auth).is_ok());
    }
}
