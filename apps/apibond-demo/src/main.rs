use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use users_api::UserStore;

/// Apibond demo server - users API derived from a single contract
#[derive(Parser)]
#[command(name = "apibond-demo")]
#[command(about = "Apibond demo server - users API derived from a single contract")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log filter, e.g. "info" or "apibond=debug"
    #[arg(long)]
    log: Option<String>,

    /// Also validate outbound responses against the contract
    #[arg(long)]
    strict_responses: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct AppConfig {
    bind: SocketAddr,
    log: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8087".parse().expect("static default address"),
            log: "info".to_string(),
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if let Some(path) = &cli.config {
        figment = figment.merge(Yaml::file(path));
    }
    figment = figment.merge(Env::prefixed("APIBOND_"));

    let mut config: AppConfig = figment.extract().context("invalid configuration")?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(log) = &cli.log {
        config.log = log.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log)),
        )
        .init();

    let store = Arc::new(UserStore::new());
    let contract = Arc::new(users_api::users_contract()?);
    let validator = Arc::new(apibond::JsonSchemaValidator::new());
    let router = apibond::ServerBuilder::new(contract, validator)
        .handlers(users_api::handlers::handlers(store))
        .validate_responses(cli.strict_responses)
        .build()
        .context("contract wiring")?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("users API listening on http://{}", config.bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {err}");
    }
}
