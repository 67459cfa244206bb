//! Budget Alert Relay - forwards AWS Budgets notifications to Synapse users.
//!
//! Each notification names a Service Catalog product whose name embeds the
//! owning user's Synapse id. The relay extracts that id and sends the
//! notification to the user as a private Synapse message.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod event;
pub mod messaging;
pub mod relay;
pub mod runtime;
pub mod secrets;
pub mod subject;

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::cli::{Cli, Commands};
use crate::config::RelayConfig;
use crate::credentials::{EnvSource, ProcessEnv};
use crate::error::RelayError;
use crate::messaging::SynapseClient;
use crate::relay::AlertRelay;
use crate::runtime::LambdaRuntime;
use crate::secrets::ParameterStoreClient;

/// The relay as wired for production.
pub type ProductionRelay = AlertRelay<ProcessEnv, ParameterStoreClient, SynapseClient>;

/// Runs the relay with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level())?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve => serve(config_path).await,
        Commands::Handle { event } => handle_event_file(config_path, &event).await,
        Commands::ParseSubject { subject } => parse_subject(&subject),
        Commands::ConfigShow => show_config(config_path),
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so that stdout carries only command output.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Builds the production relay from configuration.
pub fn build_relay(config: &RelayConfig) -> Result<ProductionRelay, RelayError> {
    build_relay_with_env(config, ProcessEnv)
}

/// Builds a relay that reads credentials and the session token from `env`.
pub fn build_relay_with_env<E: EnvSource>(
    config: &RelayConfig,
    env: E,
) -> Result<AlertRelay<E, ParameterStoreClient, SynapseClient>, RelayError> {
    let session_token = env.var(&config.secret_store.session_token_var);
    let secrets = ParameterStoreClient::new(&config.secret_store, session_token)?;
    let messaging = SynapseClient::new(&config.messaging)?;

    Ok(AlertRelay::new(
        config.credentials.clone(),
        env,
        secrets,
        messaging,
        config.messaging.content_type,
    ))
}

/// Serves invocations from the runtime API until interrupted.
async fn serve(config_path: Option<&Path>) -> Result<()> {
    let runtime = LambdaRuntime::from_env()?;

    let relay = config::load_and_validate(config_path)
        .map_err(RelayError::from)
        .and_then(|config| build_relay(&config));
    let mut relay = match relay {
        Ok(relay) => relay,
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "Failed to initialize relay");
            runtime.post_init_error(&e.to_string()).await?;
            return Err(e.into());
        }
    };

    info!("Alert relay is serving invocations");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            next = runtime.next_invocation() => {
                match next {
                    Ok(invocation) => {
                        let result = relay.handle_json(&invocation.payload).await;
                        if let Err(e) = runtime.post_response(&invocation.request_id, &result).await {
                            error!(request_id = %invocation.request_id, error = %e, "Failed to post invocation result");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to fetch next invocation");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Handles one event file and prints the invocation result.
async fn handle_event_file(config_path: Option<&Path>, event_path: &Path) -> Result<()> {
    let payload = read_event(event_path)?;

    let result = match config::load_and_validate(config_path)
        .map_err(RelayError::from)
        .and_then(|config| build_relay(&config))
    {
        Ok(mut relay) => relay.handle_json(&payload).await,
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "Failed to initialize relay");
            event::InvocationResult::failure(e.to_string())
        }
    };

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn read_event(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read event from stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read event file '{}'", path.display()))
    }
}

/// Prints the recipient id found in a subject line.
fn parse_subject(subject: &str) -> Result<()> {
    match subject::parse_recipient_id(Some(subject)) {
        Some(id) => println!("{}", id),
        None => anyhow::bail!("No recipient id found in subject: {:?}", subject),
    }
    Ok(())
}

/// Displays the effective configuration.
fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_and_validate(config_path)?;
    let yaml = serde_yaml::to_string(&config)?;
    println!("{}", yaml);
    Ok(())
}
