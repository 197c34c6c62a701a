//! `sentry-gatewayd` — standalone daemon binary for the Sentry personal
//! AI gateway.
//!
//! Exit codes: 0 normal shutdown, 2 configuration error, 3 credential
//! store uninitialized or corrupt, 4 storage unreachable.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use clap::Parser;
use sentry_gateway::{Gateway, StartupError};

/// Sentry Gateway daemon — local security boundary between a user and
/// the LLM providers they've configured.
#[derive(Parser)]
#[command(name = "sentry-gatewayd")]
#[command(author, version, about = "Sentry gateway daemon")]
struct Args {
    /// Path to a config file, overriding the default search path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn credential_seed() -> Result<Vec<u8>, StartupError> {
    std::env::var("SENTRY_CREDENTIAL_SEED")
        .map(String::into_bytes)
        .map_err(|_| StartupError::CredentialStore("SENTRY_CREDENTIAL_SEED is not set".to_string()))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let code = run(args).await;
    std::process::exit(code);
}

async fn run(args: Args) -> i32 {
    let resolved = match &args.config {
        Some(path) => sentry_config::Config::load_file(path)
            .map(|config| sentry_config::ResolvedConfig { config, loaded_files: vec![path.display().to_string()] }),
        None => sentry_config::Config::load(None),
    };
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return StartupError::from(err).exit_code();
        },
    };

    let level = if args.verbose { "debug" } else { resolved.config.logging.level.as_str() };
    let mut log_config = sentry_gateway::config_bridge::log_config(&resolved.config);
    if args.verbose {
        log_config = sentry_telemetry::LogConfig::new(level).with_format(log_config.format);
    }
    if let Err(err) = sentry_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {err}");
    }

    let seed = match credential_seed() {
        Ok(seed) => seed,
        Err(err) => {
            eprintln!("{err}");
            return err.exit_code();
        },
    };

    let (gateway, sweepers) = match Gateway::assemble(resolved.config, &seed) {
        Ok(assembled) => assembled,
        Err(err) => {
            eprintln!("failed to start gateway: {err}");
            return err.exit_code();
        },
    };

    tracing::info!("sentry-gatewayd started");

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutting down");
    sweepers.shutdown();
    gateway.batcher.shutdown().await;

    0
}
