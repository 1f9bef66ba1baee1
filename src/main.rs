//! courier
//!
//! Command line front end for the transaction engine.
//!
//! ```text
//! courier [--config FILE] send --body FILE [--host H] [--path P]
//! courier [--config FILE] check-config
//! courier [--config FILE] trust [--roots-dir DIR] [ROOT...]
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use courier::config::loader::{apply_env_overrides, LEGACY_PLAINTEXT_ENV};
use courier::config::{load_config, CourierConfig};
use courier::net::tls::platform_trust;
use courier::net::{RootSource, TrustStoreBuilder};
use courier::observability::logging::init_logging;
use courier::transaction::{EncryptionState, JsonCodec, TransactionController, TransactionStats};

#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about = "Send POST transactions with retries, redirects and trust fallback", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a JSON document and print the response report
    Send {
        /// JSON file to send as the request body
        #[arg(short, long)]
        body: PathBuf,

        /// Override the configured endpoint host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured endpoint path
        #[arg(long)]
        path: Option<String>,
    },
    /// Validate the configuration and print the effective values
    CheckConfig,
    /// Build the bundled trust store and report its anchors
    Trust {
        /// Directory holding the PEM files (defaults to the embedded set)
        #[arg(long)]
        roots_dir: Option<PathBuf>,

        /// Root resource names (defaults to transport.bundled_roots)
        roots: Vec<String>,
    },
}

#[derive(Serialize)]
struct SendReport {
    response: Value,
    endpoint: String,
    encryption_state: EncryptionState,
    stats: TransactionStats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = CourierConfig::default();
            apply_env_overrides(&mut config, std::env::var(LEGACY_PLAINTEXT_ENV).ok().as_deref());
            config
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("logging disabled: {e}");
    }

    tracing::debug!(
        config = ?cli.config,
        legacy_plaintext = config.transport.legacy_plaintext,
        max_retries = config.transaction.max_retries,
        max_redirects = config.transaction.max_redirects,
        timeout_ms = config.transaction.timeout_ms,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Send { body, host, path } => {
            if let Some(host) = host {
                config.endpoint.host = host;
            }
            if let Some(path) = path {
                config.endpoint.path = path;
            }

            let request: Value = serde_json::from_str(&std::fs::read_to_string(&body)?)?;
            let controller = TransactionController::from_config(&config, JsonCodec::<Value, Value>::new())?;
            let delivery = controller.send(&request).await?;

            let report = SendReport {
                response: delivery.response,
                endpoint: delivery.endpoint.to_string(),
                encryption_state: delivery.encryption,
                stats: delivery.stats,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CheckConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Trust { roots_dir, roots } => {
            let names = if roots.is_empty() {
                config.transport.bundled_roots.clone()
            } else {
                roots
            };
            let source = match roots_dir.or_else(|| config.transport.roots_dir.as_ref().map(PathBuf::from)) {
                Some(dir) => RootSource::Directory(dir),
                None => RootSource::Embedded,
            };

            let bundled = TrustStoreBuilder::new(source).build(names.as_slice())?;
            println!("bundled: {} anchors from {}", bundled.anchors(), names.join(", "));

            match platform_trust() {
                Ok(platform) => println!("platform: {} anchors", platform.anchors()),
                Err(e) => println!("platform: unavailable ({e})"),
            }
        }
    }

    Ok(())
}
