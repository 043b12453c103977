//! mpesa-kit CLI
//!
//! Runs the webhook server and offers offline helpers for inspecting
//! callbacks and generating security credentials.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mpesa_kit::callback::{classify, parse_callback, CallbackFamily, ParsedCallback};
use mpesa_kit::config::Environment;
use mpesa_kit::credential::SecurityCredentialCodec;
use mpesa_kit::server::{webhook_router, LoggingHandler, WebhookState};
use tracing_subscriber::EnvFilter;

/// M-Pesa Daraja toolkit
#[derive(Parser, Debug)]
#[command(name = "mpesa-kit")]
#[command(version)]
#[command(about = "M-Pesa Daraja callbacks, credentials and webhooks")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Print the family of a callback file
    Classify {
        /// Callback JSON file
        file: PathBuf,
    },

    /// Normalize a callback file and print it as JSON
    Parse {
        /// Callback JSON file
        file: PathBuf,

        /// Family to parse as; detected when omitted
        #[arg(short, long)]
        family: Option<String>,
    },

    /// Encrypt MPESA_INITIATOR_PASSWORD into a security credential
    Credential {
        /// sandbox or production
        #[arg(short, long, default_value = "sandbox")]
        env: String,

        /// Certificate to use instead of the bundled one
        #[arg(short, long)]
        cert: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Serve { port, host } => serve(&host, port).await,
        Command::Classify { file } => {
            let parsed = read_callback(&file)?;
            println!("{}", classify(&parsed));
            Ok(())
        }
        Command::Parse { file, family } => {
            let parsed = read_callback(&file)?;
            let family = match family {
                Some(name) => name.parse::<CallbackFamily>()?,
                None => classify(&parsed),
            };
            if !family.is_known() {
                bail!("could not determine the callback family of {}", file.display());
            }
            let result = parse_callback(&parsed, family)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Credential { env, cert } => {
            let environment: Environment = env.parse()?;
            let password = std::env::var("MPESA_INITIATOR_PASSWORD")
                .context("MPESA_INITIATOR_PASSWORD is not set")?;

            let mut codec = SecurityCredentialCodec::new();
            if let Some(cert) = cert {
                if !cert.exists() {
                    bail!("certificate {} does not exist", cert.display());
                }
                codec = codec.with_certificate(environment, cert);
            }
            println!("{}", codec.encrypt(&password, environment)?);
            Ok(())
        }
    }
}

fn read_callback(file: &Path) -> anyhow::Result<ParsedCallback> {
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    Ok(ParsedCallback::from_bytes(&bytes)?)
}

async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let state = Arc::new(WebhookState::new(Arc::new(LoggingHandler)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("mpesa-kit webhook server listening on {}", addr);

    axum::serve(listener, webhook_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
