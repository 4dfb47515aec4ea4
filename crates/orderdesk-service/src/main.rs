//! Main entry point for the order desk.
//!
//! This binary loads the configured storage backend and sync adapter, brings
//! the live order collection up from durable storage, and runs one operator
//! command against it.

use clap::Parser;
use orderdesk_config::Config;
use orderdesk_types::NetworkStatus;
use std::path::PathBuf;

mod commands;
mod factory_registry;

use commands::Command;

/// Command-line arguments for the order desk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Treat the device as offline: nothing is sent to the remote side
	#[arg(long)]
	offline: bool,

	#[command(subcommand)]
	command: Command,
}

/// Main entry point for the order desk.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the sync engine and loads stored orders
/// 5. Runs the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	// Logs go to stderr so command output stays clean on stdout
	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.app.id);

	let engine = factory_registry::build_engine_from_config(config)?;
	engine.load_all().await;

	let network = NetworkStatus {
		connected: !args.offline,
		internet_reachable: None,
	};

	let mut stdout = std::io::stdout().lock();
	commands::execute(&engine, args.command, network, &mut stdout).await?;
	Ok(())
}
