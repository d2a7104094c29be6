use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use feeder_account::implementations::local::create_account;
use feeder_config::{Config, ConfigLoader};
use feeder_core::{FeederBuilder, UpdateEngine};
use feeder_delivery::implementations::evm::alloy::create_delivery;
use feeder_quotation::implementations::{
	coinmarketcap::create_ranking_source, dia::create_quotation_source,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod monitor;

#[derive(Parser)]
#[command(name = "oracle-feeder")]
#[command(about = "Pushes upstream price quotations into an on-chain key-value oracle", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/feeder.toml")]
	config: PathBuf,

	#[arg(long, env = "FEEDER_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Run update cycles until interrupted
	Start,
	/// Validate the configuration file
	Validate,
	/// Run a single cycle and exit
	Once,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_feeder(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
		Some(Commands::Once) => run_once(cli).await,
	}
}

async fn load_config(cli: &Cli) -> Result<Config> {
	info!("Loading configuration from: {:?}", cli.config);

	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn build_engine(config: Config) -> Result<UpdateEngine> {
	FeederBuilder::new(config)
		.with_account_factory("local", create_account)
		.with_quotation_factory("dia", create_quotation_source)
		.with_ranking_factory("coinmarketcap", create_ranking_source)
		.with_delivery_factory("alloy", create_delivery)
		.build()
		.await
		.context("Failed to build update engine")
}

async fn start_feeder(cli: Cli) -> Result<()> {
	info!("Starting oracle feeder");

	let config = load_config(&cli).await?;
	info!(
		name = %config.feeder.name,
		mode = %config.feeder.mode,
		"Configuration loaded"
	);

	let engine = Arc::new(build_engine(config).await?);
	engine
		.prepare()
		.await
		.context("Failed to prepare oracle delivery")?;

	let totals_handle = monitor::spawn_totals_logger(engine.event_bus().subscribe());
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let engine_handle = tokio::spawn({
		let engine = engine.clone();
		async move { engine.run(shutdown_rx).await }
	});

	info!("Oracle feeder started");

	setup_shutdown_signal().await;

	info!("Shutdown signal received, finishing current key...");
	shutdown_tx.send(true).ok();

	engine_handle.await.context("Update engine task failed")?;

	// Dropping the last engine handle closes the event bus.
	drop(engine);
	match totals_handle.await {
		Ok(totals) => info!(
			cycles = totals.cycles,
			submitted = totals.submitted,
			failed = totals.failed,
			"Oracle feeder stopped"
		),
		Err(e) => warn!(error = %e, "Totals logger ended abnormally"),
	}

	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	let config = load_config(&cli).await?;

	info!("Configuration is valid");
	info!("Feeder name: {}", config.feeder.name);
	info!("Mode: {}", config.feeder.mode);
	info!("Account: {}", config.account.provider);
	info!("Quotation: {}", config.quotation.provider);
	if let Some(ranking) = &config.ranking {
		info!("Ranking: {}", ranking.provider);
	}
	info!("Delivery: {}", config.delivery.provider);

	// Providers check their own sections when constructed.
	build_engine(config).await?;
	info!("Provider configuration is valid");

	Ok(())
}

async fn run_once(cli: Cli) -> Result<()> {
	let config = load_config(&cli).await?;
	let engine = build_engine(config).await?;
	engine
		.prepare()
		.await
		.context("Failed to prepare oracle delivery")?;

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let cycle = engine.run_cycle(&shutdown_rx);
	tokio::pin!(cycle);

	let report = tokio::select! {
		report = &mut cycle => report?,
		_ = setup_shutdown_signal() => {
			info!("Shutdown signal received, finishing current key...");
			shutdown_tx.send(true).ok();
			cycle.await?
		}
	};

	for outcome in &report.outcomes {
		match &outcome.result {
			Ok(published) => info!(
				key = %outcome.key,
				value = published.update.scaled_value,
				tx_hash = %published.submission.transaction_hash,
				"Submitted"
			),
			Err(e) => error!(key = %outcome.key, error = %e, "Failed"),
		}
	}

	if report.all_failed() {
		bail!("All {} keys failed", report.failures());
	}
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("Failed to initialise tracing")?;

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(error = %e, "Failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!(error = %e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
