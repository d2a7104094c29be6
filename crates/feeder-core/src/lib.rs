//! Oracle update engine and its assembly from configuration.

use alloy::network::EthereumWallet;
use feeder_account::{AccountError, AccountInterface, AccountService};
use feeder_config::Config;
use feeder_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use feeder_pricing::{GasMarkup, PriceError};
use feeder_quotation::{FetchError, QuotationService, QuotationSource, RankingService, RankingSource};
use feeder_types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod engine;
pub mod event_bus;

#[cfg(test)]
mod mocks;

pub use engine::{CycleReport, KeyOutcome, Published, UpdateEngine, RANKING_KEY};
pub use event_bus::EventBus;

#[derive(Debug, Error)]
pub enum FeederError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("A cycle is already in progress")]
	CycleInProgress,
}

/// Why a single key was not published. Contained within its cycle.
#[derive(Debug, Error)]
pub enum UpdateError {
	#[error("Failed to fetch {symbol}: {source}")]
	Fetch { symbol: String, source: FetchError },
	#[error("No quotation for {symbol} in this cycle")]
	Unavailable { symbol: String },
	#[error("Failed to fetch ranking: {0}")]
	Ranking(#[source] FetchError),
	#[error(transparent)]
	Price(#[from] PriceError),
	#[error(transparent)]
	Delivery(#[from] DeliveryError),
}

type AccountFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> + Send>;
type QuotationFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn QuotationSource>, FetchError> + Send>;
type RankingFactory = Box<dyn Fn(&toml::Value) -> Result<Box<dyn RankingSource>, FetchError> + Send>;
type DeliveryFactory = Box<
	dyn Fn(&toml::Value, EthereumWallet, Address) -> Result<Box<dyn DeliveryInterface>, DeliveryError>
		+ Send,
>;

/// Assembles an [`UpdateEngine`] from configuration and named factories.
pub struct FeederBuilder {
	config: Config,
	account_factories: HashMap<String, AccountFactory>,
	quotation_factories: HashMap<String, QuotationFactory>,
	ranking_factories: HashMap<String, RankingFactory>,
	delivery_factories: HashMap<String, DeliveryFactory>,
}

impl FeederBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			account_factories: HashMap::new(),
			quotation_factories: HashMap::new(),
			ranking_factories: HashMap::new(),
			delivery_factories: HashMap::new(),
		}
	}

	pub fn with_account_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> + Send + 'static,
	{
		self.account_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_quotation_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn QuotationSource>, FetchError> + Send + 'static,
	{
		self.quotation_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_ranking_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn RankingSource>, FetchError> + Send + 'static,
	{
		self.ranking_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_delivery_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value, EthereumWallet, Address) -> Result<Box<dyn DeliveryInterface>, DeliveryError>
			+ Send
			+ 'static,
	{
		self.delivery_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub async fn build(self) -> Result<UpdateEngine, FeederError> {
		let config = self.config;
		let timeout = config.feeder.call_timeout();

		// Account
		let account_factory = self
			.account_factories
			.get(&config.account.provider)
			.ok_or_else(|| unknown("account", &config.account.provider))?;
		let account = AccountService::new(
			account_factory(&config.account.config)
				.map_err(|e| FeederError::Config(e.to_string()))?,
		);
		let signer = account
			.get_address()
			.await
			.map_err(|e| FeederError::Config(e.to_string()))?;
		info!(address = %signer, "Signer loaded");

		// Quotation source
		let quotation_factory = self
			.quotation_factories
			.get(&config.quotation.provider)
			.ok_or_else(|| unknown("quotation", &config.quotation.provider))?;
		let quotation = Arc::new(QuotationService::new(
			quotation_factory(&config.quotation.config)
				.map_err(|e| FeederError::Config(e.to_string()))?,
			timeout,
		));

		// Ranking source, batch mode only
		let ranking = match &config.ranking {
			Some(ranking_config) => {
				let factory = self
					.ranking_factories
					.get(&ranking_config.provider)
					.ok_or_else(|| unknown("ranking", &ranking_config.provider))?;
				let source =
					factory(&ranking_config.config).map_err(|e| FeederError::Config(e.to_string()))?;
				Some(Arc::new(RankingService::new(source, timeout)))
			}
			None => None,
		};

		// Delivery
		let markup = GasMarkup::new(config.delivery.gas_markup)
			.map_err(|e| FeederError::Config(e.to_string()))?;
		let delivery_factory = self
			.delivery_factories
			.get(&config.delivery.provider)
			.ok_or_else(|| unknown("delivery", &config.delivery.provider))?;
		let delivery = Arc::new(DeliveryService::new(
			delivery_factory(&config.delivery.config, account.wallet(), signer)
				.map_err(|e| FeederError::Config(e.to_string()))?,
			config.delivery.gas_limit,
			markup,
			timeout,
		));

		UpdateEngine::new(config.feeder, quotation, ranking, delivery, EventBus::new(1000))
	}
}

fn unknown(kind: &str, provider: &str) -> FeederError {
	FeederError::Config(format!("Unknown {} provider: {}", kind, provider))
}
