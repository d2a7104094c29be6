//! Configuration types for the feeder.

use feeder_types::{FeedMode, TimestampSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete feeder configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Cycle and feed settings
	pub feeder: FeederSettings,
	/// Signer key material
	pub account: ProviderConfig,
	/// Upstream price source
	pub quotation: ProviderConfig,
	/// Upstream market-cap ranking, batch mode only
	#[serde(default)]
	pub ranking: Option<ProviderConfig>,
	/// Oracle contract submission
	pub delivery: DeliverySettings,
}

/// Cycle and feed settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeederSettings {
	/// Instance name for logging
	#[serde(default = "default_name")]
	pub name: String,
	/// How the symbols of a cycle are chosen
	#[serde(default)]
	pub mode: FeedMode,
	/// Static symbol list (pair mode)
	#[serde(default)]
	pub symbols: Vec<String>,
	/// Common base for ratio updates (pair mode)
	#[serde(default)]
	pub pair_base: Option<String>,
	/// Number of top-ranked symbols (batch mode)
	#[serde(default = "default_batch_size")]
	pub batch_size: usize,
	/// Named third-party listing for foreign quotations (batch mode)
	#[serde(default)]
	pub foreign_source: Option<String>,
	/// Fixed-point multiplier applied to every published price
	#[serde(default = "default_scale_factor")]
	pub scale_factor: u64,
	/// Which clock stamps an update
	#[serde(default)]
	pub timestamp_source: TimestampSource,
	/// Pause after each per-key step
	#[serde(default = "default_interval_secs")]
	pub inter_step_delay_secs: u64,
	/// Period between cycle starts
	#[serde(default = "default_interval_secs")]
	pub cycle_interval_secs: u64,
	/// Upper bound for every upstream or node call
	#[serde(default = "default_call_timeout_secs")]
	pub call_timeout_secs: u64,
}

impl FeederSettings {
	pub fn inter_step_delay(&self) -> Duration {
		Duration::from_secs(self.inter_step_delay_secs)
	}

	pub fn cycle_interval(&self) -> Duration {
		Duration::from_secs(self.cycle_interval_secs)
	}

	pub fn call_timeout(&self) -> Duration {
		Duration::from_secs(self.call_timeout_secs)
	}

	/// Upper-cases symbols the way the upstream APIs expect them.
	pub(crate) fn normalize(&mut self) {
		for symbol in &mut self.symbols {
			*symbol = symbol.trim().to_uppercase();
		}
		if let Some(base) = &mut self.pair_base {
			*base = base.trim().to_uppercase();
		}
	}
}

/// A named provider together with its implementation-specific table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
	/// Implementation name, e.g. "dia" or "local"
	pub provider: String,
	/// Implementation-specific settings, validated by the provider's schema
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

/// Oracle submission settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliverySettings {
	/// Implementation name, e.g. "alloy"
	pub provider: String,
	/// Fixed gas limit for every oracle write
	#[serde(default = "default_gas_limit")]
	pub gas_limit: u64,
	/// Multiplier applied to the suggested gas price
	#[serde(default = "default_gas_markup")]
	pub gas_markup: Decimal,
	/// Implementation-specific settings
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

fn default_name() -> String {
	"oracle-feeder".to_string()
}

fn default_batch_size() -> usize {
	50
}

fn default_scale_factor() -> u64 {
	100_000_000
}

fn default_interval_secs() -> u64 {
	120
}

fn default_call_timeout_secs() -> u64 {
	30
}

fn default_gas_limit() -> u64 {
	800_725
}

fn default_gas_markup() -> Decimal {
	Decimal::new(11, 1)
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}
