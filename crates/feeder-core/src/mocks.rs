//! In-memory seams for engine tests.

use async_trait::async_trait;
use chrono::Utc;
use feeder_config::FeederSettings;
use feeder_delivery::{DeliveryError, DeliveryInterface};
use feeder_quotation::{FetchError, QuotationSource, RankingSource};
use feeder_types::{Address, FeedMode, Quotation, SubmissionResult, TimestampSource, TransactionHash};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub type CallLog = Arc<Mutex<Vec<(String, Instant)>>>;
pub type WriteLog = Arc<Mutex<Vec<(String, u128)>>>;

/// Serves fixed prices; symbols without a price fail with HTTP 500.
#[derive(Default)]
pub struct MockQuotation {
	pub prices: HashMap<String, Decimal>,
	/// Requested symbol -> symbol the upstream answers with.
	pub answers_as: HashMap<String, String>,
	pub calls: CallLog,
}

impl MockQuotation {
	fn quote(&self, label: String, symbol: &str) -> Result<Quotation, FetchError> {
		self.calls.lock().unwrap().push((label, Instant::now()));
		let answered = self.answers_as.get(symbol).map_or(symbol, String::as_str);
		match self.prices.get(symbol) {
			Some(price) => Ok(Quotation::new(answered, *price, Utc::now())?),
			None => Err(FetchError::Status {
				status: 500,
				message: format!("no price for {}", symbol),
			}),
		}
	}
}

#[async_trait]
impl QuotationSource for MockQuotation {
	async fn fetch(&self, symbol: &str) -> Result<Quotation, FetchError> {
		self.quote(symbol.to_string(), symbol)
	}

	async fn fetch_foreign(&self, source: &str, symbol: &str) -> Result<Quotation, FetchError> {
		self.quote(format!("{}:{}", source, symbol), symbol)
	}
}

pub struct MockRanking {
	pub symbols: Vec<String>,
	pub calls: CallLog,
}

#[async_trait]
impl RankingSource for MockRanking {
	async fn top_symbols(&self, n: usize) -> Result<Vec<String>, FetchError> {
		self.calls
			.lock()
			.unwrap()
			.push((format!("top{}", n), Instant::now()));
		Ok(self.symbols.iter().take(n).cloned().collect())
	}
}

/// Records writes; keys in `rejected` fail at the node.
#[derive(Default)]
pub struct MockDelivery {
	pub writes: WriteLog,
	pub rejected: HashSet<String>,
}

#[async_trait]
impl DeliveryInterface for MockDelivery {
	async fn prepare(&self, _gas_price: u128) -> Result<Address, DeliveryError> {
		Ok(Address([9u8; 20]))
	}

	async fn suggested_gas_price(&self) -> Result<u128, DeliveryError> {
		Ok(1_000_000_000)
	}

	async fn write(
		&self,
		key: &str,
		value: u128,
		_timestamp: u64,
		gas_price: u128,
		_gas_limit: u64,
	) -> Result<SubmissionResult, DeliveryError> {
		if self.rejected.contains(key) {
			return Err(DeliveryError::Submission(format!(
				"replacement transaction underpriced for {}",
				key
			)));
		}
		self.writes.lock().unwrap().push((key.to_string(), value));
		Ok(SubmissionResult {
			transaction_hash: TransactionHash(vec![0xab; 32]),
			recipient: Address([9u8; 20]),
			gas_price,
		})
	}
}

pub fn prices(entries: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
	entries
		.iter()
		.map(|(symbol, price)| (symbol.to_string(), *price))
		.collect()
}

/// Pair settings with a 5s inter-step delay and an 8s period.
pub fn settings(symbols: &[&str], pair_base: Option<&str>) -> FeederSettings {
	FeederSettings {
		name: "test-feeder".to_string(),
		mode: FeedMode::Pair,
		symbols: symbols.iter().map(|s| s.to_string()).collect(),
		pair_base: pair_base.map(str::to_string),
		batch_size: 3,
		foreign_source: None,
		scale_factor: 100_000_000,
		timestamp_source: TimestampSource::Submission,
		inter_step_delay_secs: 5,
		cycle_interval_secs: 8,
		call_timeout_secs: 1,
	}
}
