//! Oracle write delivery for the feeder.
//!
//! This crate turns a [`DerivedUpdate`] into a signed `setValue` transaction
//! on the key-value oracle contract. The gas price is re-estimated and marked
//! up for every single write; if no fresh non-zero estimate is available the
//! write is not attempted.

use async_trait::async_trait;
use feeder_pricing::{GasMarkup, GasQuote};
use feeder_types::{Address, DerivedUpdate, SubmissionResult};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur while pricing or sending an oracle write.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// No usable gas price could be obtained.
	#[error("Gas estimation failed: {0}")]
	Estimation(String),
	/// The node rejected or failed to accept the transaction.
	#[error("Submission failed: {0}")]
	Submission(String),
	/// A node call exceeded the per-call timeout.
	#[error("Node call timed out after {0:?}")]
	Timeout(Duration),
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Node connectivity or consistency failure.
	#[error("Network error: {0}")]
	Network(String),
}

/// Write access to an on-chain key-value oracle.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Checks the node and resolves the oracle contract, deploying it if
	/// needed at `gas_price`. Returns the contract address.
	async fn prepare(&self, gas_price: u128) -> Result<Address, DeliveryError>;

	/// Gas price the node currently suggests, in wei.
	async fn suggested_gas_price(&self) -> Result<u128, DeliveryError>;

	/// Sends `setValue(key, value, timestamp)` with explicit gas parameters.
	async fn write(
		&self,
		key: &str,
		value: u128,
		timestamp: u64,
		gas_price: u128,
		gas_limit: u64,
	) -> Result<SubmissionResult, DeliveryError>;
}

/// Prices and sends oracle writes through a [`DeliveryInterface`].
pub struct DeliveryService {
	provider: Box<dyn DeliveryInterface>,
	gas_limit: u64,
	markup: GasMarkup,
	timeout: Duration,
}

impl DeliveryService {
	pub fn new(
		provider: Box<dyn DeliveryInterface>,
		gas_limit: u64,
		markup: GasMarkup,
		timeout: Duration,
	) -> Self {
		Self {
			provider,
			gas_limit,
			markup,
			timeout,
		}
	}

	/// Resolves the oracle contract before the first cycle.
	pub async fn prepare(&self) -> Result<Address, DeliveryError> {
		let gas_price = self.gas_price().await?;
		let contract = self.provider.prepare(gas_price).await?;
		info!(contract = %contract, "Oracle contract ready");
		Ok(contract)
	}

	/// Current suggested gas price with the markup applied.
	pub async fn gas_price(&self) -> Result<u128, DeliveryError> {
		let base = tokio::time::timeout(self.timeout, self.provider.suggested_gas_price())
			.await
			.map_err(|_| DeliveryError::Timeout(self.timeout))??;

		if base == 0 {
			return Err(DeliveryError::Estimation(
				"node suggested a zero gas price".to_string(),
			));
		}

		let quote = GasQuote::new(base, self.markup);
		let gas_price = quote
			.price()
			.map_err(|e| DeliveryError::Estimation(e.to_string()))?;
		debug!(base, gas_price, markup = %quote.markup.multiplier(), "Priced gas");
		Ok(gas_price)
	}

	/// Writes one update. Never retries.
	pub async fn submit(&self, update: &DerivedUpdate) -> Result<SubmissionResult, DeliveryError> {
		let gas_price = self.gas_price().await?;

		tokio::time::timeout(
			self.timeout,
			self.provider.write(
				&update.key,
				update.scaled_value,
				update.timestamp,
				gas_price,
				self.gas_limit,
			),
		)
		.await
		.map_err(|_| DeliveryError::Timeout(self.timeout))?
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use feeder_types::TransactionHash;
	use rust_decimal::Decimal;
	use std::sync::{Arc, Mutex};

	type WriteLog = Arc<Mutex<Vec<(String, u128, u64, u128, u64)>>>;

	#[derive(Default)]
	struct MockDelivery {
		suggestion: Option<u128>,
		// Suggest a higher price after every write.
		rising: bool,
		slow_write: bool,
		writes: WriteLog,
	}

	#[async_trait]
	impl DeliveryInterface for MockDelivery {
		async fn prepare(&self, _gas_price: u128) -> Result<Address, DeliveryError> {
			Ok(Address([7u8; 20]))
		}

		async fn suggested_gas_price(&self) -> Result<u128, DeliveryError> {
			let base = self
				.suggestion
				.ok_or_else(|| DeliveryError::Estimation("node unavailable".to_string()))?;
			if self.rising {
				Ok(base * (self.writes.lock().unwrap().len() as u128 + 1))
			} else {
				Ok(base)
			}
		}

		async fn write(
			&self,
			key: &str,
			value: u128,
			timestamp: u64,
			gas_price: u128,
			gas_limit: u64,
		) -> Result<SubmissionResult, DeliveryError> {
			if self.slow_write {
				tokio::time::sleep(Duration::from_secs(600)).await;
			}
			self.writes
				.lock()
				.unwrap()
				.push((key.to_string(), value, timestamp, gas_price, gas_limit));
			Ok(SubmissionResult {
				transaction_hash: TransactionHash(vec![1; 32]),
				recipient: Address([7u8; 20]),
				gas_price,
			})
		}
	}

	fn update() -> DerivedUpdate {
		DerivedUpdate {
			key: "CARD/USD".to_string(),
			scaled_value: 5_000_000,
			timestamp: 1_700_000_000,
		}
	}

	fn service(suggestion: Option<u128>, slow_write: bool) -> (DeliveryService, WriteLog) {
		let writes = WriteLog::default();
		let mock = MockDelivery {
			suggestion,
			rising: false,
			slow_write,
			writes: writes.clone(),
		};
		let service = DeliveryService::new(
			Box::new(mock),
			800_725,
			GasMarkup::new(Decimal::new(11, 1)).unwrap(),
			Duration::from_secs(30),
		);
		(service, writes)
	}

	#[tokio::test]
	async fn test_submit_applies_markup_and_gas_limit() {
		let (service, writes) = service(Some(100), false);

		let result = service.submit(&update()).await.unwrap();
		assert_eq!(result.gas_price, 110);
		assert_eq!(
			*writes.lock().unwrap(),
			vec![("CARD/USD".to_string(), 5_000_000, 1_700_000_000, 110, 800_725)]
		);
	}

	#[tokio::test]
	async fn test_estimation_failure_never_writes() {
		for suggestion in [None, Some(0)] {
			let (service, writes) = service(suggestion, false);
			assert!(matches!(
				service.submit(&update()).await,
				Err(DeliveryError::Estimation(_))
			));
			assert!(writes.lock().unwrap().is_empty());
		}
	}

	#[tokio::test]
	async fn test_gas_price_is_recomputed_per_submission() {
		let writes = WriteLog::default();
		let service = DeliveryService::new(
			Box::new(MockDelivery {
				suggestion: Some(100),
				rising: true,
				slow_write: false,
				writes: writes.clone(),
			}),
			800_725,
			GasMarkup::default(),
			Duration::from_secs(30),
		);

		service.submit(&update()).await.unwrap();
		service.submit(&update()).await.unwrap();

		let prices: Vec<u128> = writes.lock().unwrap().iter().map(|w| w.3).collect();
		assert_eq!(prices, vec![110, 220]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_write_times_out() {
		let (service, writes) = service(Some(100), true);

		assert!(matches!(
			service.submit(&update()).await,
			Err(DeliveryError::Timeout(_))
		));
		assert!(writes.lock().unwrap().is_empty());
	}
}
