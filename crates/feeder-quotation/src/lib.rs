//! Upstream price and ranking sources.
//!
//! The update engine only sees two capabilities: "fetch a quotation for a
//! symbol" and, in batch mode, "list the top N symbols by market
//! capitalisation". Both are traits so the HTTP adapters can be swapped for
//! other providers or for mocks. The service wrappers bound every call with
//! the configured per-call timeout.

use async_trait::async_trait;
use feeder_types::{Quotation, QuotationError};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub mod implementations {
	pub mod coinmarketcap;
	pub mod dia;
}

/// Errors raised by quotation and ranking sources.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The upstream answered with a non-success HTTP status.
	#[error("Upstream returned status {status}: {message}")]
	Status { status: u16, message: String },
	/// The request never produced a response.
	#[error("Network error: {0}")]
	Network(String),
	/// The response body did not have the expected shape.
	#[error("Failed to decode response: {0}")]
	Decode(String),
	/// The call exceeded the per-call timeout.
	#[error("Request timed out after {0:?}")]
	Timeout(Duration),
	/// The upstream price cannot be published.
	#[error(transparent)]
	InvalidPrice(#[from] QuotationError),
	/// The upstream answered for a different asset than requested.
	#[error("Requested {requested} but upstream answered for {received}")]
	SymbolMismatch { requested: String, received: String },
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A source of point-in-time asset prices.
#[async_trait]
pub trait QuotationSource: Send + Sync {
	/// Fetches the source's own quotation for `symbol`.
	async fn fetch(&self, symbol: &str) -> Result<Quotation, FetchError>;

	/// Fetches the quotation a named third-party listing reports for `symbol`.
	async fn fetch_foreign(&self, source: &str, symbol: &str) -> Result<Quotation, FetchError>;
}

/// A source of symbols ranked by market capitalisation.
#[async_trait]
pub trait RankingSource: Send + Sync {
	/// Returns at most `n` upper-cased symbols, largest first.
	async fn top_symbols(&self, n: usize) -> Result<Vec<String>, FetchError>;
}

/// Timeout-bounded access to a [`QuotationSource`].
pub struct QuotationService {
	source: Box<dyn QuotationSource>,
	timeout: Duration,
}

impl QuotationService {
	pub fn new(source: Box<dyn QuotationSource>, timeout: Duration) -> Self {
		Self { source, timeout }
	}

	pub async fn fetch(&self, symbol: &str) -> Result<Quotation, FetchError> {
		debug!(symbol, "Fetching quotation");
		let quotation = tokio::time::timeout(self.timeout, self.source.fetch(symbol))
			.await
			.map_err(|_| FetchError::Timeout(self.timeout))??;
		expect_symbol(symbol, quotation)
	}

	pub async fn fetch_foreign(&self, source: &str, symbol: &str) -> Result<Quotation, FetchError> {
		debug!(source, symbol, "Fetching foreign quotation");
		let quotation = tokio::time::timeout(self.timeout, self.source.fetch_foreign(source, symbol))
			.await
			.map_err(|_| FetchError::Timeout(self.timeout))??;
		expect_symbol(symbol, quotation)
	}
}

/// The oracle key is derived from the quotation, so it must name the
/// requested asset.
fn expect_symbol(requested: &str, quotation: Quotation) -> Result<Quotation, FetchError> {
	if quotation.symbol.eq_ignore_ascii_case(requested) {
		Ok(quotation)
	} else {
		Err(FetchError::SymbolMismatch {
			requested: requested.to_string(),
			received: quotation.symbol,
		})
	}
}

/// Timeout-bounded access to a [`RankingSource`].
pub struct RankingService {
	source: Box<dyn RankingSource>,
	timeout: Duration,
}

impl RankingService {
	pub fn new(source: Box<dyn RankingSource>, timeout: Duration) -> Self {
		Self { source, timeout }
	}

	pub async fn top_symbols(&self, n: usize) -> Result<Vec<String>, FetchError> {
		debug!(n, "Fetching ranking");
		tokio::time::timeout(self.timeout, self.source.top_symbols(n))
			.await
			.map_err(|_| FetchError::Timeout(self.timeout))?
	}
}

/// Maps a reqwest failure onto the fetch error taxonomy.
pub(crate) fn network_error(err: reqwest::Error) -> FetchError {
	if err.is_decode() {
		FetchError::Decode(err.to_string())
	} else {
		FetchError::Network(err.to_string())
	}
}

/// Normalises a configured base URL so paths can be appended directly.
pub(crate) fn base_url(raw: &str) -> String {
	if raw.ends_with('/') {
		raw.to_string()
	} else {
		format!("{}/", raw)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	struct SlowSource;

	#[async_trait]
	impl QuotationSource for SlowSource {
		async fn fetch(&self, symbol: &str) -> Result<Quotation, FetchError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(Quotation::from_f64(symbol, 1.0, Utc::now())?)
		}

		async fn fetch_foreign(&self, _source: &str, symbol: &str) -> Result<Quotation, FetchError> {
			self.fetch(symbol).await
		}
	}

	/// Answers every request with a wrapped-token quotation.
	struct WrappedSource;

	#[async_trait]
	impl QuotationSource for WrappedSource {
		async fn fetch(&self, symbol: &str) -> Result<Quotation, FetchError> {
			Ok(Quotation::from_f64(format!("W{}", symbol), 1.0, Utc::now())?)
		}

		async fn fetch_foreign(&self, _source: &str, symbol: &str) -> Result<Quotation, FetchError> {
			Ok(Quotation::from_f64(symbol.to_lowercase(), 1.0, Utc::now())?)
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_service_bounds_calls_with_timeout() {
		let service = QuotationService::new(Box::new(SlowSource), Duration::from_secs(5));

		let err = service.fetch("ETH").await.unwrap_err();
		assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_secs(5)));
	}

	#[tokio::test]
	async fn test_quotation_for_other_symbol_is_rejected() {
		let service = QuotationService::new(Box::new(WrappedSource), Duration::from_secs(5));

		let err = service.fetch("ETH").await.unwrap_err();
		assert!(matches!(
			err,
			FetchError::SymbolMismatch { requested, received } if requested == "ETH" && received == "WETH"
		));

		// Case differences alone are not a mismatch.
		let quotation = service.fetch_foreign("CoinMarketCap", "btc").await.unwrap();
		assert_eq!(quotation.symbol, "BTC");
	}

	#[test]
	fn test_base_url_gets_trailing_slash() {
		assert_eq!(base_url("http://localhost:1234"), "http://localhost:1234/");
		assert_eq!(base_url("https://api.diadata.org/"), "https://api.diadata.org/");
	}
}
