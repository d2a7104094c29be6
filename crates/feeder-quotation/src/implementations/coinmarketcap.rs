//! CoinMarketCap listings API as a market-cap ranking source.

use crate::{base_url, network_error, FetchError, RankingSource};
use async_trait::async_trait;
use feeder_types::{http_url, ConfigSchema, Field, FieldType, Schema};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com/";
const LISTINGS_PATH: &str = "v1/cryptocurrency/listings/latest";

#[derive(Debug, Deserialize)]
struct Listing {
	data: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
	symbol: String,
}

/// Ranks symbols by market capitalisation using the CoinMarketCap pro API.
pub struct CoinMarketCapRanking {
	client: reqwest::Client,
	base_url: String,
	api_key: String,
}

impl CoinMarketCapRanking {
	pub fn new(base: &str, api_key: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url(base),
			api_key: api_key.into(),
		}
	}
}

/// Configuration schema for the CoinMarketCap ranking source.
pub struct CoinMarketCapSchema;

impl ConfigSchema for CoinMarketCapSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), feeder_types::ValidationError> {
		let schema = Schema::new(
			vec![Field::new("api_key", FieldType::String).with_validator(|value| {
				if value.as_str().is_some_and(|key| !key.trim().is_empty()) {
					Ok(())
				} else {
					Err("API key must not be empty".to_string())
				}
			})],
			vec![Field::new("base_url", FieldType::String).with_validator(http_url)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl RankingSource for CoinMarketCapRanking {
	async fn top_symbols(&self, n: usize) -> Result<Vec<String>, FetchError> {
		let url = format!("{}{}", self.base_url, LISTINGS_PATH);
		let limit = n.to_string();
		debug!(limit = n, "Requesting CoinMarketCap listing");

		let response = self
			.client
			.get(&url)
			.query(&[
				("start", "1"),
				("limit", limit.as_str()),
				("convert", "USD"),
				("sort", "market_cap"),
				("sort_dir", "desc"),
			])
			.header("Accepts", "application/json")
			.header("X-CMC_PRO_API_KEY", &self.api_key)
			.send()
			.await
			.map_err(network_error)?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(FetchError::Status {
				status: status.as_u16(),
				message,
			});
		}

		let listing: Listing = response.json().await.map_err(network_error)?;

		Ok(listing
			.data
			.into_iter()
			.map(|entry| entry.symbol.trim().to_uppercase())
			.filter(|symbol| !symbol.is_empty())
			.take(n)
			.collect())
	}
}

/// Builds a CoinMarketCap ranking source from its `[ranking.config]` table.
pub fn create_ranking_source(config: &toml::Value) -> Result<Box<dyn RankingSource>, FetchError> {
	CoinMarketCapSchema
		.validate(config)
		.map_err(|e| FetchError::Configuration(e.to_string()))?;

	let api_key = config
		.get("api_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| FetchError::Configuration("api_key is required".to_string()))?;
	let base = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_BASE_URL);

	Ok(Box::new(CoinMarketCapRanking::new(base, api_key)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{header, method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn test_top_symbols_sends_listing_query() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/v1/cryptocurrency/listings/latest"))
			.and(query_param("start", "1"))
			.and(query_param("limit", "3"))
			.and(query_param("sort", "market_cap"))
			.and(query_param("sort_dir", "desc"))
			.and(header("X-CMC_PRO_API_KEY", "secret"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"status": { "error_code": 0 },
				"data": [
					{ "id": 1, "symbol": "btc" },
					{ "id": 1027, "symbol": "ETH" },
					{ "id": 5426, "symbol": "Sol" }
				]
			})))
			.expect(1)
			.mount(&server)
			.await;

		let ranking = CoinMarketCapRanking::new(&server.uri(), "secret");
		let symbols = ranking.top_symbols(3).await.unwrap();

		assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
	}

	#[tokio::test]
	async fn test_rejected_api_key() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
			.mount(&server)
			.await;

		let ranking = CoinMarketCapRanking::new(&server.uri(), "wrong");
		assert!(matches!(
			ranking.top_symbols(5).await,
			Err(FetchError::Status { status: 401, .. })
		));
	}

	#[test]
	fn test_factory_requires_api_key() {
		let config: toml::Value = toml::from_str("base_url = \"https://example.com\"").unwrap();
		assert!(matches!(
			create_ranking_source(&config),
			Err(FetchError::Configuration(_))
		));
	}
}
