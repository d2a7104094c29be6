//! DIA quotation API.
//!
//! `GET {base_url}v1/quotation/{SYMBOL}` returns DIA's own aggregated price,
//! `GET {base_url}v1/foreignQuotation/{source}/{SYMBOL}` the price a
//! third-party listing (e.g. CoinMarketCap) reports. Both bodies carry
//! `Symbol`, `Price` and an RFC 3339 `Time`.

use crate::{base_url, network_error, FetchError, QuotationSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feeder_types::{http_url, ConfigSchema, Field, FieldType, Quotation, Schema};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.diadata.org/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiaQuotation {
	symbol: String,
	price: f64,
	time: DateTime<Utc>,
}

/// HTTP client for the DIA quotation endpoints.
pub struct DiaQuotationSource {
	client: reqwest::Client,
	base_url: String,
}

impl DiaQuotationSource {
	pub fn new(base: &str) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url(base),
		}
	}

	async fn get(&self, url: String) -> Result<Quotation, FetchError> {
		debug!(url = %url, "Requesting DIA quotation");
		let response = self.client.get(&url).send().await.map_err(network_error)?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(FetchError::Status {
				status: status.as_u16(),
				message,
			});
		}

		let body: DiaQuotation = response.json().await.map_err(network_error)?;
		Ok(Quotation::from_f64(body.symbol, body.price, body.time)?)
	}
}

/// Configuration schema for the DIA source.
pub struct DiaSchema;

impl ConfigSchema for DiaSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), feeder_types::ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("base_url", FieldType::String).with_validator(http_url)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl QuotationSource for DiaQuotationSource {
	async fn fetch(&self, symbol: &str) -> Result<Quotation, FetchError> {
		self.get(format!("{}v1/quotation/{}", self.base_url, symbol.to_uppercase()))
			.await
	}

	async fn fetch_foreign(&self, source: &str, symbol: &str) -> Result<Quotation, FetchError> {
		self.get(format!(
			"{}v1/foreignQuotation/{}/{}",
			self.base_url,
			source,
			symbol.to_uppercase()
		))
		.await
	}
}

/// Builds a DIA source from its `[quotation.config]` table.
pub fn create_quotation_source(
	config: &toml::Value,
) -> Result<Box<dyn QuotationSource>, FetchError> {
	DiaSchema
		.validate(config)
		.map_err(|e| FetchError::Configuration(e.to_string()))?;

	let base = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_BASE_URL);

	Ok(Box::new(DiaQuotationSource::new(base)))
}
