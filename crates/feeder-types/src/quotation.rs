//! Price observation types.
//!
//! A quotation is a single point-in-time price for an asset as reported by an
//! upstream price source. Quotations are immutable once produced and are
//! consumed at most once per update cycle.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when an upstream price cannot be represented as a quotation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuotationError {
	/// The upstream reported NaN or an infinite price.
	#[error("Non-finite price for {symbol}")]
	NonFinite { symbol: String },
	/// The upstream reported a negative price.
	#[error("Negative price {price} for {symbol}")]
	Negative { symbol: String, price: Decimal },
}

/// A single price observation for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
	/// Upper-cased asset symbol, e.g. "CARD".
	pub symbol: String,
	/// Price in USD.
	pub price: Decimal,
	/// When the upstream observed the price.
	pub observed_at: DateTime<Utc>,
}

impl Quotation {
	/// Creates a quotation from an exact decimal price.
	pub fn new(
		symbol: impl Into<String>,
		price: Decimal,
		observed_at: DateTime<Utc>,
	) -> Result<Self, QuotationError> {
		let symbol = symbol.into().to_uppercase();
		if price.is_sign_negative() && !price.is_zero() {
			return Err(QuotationError::Negative { symbol, price });
		}
		Ok(Self {
			symbol,
			price,
			observed_at,
		})
	}

	/// Creates a quotation from a JSON-style floating point price.
	///
	/// The float is converted to the shortest decimal that round-trips, so
	/// `0.05` becomes exactly `0.05` rather than its binary approximation.
	pub fn from_f64(
		symbol: impl Into<String>,
		price: f64,
		observed_at: DateTime<Utc>,
	) -> Result<Self, QuotationError> {
		let symbol = symbol.into();
		if !price.is_finite() {
			return Err(QuotationError::NonFinite {
				symbol: symbol.to_uppercase(),
			});
		}
		let price = Decimal::from_f64(price).ok_or_else(|| QuotationError::NonFinite {
			symbol: symbol.to_uppercase(),
		})?;
		Self::new(symbol, price, observed_at)
	}

	/// Observation time as unix seconds, clamped at zero.
	pub fn observed_unix(&self) -> u64 {
		self.observed_at.timestamp().max(0) as u64
	}
}
