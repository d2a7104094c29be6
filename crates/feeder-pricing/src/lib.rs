//! Price combination and gas pricing.
//!
//! Everything in this crate is pure: quotations in, fixed-point updates out.
//! All arithmetic is exact decimal arithmetic so that the published integer
//! never depends on binary floating point rounding.

use feeder_types::{direct_key, pair_key, DerivedUpdate, Quotation, TimestampSource};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

mod gas;

pub use gas::{price_for, GasError, GasMarkup, GasQuote};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
	/// The base of a ratio has a zero price.
	#[error("Cannot divide {quote} by {base}: base price is zero")]
	Division { quote: String, base: String },
	/// The price cannot be published: zero, negative, or otherwise unusable.
	#[error("Invalid price {price} for {key}")]
	InvalidPrice { key: String, price: Decimal },
	/// The scaled price does not fit the on-chain value type.
	#[error("Scaled value overflow for {0}")]
	Overflow(String),
}

/// Fixed-point multiplier applied to every published price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFactor(u64);

impl ScaleFactor {
	pub fn new(factor: u64) -> Self {
		Self(factor)
	}

	pub fn get(&self) -> u64 {
		self.0
	}

	/// Scales `price` and rounds half away from zero.
	pub fn apply(&self, key: &str, price: Decimal) -> Result<u128, PriceError> {
		if price.is_sign_negative() && !price.is_zero() {
			return Err(PriceError::InvalidPrice {
				key: key.to_string(),
				price,
			});
		}

		price
			.checked_mul(Decimal::from(self.0))
			.map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
			.and_then(|rounded| rounded.to_u128())
			.ok_or_else(|| PriceError::Overflow(key.to_string()))
	}
}

/// A zero upstream price is a glitch, never a value worth publishing.
fn require_positive(key: &str, quotation: &Quotation) -> Result<(), PriceError> {
	if quotation.price.is_zero() {
		return Err(PriceError::InvalidPrice {
			key: key.to_string(),
			price: quotation.price,
		});
	}
	Ok(())
}

/// Publishes `quotation` against USD, e.g. `CARD/USD`.
pub fn direct(
	quotation: &Quotation,
	scale: ScaleFactor,
	timestamp: u64,
) -> Result<DerivedUpdate, PriceError> {
	let key = direct_key(&quotation.symbol);
	require_positive(&key, quotation)?;
	let scaled_value = scale.apply(&key, quotation.price)?;

	Ok(DerivedUpdate {
		key,
		scaled_value,
		timestamp,
	})
}

/// Publishes the ratio of `quote` to `base`, e.g. `CARD/ETH`.
pub fn pair(
	quote: &Quotation,
	base: &Quotation,
	scale: ScaleFactor,
	timestamp: u64,
) -> Result<DerivedUpdate, PriceError> {
	let key = pair_key(&quote.symbol, &base.symbol);

	if base.price.is_zero() {
		return Err(PriceError::Division {
			quote: quote.symbol.clone(),
			base: base.symbol.clone(),
		});
	}
	require_positive(&key, quote)?;

	let ratio = quote
		.price
		.checked_div(base.price)
		.ok_or_else(|| PriceError::Overflow(key.clone()))?;
	let scaled_value = scale.apply(&key, ratio)?;

	Ok(DerivedUpdate {
		key,
		scaled_value,
		timestamp,
	})
}

/// Picks the timestamp for an update built from `quotations`.
///
/// With [`TimestampSource::Observation`] the oldest observation wins, so a
/// ratio is never stamped fresher than its staler input.
pub fn update_timestamp(source: TimestampSource, quotations: &[&Quotation], now: u64) -> u64 {
	match source {
		TimestampSource::Submission => now,
		TimestampSource::Observation => quotations
			.iter()
			.map(|q| q.observed_unix())
			.min()
			.unwrap_or(now),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};

	const SCALE: ScaleFactor = ScaleFactor(100_000_000);

	fn quote(symbol: &str, price: Decimal) -> Quotation {
		Quotation::new(symbol, price, Utc::now()).unwrap()
	}

	#[test]
	fn test_direct_card_usd() {
		let card = quote("CARD", Decimal::new(5, 2));
		let update = direct(&card, SCALE, 1_700_000_000).unwrap();

		assert_eq!(update.key, "CARD/USD");
		assert_eq!(update.scaled_value, 5_000_000);
		assert_eq!(update.timestamp, 1_700_000_000);
	}

	#[test]
	fn test_pair_card_eth() {
		let card = quote("CARD", Decimal::new(5, 2));
		let eth = quote("ETH", Decimal::from(2000));
		let update = pair(&card, &eth, SCALE, 0).unwrap();

		assert_eq!(update.key, "CARD/ETH");
		assert_eq!(update.scaled_value, 2_500);
	}

	#[test]
	fn test_pair_with_zero_base_fails() {
		let card = quote("CARD", Decimal::new(5, 2));
		let eth = quote("ETH", Decimal::ZERO);

		assert!(matches!(
			pair(&card, &eth, SCALE, 0),
			Err(PriceError::Division { .. })
		));
	}

	#[test]
	fn test_zero_quote_is_never_published() {
		let card = quote("CARD", Decimal::ZERO);
		let eth = quote("ETH", Decimal::from(2000));

		assert!(matches!(
			direct(&card, SCALE, 0),
			Err(PriceError::InvalidPrice { key, .. }) if key == "CARD/USD"
		));
		assert!(matches!(
			pair(&card, &eth, SCALE, 0),
			Err(PriceError::InvalidPrice { key, .. }) if key == "CARD/ETH"
		));
	}

	#[test]
	fn test_pair_is_reciprocal_up_to_rounding() {
		let a = quote("AAA", Decimal::new(123_456, 4));
		let b = quote("BBB", Decimal::new(789, 1));
		let s = Decimal::from(SCALE.get());

		let ab = Decimal::from(pair(&a, &b, SCALE, 0).unwrap().scaled_value) / s;
		let ba = Decimal::from(pair(&b, &a, SCALE, 0).unwrap().scaled_value) / s;

		let product = ab * ba;
		assert!((product - Decimal::ONE).abs() < Decimal::new(1, 6));
		assert_ne!(ab, ba);

		let same = quote("CCC", Decimal::new(789, 1));
		assert_eq!(
			pair(&b, &same, SCALE, 0).unwrap().scaled_value,
			pair(&same, &b, SCALE, 0).unwrap().scaled_value
		);
	}

	#[test]
	fn test_scaling_rounds_half_away_from_zero() {
		let scale = ScaleFactor::new(100);
		assert_eq!(scale.apply("X", Decimal::new(12_345, 4)).unwrap(), 123);
		assert_eq!(scale.apply("X", Decimal::new(1_235, 3)).unwrap(), 124);
		assert_eq!(scale.apply("X", Decimal::new(1_234, 3)).unwrap(), 123);
	}

	#[test]
	fn test_scaled_value_reproduces_price() {
		let price = Decimal::new(987_654_321_123, 9);
		let scaled = SCALE.apply("X", price).unwrap();
		let restored = Decimal::from(scaled) / Decimal::from(SCALE.get());

		assert!((restored - price).abs() <= Decimal::ONE / Decimal::from(SCALE.get()));
	}

	#[test]
	fn test_negative_price_is_rejected() {
		assert!(matches!(
			SCALE.apply("X", Decimal::new(-1, 0)),
			Err(PriceError::InvalidPrice { .. })
		));
	}

	#[test]
	fn test_timestamp_selection() {
		let early = Quotation::new(
			"A",
			Decimal::ONE,
			Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
		)
		.unwrap();
		let late = Quotation::new(
			"B",
			Decimal::ONE,
			Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap(),
		)
		.unwrap();

		assert_eq!(
			update_timestamp(TimestampSource::Submission, &[&early, &late], 42),
			42
		);
		assert_eq!(
			update_timestamp(TimestampSource::Observation, &[&late, &early], 42),
			early.observed_unix()
		);
	}
}
