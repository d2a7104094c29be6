//! Gas price markup.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GasError {
	#[error("Gas markup must be at least 1.0, got {0}")]
	InvalidMarkup(Decimal),
	#[error("Gas price {0} overflows after markup")]
	Overflow(u128),
}

/// Multiplier applied to the node's suggested gas price, never below 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMarkup(Decimal);

impl GasMarkup {
	pub fn new(multiplier: Decimal) -> Result<Self, GasError> {
		if multiplier < Decimal::ONE {
			return Err(GasError::InvalidMarkup(multiplier));
		}
		Ok(Self(multiplier))
	}

	pub fn multiplier(&self) -> Decimal {
		self.0
	}
}

impl Default for GasMarkup {
	fn default() -> Self {
		Self(Decimal::new(11, 1))
	}
}

/// A suggested gas price together with the markup to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQuote {
	pub base_gas_price: u128,
	pub markup: GasMarkup,
}

impl GasQuote {
	pub fn new(base_gas_price: u128, markup: GasMarkup) -> Self {
		Self {
			base_gas_price,
			markup,
		}
	}

	/// Marked-up gas price in wei.
	pub fn price(&self) -> Result<u128, GasError> {
		price_for(self.base_gas_price, self.markup)
	}
}

/// `floor(base_gas_price * markup)`, computed exactly.
pub fn price_for(base_gas_price: u128, markup: GasMarkup) -> Result<u128, GasError> {
	Decimal::from_u128(base_gas_price)
		.and_then(|base| base.checked_mul(markup.0))
		.and_then(|marked_up| marked_up.floor().to_u128())
		.ok_or(GasError::Overflow(base_gas_price))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn markup(mantissa: i64, scale: u32) -> GasMarkup {
		GasMarkup::new(Decimal::new(mantissa, scale)).unwrap()
	}

	#[test]
	fn test_price_for_legacy_markups() {
		assert_eq!(price_for(100, markup(11, 1)), Ok(110));
		assert_eq!(price_for(100, markup(105, 2)), Ok(105));
		assert_eq!(price_for(101, markup(11, 1)), Ok(111));
	}

	#[test]
	fn test_price_for_rounds_down() {
		// 7 * 1.1 = 7.7
		assert_eq!(price_for(7, markup(11, 1)), Ok(7));
		assert_eq!(price_for(30_000_000_001, markup(11, 1)), Ok(33_000_000_001));
	}

	#[test]
	fn test_zero_suggestion_stays_zero() {
		assert_eq!(GasQuote::new(0, GasMarkup::default()).price(), Ok(0));
	}

	#[test]
	fn test_markup_below_one_is_rejected() {
		assert_eq!(
			GasMarkup::new(Decimal::new(9, 1)),
			Err(GasError::InvalidMarkup(Decimal::new(9, 1)))
		);
		assert!(GasMarkup::new(Decimal::ONE).is_ok());
	}

	#[test]
	fn test_overflow_is_reported() {
		assert_eq!(
			price_for(u128::MAX, markup(11, 1)),
			Err(GasError::Overflow(u128::MAX))
		);
	}
}
