//! Oracle update types.
//!
//! A derived update is the (key, value, timestamp) triple written to the
//! on-chain key-value oracle. Values are fixed-point integers: the price
//! multiplied by a per-deployment scale factor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote currency used for direct updates.
pub const USD: &str = "USD";

/// A fixed-point update ready to be written on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedUpdate {
	/// Oracle key, e.g. "CARD/USD" or "CARD/ETH".
	pub key: String,
	/// Price multiplied by the scale factor.
	pub scaled_value: u128,
	/// Unix seconds.
	pub timestamp: u64,
}

impl fmt::Display for DerivedUpdate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}={}@{}", self.key, self.scaled_value, self.timestamp)
	}
}

/// Which clock stamps an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
	/// Wall-clock time when the update is built.
	#[default]
	Submission,
	/// The upstream observation time of the quotation.
	Observation,
}

/// How the symbols of a cycle are chosen and combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
	/// Static symbol list, each published against USD and optionally
	/// against a common pair base.
	#[default]
	Pair,
	/// Top-N symbols by market capitalisation, fetched every cycle.
	Batch,
}

impl fmt::Display for FeedMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FeedMode::Pair => write!(f, "pair"),
			FeedMode::Batch => write!(f, "batch"),
		}
	}
}

/// Builds the oracle key for a direct quote.
pub fn direct_key(symbol: &str) -> String {
	format!("{}/{}", symbol, USD)
}

/// Builds the oracle key for a ratio quote.
pub fn pair_key(quote: &str, base: &str) -> String {
	format!("{}/{}", quote, base)
}
