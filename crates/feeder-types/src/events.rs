use serde::{Deserialize, Serialize};

use crate::{FeedMode, TransactionHash};

/// Events published by the update engine while it runs cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeederEvent {
	CycleStarted {
		cycle: u64,
		mode: FeedMode,
	},
	UpdateSubmitted {
		cycle: u64,
		key: String,
		scaled_value: u128,
		tx_hash: TransactionHash,
	},
	UpdateFailed {
		cycle: u64,
		key: String,
		reason: String,
	},
	CycleCompleted {
		cycle: u64,
		successes: usize,
		failures: usize,
		interrupted: bool,
	},
}
