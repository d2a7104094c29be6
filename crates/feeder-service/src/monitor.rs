//! Cumulative totals over the engine's event stream.

use feeder_types::FeederEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventTotals {
	pub cycles: u64,
	pub submitted: u64,
	pub failed: u64,
}

impl EventTotals {
	pub fn apply(&mut self, event: &FeederEvent) {
		match event {
			FeederEvent::CycleStarted { .. } => {}
			FeederEvent::UpdateSubmitted { .. } => self.submitted += 1,
			FeederEvent::UpdateFailed { .. } => self.failed += 1,
			FeederEvent::CycleCompleted { .. } => self.cycles += 1,
		}
	}
}

/// Folds events into [`EventTotals`] until the bus closes, logging the
/// running totals after every cycle.
pub fn spawn_totals_logger(mut events: broadcast::Receiver<FeederEvent>) -> JoinHandle<EventTotals> {
	tokio::spawn(async move {
		let mut totals = EventTotals::default();
		loop {
			match events.recv().await {
				Ok(event) => {
					totals.apply(&event);
					if let FeederEvent::CycleCompleted { cycle, .. } = event {
						info!(
							cycle,
							total_cycles = totals.cycles,
							total_submitted = totals.submitted,
							total_failed = totals.failed,
							"Running totals"
						);
					}
				}
				Err(RecvError::Lagged(skipped)) => {
					warn!(skipped, "Totals logger lagged behind the event bus");
				}
				Err(RecvError::Closed) => break,
			}
		}
		totals
	})
}
