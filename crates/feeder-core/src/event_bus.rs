//! Broadcast bus for feeder events.

use feeder_types::FeederEvent;
use tokio::sync::broadcast;

/// Fan-out channel for [`FeederEvent`]s.
///
/// Publishing never blocks the engine; slow subscribers lag and lose the
/// oldest events instead.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<FeederEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<FeederEvent> {
		self.sender.subscribe()
	}

	/// Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: FeederEvent,
	) -> Result<(), broadcast::error::SendError<FeederEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}
