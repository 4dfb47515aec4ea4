//! Event bus for broadcasting engine events.
//!
//! Wraps a `tokio::sync::broadcast` channel so any number of listeners can
//! follow order lifecycle events. Slow listeners lose the oldest events
//! instead of blocking the engine.

use orderdesk_types::OrderEvent;
use tokio::sync::broadcast;

/// Broadcast channel for [`OrderEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	/// Creates a new event bus holding up to `capacity` unread events per listener.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to all events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to every current subscriber.
	///
	/// Fails only when nobody is listening, which callers are free to ignore.
	pub fn publish(
		&self,
		event: OrderEvent,
	) -> Result<(), Box<broadcast::error::SendError<OrderEvent>>> {
		self.sender.send(event).map(|_| ()).map_err(Box::new)
	}
}
