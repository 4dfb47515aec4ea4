//! Network reachability as reported by the platform.

use serde::{Deserialize, Serialize};

/// A reachability reading from the platform's network monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
	/// Whether a network interface is connected.
	pub connected: bool,
	/// Whether the internet is reachable, if the platform could tell.
	pub internet_reachable: Option<bool>,
}

impl NetworkStatus {
	/// Returns true when syncing is worth attempting.
	///
	/// Unknown reachability falls back to the interface state.
	pub fn is_online(&self) -> bool {
		match self.internet_reachable {
			Some(reachable) => self.connected && reachable,
			None => self.connected,
		}
	}
}
