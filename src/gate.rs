//! Transmission gate toggled by the controller.
//!
//! The serial monitor owns the only [`Gate`]; the transmitter holds a
//! [`GateWatch`]. State travels over a `watch` channel, so readers always see
//! the latest value and never touch a shared variable directly.

use tokio::sync::watch;

use std::sync::atomic::{AtomicU64, Ordering};

pub use crate::protocol::GateState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
	pub state: GateState,
	/// Number of Locked -> Unlocked transitions so far. The controller locks
	/// while it moves and unlocks when done, so a new release after a send
	/// is taken as completion.
	pub releases: u64,
}

pub struct Gate {
	tx: watch::Sender<GateStatus>,
}

#[derive(Clone)]
pub struct GateWatch {
	rx: watch::Receiver<GateStatus>,
}

impl Gate {
	pub fn new() -> (Self, GateWatch) {
		let (tx, rx) = watch::channel(GateStatus {
			state: GateState::Unlocked,
			releases: 0,
		});
		(Self { tx }, GateWatch { rx })
	}

	/// Applies a state reported by the controller. Returns `true` when the
	/// state actually changed.
	pub fn set(&self, state: GateState) -> bool {
		self.tx.send_if_modified(|status| {
			if status.state == state {
				return false;
			}
			if status.state == GateState::Locked {
				status.releases += 1;
			}
			status.state = state;
			true
		})
	}

	pub fn watch(&self) -> GateWatch {
		GateWatch {
			rx: self.tx.subscribe(),
		}
	}
}

impl GateWatch {
	pub fn status(&self) -> GateStatus {
		*self.rx.borrow()
	}

	pub fn state(&self) -> GateState {
		self.status().state
	}

	pub fn is_locked(&self) -> bool {
		self.state() == GateState::Locked
	}
}

/// Counters for what the monitor saw on the wire.
#[derive(Debug, Default)]
pub struct InboundStats {
	accepted: AtomicU64,
	discarded: AtomicU64,
	unknown: AtomicU64,
}

impl InboundStats {
	pub fn record_accepted(&self) {
		self.accepted.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_discarded(&self) {
		self.discarded.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_unknown(&self) {
		self.unknown.fetch_add(1, Ordering::Relaxed);
	}

	pub fn accepted(&self) -> u64 {
		self.accepted.load(Ordering::Relaxed)
	}

	pub fn discarded(&self) -> u64 {
		self.discarded.load(Ordering::Relaxed)
	}

	pub fn unknown(&self) -> u64 {
		self.unknown.load(Ordering::Relaxed)
	}
}
