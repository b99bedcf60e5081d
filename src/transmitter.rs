use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;

use log::debug;
use thiserror::Error;

use std::sync::Arc;
use std::time::Duration;

use crate::gate::GateWatch;
use crate::protocol::{SerialFrame, TargetCommand};
use crate::settings::{OutputSettings, PacingMode};

/// Write half of the serial port, swapped out by the link on reconnect.
pub type WriterSlot<W> = Arc<Mutex<Option<W>>>;

pub fn writer_slot<W>() -> WriterSlot<W> {
	Arc::new(Mutex::new(None))
}

#[derive(Debug, Error)]
pub enum SendError {
	#[error("temporarily locked by the controller")]
	GateLocked,
	#[error("serial link is down")]
	Disconnected,
	#[error("controller did not report completion within {0:?}")]
	AckTimeout(Duration),
	#[error("serial write failed: {0}")]
	Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
	Sent(SerialFrame),
	WarmingUp,
	Quiescent,
}

/// How long the arm is left alone after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
	Fixed(Duration),
	Acknowledged { timeout: Duration },
}

impl Pacing {
	pub fn from_settings(settings: &OutputSettings) -> Self {
		match settings.pacing {
			PacingMode::Fixed => Pacing::Fixed(Duration::from_secs(settings.quiescence_secs)),
			PacingMode::Ack => Pacing::Acknowledged {
				timeout: Duration::from_secs(settings.ack_timeout_secs),
			},
		}
	}
}

#[derive(Debug, Clone, Copy)]
enum InFlight {
	Idle,
	Quiet { until: Instant },
	Awaiting { releases: u64, deadline: Instant },
}

/// Frames target commands onto the serial port, at most one in flight.
pub struct Transmitter<W> {
	writer: WriterSlot<W>,
	gate: GateWatch,
	warmup_frames: u64,
	pacing: Pacing,
	in_flight: InFlight,
}

impl<W: AsyncWrite + Unpin> Transmitter<W> {
	pub fn new(writer: WriterSlot<W>, gate: GateWatch, warmup_frames: u64, pacing: Pacing) -> Self {
		Self {
			writer,
			gate,
			warmup_frames,
			pacing,
			in_flight: InFlight::Idle,
		}
	}

	/// Whether `frame_index` still falls inside the camera warm-up.
	pub fn warming_up(&self, frame_index: u64) -> bool {
		frame_index <= self.warmup_frames
	}

	pub async fn send(
		&mut self,
		command: &TargetCommand,
		frame_index: u64,
	) -> Result<SendOutcome, SendError> {
		if self.warming_up(frame_index) {
			return Ok(SendOutcome::WarmingUp);
		}
		if self.busy()? {
			return Ok(SendOutcome::Quiescent);
		}
		if self.gate.is_locked() {
			return Err(SendError::GateLocked);
		}

		let frame = SerialFrame::encode(command);
		{
			// The lock is held for the whole frame so a reconnect can never
			// swap the port out halfway through it.
			let mut slot = self.writer.lock().await;
			let writer = slot.as_mut().ok_or(SendError::Disconnected)?;
			writer.write_all(frame.as_bytes()).await?;
			writer.flush().await?;
		}
		debug!("sent frame {:?}", frame.as_bytes());

		let now = Instant::now();
		self.in_flight = match self.pacing {
			Pacing::Fixed(quiet) => InFlight::Quiet { until: now + quiet },
			Pacing::Acknowledged { timeout } => InFlight::Awaiting {
				releases: self.gate.status().releases,
				deadline: now + timeout,
			},
		};
		Ok(SendOutcome::Sent(frame))
	}

	/// Whether the previous command is still considered in flight. An expired
	/// acknowledgement wait is reported once and then cleared.
	fn busy(&mut self) -> Result<bool, SendError> {
		let now = Instant::now();
		match self.in_flight {
			InFlight::Idle => Ok(false),
			InFlight::Quiet { until } => {
				if now < until {
					return Ok(true);
				}
				self.in_flight = InFlight::Idle;
				Ok(false)
			}
			InFlight::Awaiting { releases, deadline } => {
				if self.gate.status().releases > releases {
					self.in_flight = InFlight::Idle;
					return Ok(false);
				}
				if now < deadline {
					return Ok(true);
				}
				self.in_flight = InFlight::Idle;
				match self.pacing {
					Pacing::Acknowledged { timeout } => Err(SendError::AckTimeout(timeout)),
					Pacing::Fixed(_) => Ok(false),
				}
			}
		}
	}
}
