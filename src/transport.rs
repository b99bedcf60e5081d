//! Serial link to the arm controller: opening with retries, and the
//! reconnect cycle around the inbound monitor.

use tokio::io::{split, AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use log::{info, warn};
use thiserror::Error;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::gate::{Gate, InboundStats};
use crate::modules::Notification;
use crate::monitor::{run_monitor, MonitorExit};
use crate::settings::SerialSettings;
use crate::transmitter::WriterSlot;

#[derive(Debug, Error)]
pub enum LinkError {
	#[error("serial port could not be opened after {attempts} attempts")]
	Exhausted {
		attempts: u32,
		#[source]
		source: io::Error,
	},
	#[error("connection attempt cancelled by shutdown")]
	Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub initial: Duration,
	pub max: Duration,
}

impl RetryPolicy {
	pub fn from_settings(settings: &SerialSettings) -> Self {
		Self {
			attempts: settings.connect_attempts.max(1),
			initial: settings.backoff_initial(),
			max: settings.backoff_max(),
		}
	}

	fn delays(&self) -> impl Iterator<Item = Duration> {
		let max = self.max;
		std::iter::successors(Some(self.initial.min(max)), move |d| Some((*d * 2).min(max)))
	}
}

pub fn open_port(settings: &SerialSettings) -> io::Result<SerialStream> {
	let stream = tokio_serial::new(settings.port.as_str(), settings.baud).open_native_async()?;
	Ok(stream)
}

/// Calls `open` until it succeeds, sleeping with exponential backoff between
/// attempts. Shutdown interrupts the wait.
pub async fn connect<S, F>(
	open: &mut F,
	policy: &RetryPolicy,
	shutdown: &mut watch::Receiver<bool>,
) -> Result<S, LinkError>
where
	F: FnMut() -> io::Result<S>,
{
	let mut delays = policy.delays();
	let mut attempt = 0;
	loop {
		if *shutdown.borrow() {
			return Err(LinkError::Cancelled);
		}
		attempt += 1;
		let err = match open() {
			Ok(stream) => return Ok(stream),
			Err(err) => err,
		};
		if attempt >= policy.attempts {
			return Err(LinkError::Exhausted {
				attempts: attempt,
				source: err,
			});
		}
		let delay = delays.next().unwrap_or(policy.max);
		warn!(
			"opening serial port failed ({}), attempt {}/{}, retrying in {:?}",
			err, attempt, policy.attempts, delay
		);
		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown.changed() => return Err(LinkError::Cancelled),
		}
	}
}

/// Owns the serial connection for the session. The write half is lent to
/// the transmitter through `writer`; when the controller goes away the slot
/// is emptied and the port is reopened.
pub async fn run_link<S, F>(
	mut open: F,
	policy: RetryPolicy,
	first: S,
	writer: WriterSlot<WriteHalf<S>>,
	gate: Gate,
	notes: mpsc::UnboundedSender<Notification>,
	stats: Arc<InboundStats>,
	mut shutdown: watch::Receiver<bool>,
) -> Result<(), LinkError>
where
	S: AsyncRead + AsyncWrite + Unpin,
	F: FnMut() -> io::Result<S>,
{
	let mut stream = first;
	loop {
		let (reader, write_half) = split(stream);
		*writer.lock().await = Some(write_half);

		let exit = run_monitor(reader, &gate, &notes, &stats, &mut shutdown).await;
		*writer.lock().await = None;

		match exit {
			Ok(MonitorExit::Shutdown) => return Ok(()),
			Ok(MonitorExit::Eof) => warn!("controller closed the serial link"),
			Err(err) => warn!("serial read failed: {}", err),
		}

		stream = match connect(&mut open, &policy, &mut shutdown).await {
			Ok(stream) => stream,
			Err(LinkError::Cancelled) => return Ok(()),
			Err(err) => return Err(err),
		};
		info!("serial link re-established");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gate::GateState;
	use crate::transmitter::writer_slot;

	use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

	fn quick(attempts: u32) -> RetryPolicy {
		RetryPolicy {
			attempts,
			initial: Duration::from_millis(1),
			max: Duration::from_millis(4),
		}
	}

	fn refused() -> io::Error {
		io::Error::new(io::ErrorKind::NotFound, "no such port")
	}

	#[test]
	fn backoff_doubles_up_to_the_cap() {
		let policy = RetryPolicy {
			attempts: 6,
			initial: Duration::from_millis(500),
			max: Duration::from_millis(3000),
		};
		let delays: Vec<_> = policy.delays().take(5).map(|d| d.as_millis()).collect();
		assert_eq!(delays, vec![500, 1000, 2000, 3000, 3000]);
	}

	#[tokio::test]
	async fn retries_until_the_port_opens() {
		let (_stop, mut shutdown) = watch::channel(false);
		let mut calls = 0;
		let mut open = || {
			calls += 1;
			if calls < 3 {
				Err(refused())
			} else {
				Ok(calls)
			}
		};
		assert_eq!(connect(&mut open, &quick(5), &mut shutdown).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn gives_up_after_the_last_attempt() {
		let (_stop, mut shutdown) = watch::channel(false);
		let mut open = || -> io::Result<()> { Err(refused()) };
		match connect(&mut open, &quick(3), &mut shutdown).await {
			Err(LinkError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[tokio::test]
	async fn shutdown_cancels_the_backoff() {
		let (stop, mut shutdown) = watch::channel(false);
		stop.send(true).unwrap();
		let mut open = || -> io::Result<()> { Err(refused()) };
		assert!(matches!(
			connect(&mut open, &quick(3), &mut shutdown).await,
			Err(LinkError::Cancelled)
		));
	}

	#[tokio::test]
	async fn reconnects_after_the_controller_drops() {
		let (first_port, first_controller) = tokio::io::duplex(64);
		let (second_port, mut second_controller) = tokio::io::duplex(64);
		let mut spare = Some(second_port);
		let open = move || spare.take().ok_or_else(refused);

		let slot: WriterSlot<WriteHalf<DuplexStream>> = writer_slot();
		let (gate, gate_watch) = Gate::new();
		let (notes, _rx) = mpsc::unbounded_channel();
		let stats = Arc::new(InboundStats::default());
		let (stop, shutdown) = watch::channel(false);

		let link = tokio::spawn(run_link(
			open,
			quick(3),
			first_port,
			slot.clone(),
			gate,
			notes,
			stats,
			shutdown,
		));

		drop(first_controller);
		second_controller.write_all(b"<S1>\n").await.unwrap();
		while !gate_watch.is_locked() {
			tokio::task::yield_now().await;
		}
		assert_eq!(gate_watch.state(), GateState::Locked);

		// the transmitter now writes to the second connection
		slot.lock()
			.await
			.as_mut()
			.unwrap()
			.write_all(b"<abcd>")
			.await
			.unwrap();
		let mut received = [0u8; 6];
		second_controller.read_exact(&mut received).await.unwrap();
		assert_eq!(&received, b"<abcd>");

		stop.send(true).unwrap();
		link.await.unwrap().unwrap();
		assert!(slot.lock().await.is_none());
	}
}
