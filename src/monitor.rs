use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use log::{debug, info, warn};

use std::io;

use crate::gate::{Gate, InboundStats};
use crate::modules::Notification;
use crate::protocol::{parse_line, Inbound};

/// Longest controller line kept, newline included. Anything longer is noise.
pub const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
	Shutdown,
	Eof,
}

/// Reads controller lines until shutdown or end of stream, applying each to
/// the gate and forwarding reports to the display.
pub async fn run_monitor<R: AsyncRead + Unpin>(
	reader: R,
	gate: &Gate,
	notes: &mpsc::UnboundedSender<Notification>,
	stats: &InboundStats,
	shutdown: &mut watch::Receiver<bool>,
) -> io::Result<MonitorExit> {
	let mut reader = BufReader::new(reader);
	let mut buf = Vec::new();
	// Set while dropping the rest of an overlong line.
	let mut overlong = false;
	loop {
		if *shutdown.borrow() {
			return Ok(MonitorExit::Shutdown);
		}
		let mut bounded = (&mut reader).take((MAX_LINE_LEN - buf.len()) as u64);
		// read_until keeps partial data in `buf`, so losing the race to
		// shutdown drops nothing that matters.
		tokio::select! {
			read = bounded.read_until(b'\n', &mut buf) => {
				if read? == 0 {
					return Ok(MonitorExit::Eof);
				}
				let complete = buf.last() == Some(&b'\n');
				if overlong {
					overlong = !complete;
					buf.clear();
				} else if !complete && buf.len() >= MAX_LINE_LEN {
					warn!("discarding controller line longer than {} bytes", MAX_LINE_LEN);
					stats.record_discarded();
					overlong = true;
					buf.clear();
				} else {
					let line = String::from_utf8_lossy(&buf).into_owned();
					buf.clear();
					apply_line(&line, gate, notes, stats);
				}
			}
			_ = shutdown.changed() => {
				return Ok(MonitorExit::Shutdown);
			}
		}
	}
}

pub fn apply_line(
	line: &str,
	gate: &Gate,
	notes: &mpsc::UnboundedSender<Notification>,
	stats: &InboundStats,
) -> Option<Inbound> {
	let message = match parse_line(line) {
		Some(message) => message,
		None => {
			stats.record_discarded();
			return None;
		}
	};

	match &message {
		Inbound::Gate(state) => {
			stats.record_accepted();
			if gate.set(*state) {
				info!("gate {}", state);
			}
			let _ = notes.send(Notification::GateChanged(*state));
		}
		Inbound::Point(text) => {
			stats.record_accepted();
			let _ = notes.send(Notification::PointReport(text.clone()));
		}
		Inbound::Unknown(command) => {
			stats.record_unknown();
			debug!("ignoring unknown controller command {:?}", command);
		}
	}
	Some(message)
}
