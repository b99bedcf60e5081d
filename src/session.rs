use anyhow::{Context, Result};
use log::{info, warn};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use std::future::Future;
use std::io;
use std::sync::Arc;

use crate::gate::{Gate, InboundStats};
use crate::pipeline::Pipeline;
use crate::settings::Settings;
use crate::transmitter::{writer_slot, Pacing, Transmitter};
use crate::transport::{self, RetryPolicy};

/// Opens the controller link, then runs the serial link task and the
/// processing loop until Ctrl-C, the display closing, or a fatal error.
pub async fn run(settings: Settings) -> Result<()> {
	let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

	let serial = settings.serial.clone();
	let mut open = move || transport::open_port(&serial);
	let policy = RetryPolicy::from_settings(&settings.serial);

	let first = transport::connect(&mut open, &policy, &mut shutdown_rx)
		.await
		.with_context(|| format!("Error initializing serial port {}", settings.serial.port))?;
	info!("serial port {} open at {} baud", settings.serial.port, settings.serial.baud);

	let (gate, gate_watch) = Gate::new();
	let slot = writer_slot();
	let (notes_tx, notes_rx) = mpsc::unbounded_channel();
	let stats = Arc::new(InboundStats::default());

	let mut link = tokio::spawn(transport::run_link(
		open,
		policy,
		first,
		slot.clone(),
		gate,
		notes_tx,
		stats.clone(),
		shutdown_rx.clone(),
	));

	let transmitter = Transmitter::new(
		slot,
		gate_watch,
		settings.output.warmup_frames,
		Pacing::from_settings(&settings.output),
	);
	let handle = Handle::current();
	let shutdown = shutdown_rx.clone();
	let mut processing = tokio::task::spawn_blocking(move || {
		let pipeline = Pipeline::from_settings(&settings, transmitter, notes_rx)?;
		pipeline.run(&handle, &shutdown)
	});

	let mut processing_done = None;
	let mut link_done = None;
	tokio::select! {
		res = &mut processing => processing_done = Some(res),
		res = &mut link => link_done = Some(res),
		() = interrupted(tokio::signal::ctrl_c()) => info!("interrupt received"),
	}
	let _ = shutdown_tx.send(true);

	let processing_done = match processing_done {
		Some(res) => res,
		None => processing.await,
	};
	let link_done = match link_done {
		Some(res) => res,
		None => link.await,
	};

	info!(
		"controller lines: {} accepted, {} discarded, {} unknown commands",
		stats.accepted(),
		stats.discarded(),
		stats.unknown()
	);

	processing_done.context("processing thread panicked")??;
	link_done.context("serial link task panicked")??;
	Ok(())
}

/// Resolves when `signal` fires. If the handler could not be installed it
/// never resolves, leaving the session to end through the display or the
/// serial link.
async fn interrupted<F>(signal: F)
where
	F: Future<Output = io::Result<()>>,
{
	if let Err(err) = signal.await {
		warn!("unable to listen for Ctrl-C: {}", err);
		std::future::pending::<()>().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::time::Duration;

	#[tokio::test(start_paused = true)]
	async fn missing_signal_handler_does_not_stop_the_session() {
		let failed = async { Err(io::Error::new(io::ErrorKind::Unsupported, "no signals")) };
		let waited = tokio::time::timeout(Duration::from_secs(3600), interrupted(failed)).await;
		assert!(waited.is_err());
	}

	#[tokio::test]
	async fn signal_ends_the_wait() {
		interrupted(async { Ok(()) }).await;
	}
}
