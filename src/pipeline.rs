//! The processing loop: frame in, at most one command out per cycle.

use tokio::io::AsyncWrite;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use log::{debug, error, info};

use crate::kinematics::ArmGeometry;
use crate::modules::filter::{ContourArea, Coverage};
use crate::modules::input::CameraInput;
use crate::modules::output::{DisplayOutput, LogOutput};
use crate::modules::threshold::BinaryThreshold;
use crate::modules::{Frame, InputModule, Notification, OutputModule, VisionError};
use crate::protocol::TargetCommand;
use crate::select::{self, TargetSelector};
use crate::settings::Settings;
use crate::shape::{DetectedShape, ShapeClassifier};
use crate::transmitter::{SendError, SendOutcome, Transmitter};

pub struct Pipeline<W> {
	input: Box<dyn InputModule>,
	classifier: ShapeClassifier,
	selector: Box<dyn TargetSelector>,
	arm: ArmGeometry,
	transmitter: Transmitter<W>,
	output_modules: Vec<Box<dyn OutputModule>>,
	notes: mpsc::UnboundedReceiver<Notification>,
	frames: u64,
}

impl<W: AsyncWrite + Unpin> Pipeline<W> {
	pub fn new(
		input: Box<dyn InputModule>,
		classifier: ShapeClassifier,
		selector: Box<dyn TargetSelector>,
		arm: ArmGeometry,
		transmitter: Transmitter<W>,
		notes: mpsc::UnboundedReceiver<Notification>,
	) -> Self {
		Self {
			input,
			classifier,
			selector,
			arm,
			transmitter,
			output_modules: Vec::new(),
			notes,
			frames: 0,
		}
	}

	/// Camera, threshold, filters and outputs as configured in `vset.toml`.
	pub fn from_settings(
		settings: &Settings,
		transmitter: Transmitter<W>,
		notes: mpsc::UnboundedReceiver<Notification>,
	) -> Result<Self, VisionError> {
		let input = CameraInput::new(&settings.input)?;

		let classifier = ShapeClassifier::new(Box::new(BinaryThreshold::new(&settings.threshold)))
			.with_filter(Box::new(ContourArea::new(&settings.filter)))
			.with_filter(Box::new(Coverage::new(&settings.filter)));

		let mut pipeline = Self::new(
			Box::new(input),
			classifier,
			select::from_policy(settings.selector.policy),
			settings.kinematics.clone(),
			transmitter,
			notes,
		);
		pipeline.add_output(Box::new(LogOutput::default()));
		if settings.output.display {
			pipeline.add_output(Box::new(DisplayOutput::new(&settings.output.window)));
		}
		Ok(pipeline)
	}

	pub fn add_output(&mut self, output: Box<dyn OutputModule>) {
		self.output_modules.push(output);
	}

	/// Runs until shutdown, the end of the frame source, or the operator
	/// closing the display. Must run on a blocking thread; `handle` drives
	/// the serial writes.
	pub fn run(mut self, handle: &Handle, shutdown: &watch::Receiver<bool>) -> Result<(), VisionError> {
		loop {
			if *shutdown.borrow() {
				info!("processing loop stopping");
				return Ok(());
			}
			let image = match self.input.run()? {
				Some(image) => image,
				None => {
					info!("frame source exhausted after {} frames", self.frames);
					return Ok(());
				}
			};
			self.frames += 1;
			let frame = Frame {
				image,
				index: self.frames,
			};
			self.cycle(handle, &frame)?;

			if self.output_modules.iter().any(|module| module.closed()) {
				info!("display closed by operator");
				return Ok(());
			}
		}
	}

	/// One pass over a frame. Returns what happened to the selected target,
	/// if any was selected and solvable.
	pub fn cycle(&mut self, handle: &Handle, frame: &Frame) -> Result<Option<SendOutcome>, VisionError> {
		while let Ok(note) = self.notes.try_recv() {
			self.notify(note);
		}

		let detection = self.classifier.run(frame)?;
		self.notify(Notification::Counts {
			contours: detection.contours,
			shapes: detection.shapes.len(),
		});

		let outcome = match self.selector.select(&detection.shapes) {
			Some(target) => self.actuate(handle, target, frame),
			None => None,
		};

		for module in self.output_modules.iter_mut() {
			module.run(frame, &detection.shapes)?;
		}
		Ok(outcome)
	}

	fn actuate(&mut self, handle: &Handle, target: &DetectedShape, frame: &Frame) -> Option<SendOutcome> {
		self.notify(Notification::TargetSelected {
			center: target.center,
			kind: target.kind,
		});
		if self.transmitter.warming_up(frame.index) {
			return Some(SendOutcome::WarmingUp);
		}

		let solution = match self.arm.solve(target.center, frame.size()) {
			Ok(solution) => solution,
			Err(err) => {
				self.notify(Notification::Unreachable(err));
				return None;
			}
		};
		self.notify(Notification::Angles(solution));

		let command = match TargetCommand::new(solution.angles, target.kind) {
			Ok(command) => command,
			Err(err) => {
				error!("refusing to frame {}: {}", solution.angles, err);
				return None;
			}
		};

		match handle.block_on(self.transmitter.send(&command, frame.index)) {
			Ok(outcome) => {
				if let SendOutcome::Sent(_) = outcome {
					info!(
						"sent {} at {}, {} as [{}]",
						target.kind, target.center.x, target.center.y, solution.angles
					);
				}
				Some(outcome)
			}
			Err(SendError::GateLocked) => {
				debug!("frame {}: gate locked", frame.index);
				self.notify(Notification::SendRejected(SendError::GateLocked.to_string()));
				None
			}
			Err(err) => {
				self.notify(Notification::SendRejected(err.to_string()));
				None
			}
		}
	}

	fn notify(&mut self, note: Notification) {
		for module in self.output_modules.iter_mut() {
			module.notify(&note);
		}
	}
}
