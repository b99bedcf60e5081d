pub mod input;
pub mod threshold;
pub mod filter;
pub mod output;

use opencv::core::*;
use opencv::prelude::*;

use thiserror::Error;

use crate::kinematics::{JointSolution, KinematicsError};
use crate::protocol::GateState;
use crate::shape::{DetectedShape, ShapeKind};

#[derive(Debug, Error)]
pub enum VisionError {
	#[error("camera {index} could not be opened")]
	CameraOpen { index: i32 },
	#[error(transparent)]
	OpenCv(#[from] opencv::Error),
}

/// A captured image plus its position in the session.
pub struct Frame {
	pub image: Mat,
	pub index: u64,
}

impl Frame {
	pub fn size(&self) -> Size {
		Size::new(self.image.cols(), self.image.rows())
	}
}

/// One closed contour and the measurements the filters need.
pub struct TrackingData {
	pub cnt: Vector<Point>,
	pub approx: Vector<Point>,
	pub area: f64,
	pub bounding: Rect,
	pub frame_size: Size,
}

/// Everything the display learns about a processing cycle.
#[derive(Debug, Clone)]
pub enum Notification {
	Counts { contours: usize, shapes: usize },
	TargetSelected { center: Point, kind: ShapeKind },
	Angles(JointSolution),
	Unreachable(KinematicsError),
	SendRejected(String),
	GateChanged(GateState),
	PointReport(String),
}

pub trait InputModule: Send {
	/// `None` once the source is exhausted.
	fn run(&mut self) -> Result<Option<Mat>, VisionError>;
}

pub trait ThresholdModule: Send {
	fn run(&mut self, frame: &Mat) -> Result<Vec<TrackingData>, VisionError>;
}

pub trait FilterModule: Send {
	fn run(&mut self, object: &TrackingData) -> bool;
}

pub trait OutputModule: Send {
	fn run(&mut self, frame: &Frame, shapes: &[DetectedShape]) -> Result<(), VisionError>;

	fn notify(&mut self, note: &Notification);

	/// Set when the operator asked to end the session.
	fn closed(&self) -> bool {
		false
	}
}
