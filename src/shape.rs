use opencv::core::*;

use std::fmt;

use crate::modules::{FilterModule, Frame, ThresholdModule, TrackingData, VisionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
	Triangle,
	Square,
}

impl ShapeKind {
	/// Only three and four sided polygons are recognised.
	pub fn from_vertices(count: usize) -> Option<Self> {
		match count {
			3 => Some(ShapeKind::Triangle),
			4 => Some(ShapeKind::Square),
			_ => None,
		}
	}
}

impl fmt::Display for ShapeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ShapeKind::Triangle => f.write_str("Triangle"),
			ShapeKind::Square => f.write_str("Square"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct DetectedShape {
	pub kind: ShapeKind,
	/// Centre of the bounding box, not the polygon centroid. The arm
	/// calibration was measured against this point.
	pub center: Point,
	pub area: f64,
	pub bounding: Rect,
	pub outline: Vector<Point>,
}

impl DetectedShape {
	fn from_tracking(kind: ShapeKind, object: TrackingData) -> Self {
		let b = object.bounding;
		Self {
			kind,
			center: Point::new(b.x + b.width / 2, b.y + b.height / 2),
			area: object.area,
			bounding: b,
			outline: object.cnt,
		}
	}
}

pub struct Detection {
	pub contours: usize,
	pub shapes: Vec<DetectedShape>,
}

/// Runs the threshold stage, keeps triangles and squares, then applies every
/// filter. Shapes come out in contour discovery order.
pub struct ShapeClassifier {
	threshold: Box<dyn ThresholdModule>,
	filter_modules: Vec<Box<dyn FilterModule>>,
}

impl ShapeClassifier {
	pub fn new(threshold: Box<dyn ThresholdModule>) -> Self {
		Self {
			threshold,
			filter_modules: Vec::new(),
		}
	}

	pub fn with_filter(mut self, filter: Box<dyn FilterModule>) -> Self {
		self.filter_modules.push(filter);
		self
	}

	pub fn run(&mut self, frame: &Frame) -> Result<Detection, VisionError> {
		let tracked_objects = self.threshold.run(&frame.image)?;
		let contours = tracked_objects.len();
		Ok(Detection {
			contours,
			shapes: self.classify(tracked_objects),
		})
	}

	pub fn classify(&mut self, tracked_objects: Vec<TrackingData>) -> Vec<DetectedShape> {
		let mut shapes = Vec::new();
		for obj in tracked_objects {
			let kind = match ShapeKind::from_vertices(obj.approx.len()) {
				Some(kind) => kind,
				None => continue,
			};
			if self.filter_modules.iter_mut().all(|module| module.run(&obj)) {
				shapes.push(DetectedShape::from_tracking(kind, obj));
			}
		}
		shapes
	}
}
