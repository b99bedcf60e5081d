use crate::kinematics::JointSolution;
use crate::modules::{Frame, Notification, OutputModule, VisionError};
use crate::protocol::GateState;
use crate::shape::{DetectedShape, ShapeKind};

use opencv::core::*;
use opencv::highgui;
use opencv::imgproc;
use opencv::prelude::*;

const KEY_ESC: i32 = 27;
const KEY_Q: i32 = 'q' as i32;

fn red() -> Scalar {
	Scalar::new(0., 0., 255., 0.)
}

fn green() -> Scalar {
	Scalar::new(0., 255., 0., 0.)
}

fn blue() -> Scalar {
	Scalar::new(255., 0., 0., 0.)
}

fn yellow() -> Scalar {
	Scalar::new(0., 255., 255., 0.)
}

/// What the operator sees beside the image.
struct Status {
	counts: (usize, usize),
	target: Option<(Point, ShapeKind)>,
	solution: Option<JointSolution>,
	gate: GateState,
	point: Option<String>,
	rejected: Option<String>,
}

/// OpenCV window showing the annotated camera frame and the session status.
pub struct DisplayOutput {
	window: String,
	status: Status,
	closed: bool,
}

impl OutputModule for DisplayOutput {
	fn run(&mut self, frame: &Frame, shapes: &[DetectedShape]) -> Result<(), VisionError> {
		let canvas = self.annotate(&frame.image, shapes)?;
		highgui::imshow(&self.window, &canvas)?;
		let key = highgui::wait_key(1)?;
		if key == KEY_ESC || key == KEY_Q {
			self.closed = true;
		}
		Ok(())
	}

	fn notify(&mut self, note: &Notification) {
		let status = &mut self.status;
		match note {
			Notification::Counts { contours, shapes } => status.counts = (*contours, *shapes),
			Notification::TargetSelected { center, kind } => status.target = Some((*center, *kind)),
			Notification::Angles(solution) => {
				status.solution = Some(*solution);
				status.rejected = None;
			}
			Notification::Unreachable(err) => status.rejected = Some(err.to_string()),
			Notification::SendRejected(reason) => status.rejected = Some(reason.clone()),
			Notification::GateChanged(state) => status.gate = *state,
			Notification::PointReport(text) => status.point = Some(text.clone()),
		}
	}

	fn closed(&self) -> bool {
		self.closed
	}
}

impl DisplayOutput {
	pub fn new(window: &str) -> Self {
		Self {
			window: window.to_string(),
			status: Status {
				counts: (0, 0),
				target: None,
				solution: None,
				gate: GateState::Unlocked,
				point: None,
				rejected: None,
			},
			closed: false,
		}
	}

	pub(crate) fn annotate(&self, image: &Mat, shapes: &[DetectedShape]) -> Result<Mat, VisionError> {
		let mut canvas = Mat::default();
		if image.channels() == 1 {
			imgproc::cvt_color(image, &mut canvas, imgproc::COLOR_GRAY2BGR, 0)?;
		} else {
			canvas = image.try_clone()?;
		}
		for shape in shapes {
			mark_detected_object(&mut canvas, shape)?;
		}
		self.draw_status(&mut canvas)?;
		Ok(canvas)
	}

	fn status_lines(&self) -> Vec<String> {
		let status = &self.status;
		let mut lines = vec![
			format!("There are {} contours detected", status.counts.0),
			format!("There are {} shapes detected", status.counts.1),
		];
		if let Some((center, kind)) = status.target {
			lines.push(format!("Target: {} at {}, {}", kind, center.x, center.y));
		}
		if let Some(solution) = status.solution {
			lines.push(format!("Theta 1: {:.2}", solution.base));
			lines.push(format!("Theta 2: {:.2}", solution.shoulder));
			lines.push(format!("Theta 3: {:.2}", solution.elbow));
			lines.push(format!("Theta 4: {:.2}", solution.theta4));
		}
		lines.push(format!("State: {}", status.gate));
		if let Some(point) = &status.point {
			lines.push(format!("Returned Point Data: {}", point));
		}
		if let Some(reason) = &status.rejected {
			lines.push(reason.clone());
		}
		lines
	}

	fn draw_status(&self, canvas: &mut Mat) -> Result<(), VisionError> {
		for (i, line) in self.status_lines().iter().enumerate() {
			imgproc::put_text(
				canvas,
				line,
				Point::new(10, 20 + i as i32 * 18),
				imgproc::FONT_HERSHEY_SIMPLEX,
				0.5,
				yellow(),
				1,
				imgproc::LINE_8,
				false,
			)?;
		}
		Ok(())
	}
}

fn mark_detected_object(canvas: &mut Mat, shape: &DetectedShape) -> Result<(), VisionError> {
	let outline = match shape.kind {
		ShapeKind::Square => red(),
		ShapeKind::Triangle => green(),
	};
	if !shape.outline.is_empty() {
		imgproc::polylines(canvas, &shape.outline, true, outline, 1, imgproc::LINE_8, 0)?;
	}
	imgproc::rectangle(canvas, shape.bounding, blue(), 1, imgproc::LINE_8, 0)?;
	imgproc::circle(canvas, shape.center, 5, blue(), 5, imgproc::LINE_8, 0)?;

	let caption = [
		format!("Area: {:.1}", shape.area),
		format!("Position: {}, {}", shape.center.x, shape.center.y),
		format!("Shape: {}", shape.kind),
	];
	let origin_y = shape.bounding.y + shape.bounding.height + 12;
	for (i, line) in caption.iter().enumerate() {
		imgproc::put_text(
			canvas,
			line,
			Point::new(shape.center.x, origin_y + i as i32 * 10),
			imgproc::FONT_HERSHEY_PLAIN,
			0.8,
			red(),
			1,
			imgproc::LINE_8,
			false,
		)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn count_nonzero(image: &Mat) -> i32 {
		let mut gray = Mat::default();
		imgproc::cvt_color(image, &mut gray, imgproc::COLOR_BGR2GRAY, 0).unwrap();
		opencv::core::count_non_zero(&gray).unwrap()
	}

	#[test]
	fn annotation_draws_on_a_copy() {
		let image = Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(0.)).unwrap();
		let shape = DetectedShape {
			kind: ShapeKind::Triangle,
			center: Point::new(100, 90),
			area: 4000.,
			bounding: Rect::new(50, 50, 101, 81),
			outline: Vector::from_iter([Point::new(50, 50), Point::new(150, 50), Point::new(100, 130)]),
		};

		let display = DisplayOutput::new("test");
		let canvas = display.annotate(&image, &[shape]).unwrap();
		assert!(count_nonzero(&canvas) > 0);
		assert_eq!(count_nonzero(&image), 0);
		assert_eq!(canvas.size().unwrap(), image.size().unwrap());
	}

	#[test]
	fn notifications_update_the_status_block() {
		let mut display = DisplayOutput::new("test");
		display.notify(&Notification::GateChanged(GateState::Locked));
		display.notify(&Notification::PointReport(String::from("12,34")));
		display.notify(&Notification::Counts { contours: 7, shapes: 2 });

		let lines = display.status_lines();
		assert!(lines.contains(&String::from("There are 7 contours detected")));
		assert!(lines.contains(&String::from("There are 2 shapes detected")));
		assert!(lines.contains(&String::from("State: Locked")));
		assert!(lines.contains(&String::from("Returned Point Data: 12,34")));
		assert!(!display.closed());
	}
}
