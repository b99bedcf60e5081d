use crate::modules::{Frame, Notification, OutputModule, VisionError};
use crate::shape::DetectedShape;

use itertools::Itertools;
use log::{debug, info, warn};

/// Writes notifications to the log instead of a window.
#[derive(Default)]
pub struct LogOutput {
	last_counts: Option<(usize, usize)>,
}

impl OutputModule for LogOutput {
	fn run(&mut self, _frame: &Frame, _shapes: &[DetectedShape]) -> Result<(), VisionError> {
		Ok(())
	}

	fn notify(&mut self, note: &Notification) {
		match note {
			Notification::Counts { contours, shapes } => {
				if self.last_counts != Some((*contours, *shapes)) {
					debug!("{} contours, {} shapes", contours, shapes);
					self.last_counts = Some((*contours, *shapes));
				}
			}
			Notification::TargetSelected { center, kind } => {
				debug!("target {} at {}, {}", kind, center.x, center.y);
			}
			Notification::Angles(solution) => {
				let thetas = [solution.base, solution.shoulder, solution.elbow, solution.theta4]
					.iter()
					.map(|theta| format!("{:.2}", theta))
					.join(", ");
				debug!("theta 1-4: {} -> bytes [{}]", thetas, solution.angles);
			}
			Notification::Unreachable(err) => warn!("skipping target: {}", err),
			Notification::SendRejected(reason) => warn!("send rejected: {}", reason),
			Notification::GateChanged(state) => info!("State: {}", state),
			Notification::PointReport(text) => info!("Returned Point Data: {}", text),
		}
	}
}
