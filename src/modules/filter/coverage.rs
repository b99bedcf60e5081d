use crate::modules::FilterModule;
use crate::modules::TrackingData;
use crate::settings::FilterSettings;

/// Drops detections whose bounding box covers too much of the frame, which
/// in practice are the sheet edge or lighting artefacts.
pub struct Coverage {
	max: f64,
}

impl FilterModule for Coverage {
	fn run(&mut self, object: &TrackingData) -> bool {
		let box_area = object.bounding.width as f64 * object.bounding.height as f64;
		let frame_area = object.frame_size.width as f64 * object.frame_size.height as f64;
		box_area < self.max * frame_area
	}
}

impl Coverage {
	pub fn new(settings: &FilterSettings) -> Self {
		Self {
			max: settings.max_coverage,
		}
	}
}
