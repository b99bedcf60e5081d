use crate::modules::FilterModule;
use crate::modules::TrackingData;
use crate::settings::FilterSettings;

/// Keeps polygons whose simplified area lies strictly inside `(min, max)`.
pub struct ContourArea {
	min: f64,
	max: f64,
}

impl FilterModule for ContourArea {
	fn run(&mut self, object: &TrackingData) -> bool {
		object.area > self.min && object.area < self.max
	}
}

impl ContourArea {
	pub fn new(settings: &FilterSettings) -> Self {
		Self {
			min: settings.area_min,
			max: settings.area_max,
		}
	}
}
