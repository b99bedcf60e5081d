use crate::modules::{ThresholdModule, TrackingData, VisionError};
use crate::settings::ThresholdSettings;

use opencv::core::*;
use opencv::imgproc;
use opencv::prelude::*;

/// Fixed-level binarisation followed by flat contour extraction and
/// perimeter-scaled polygon simplification.
pub struct BinaryThreshold {
	level: f64,
	invert: bool,
	epsilon_ratio: f64,
}

impl ThresholdModule for BinaryThreshold {
	fn run(&mut self, frame: &Mat) -> Result<Vec<TrackingData>, VisionError> {
		let mut gray = Mat::default();
		let gray = match frame.channels() {
			1 => frame,
			4 => {
				imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGRA2GRAY, 0)?;
				&gray
			}
			_ => {
				imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
				&gray
			}
		};

		let kind = if self.invert {
			imgproc::THRESH_BINARY_INV
		} else {
			imgproc::THRESH_BINARY
		};
		let mut mask = Mat::default();
		imgproc::threshold(gray, &mut mask, self.level, 255., kind)?;

		let mut cnts = Vector::<Vector<Point>>::new();
		imgproc::find_contours(
			&mask,
			&mut cnts,
			imgproc::RETR_LIST,
			imgproc::CHAIN_APPROX_SIMPLE,
			Point::new(0, 0),
		)?;

		let frame_size = Size::new(mask.cols(), mask.rows());
		let mut tracked_objects = Vec::<TrackingData>::with_capacity(cnts.len());

		for cnt in cnts.iter() {
			let perimeter = imgproc::arc_length(&cnt, true)?;
			let mut approx = Vector::<Point>::new();
			imgproc::approx_poly_dp(&cnt, &mut approx, perimeter * self.epsilon_ratio, true)?;
			let area = imgproc::contour_area(&approx, false)?;
			let bounding = imgproc::bounding_rect(&cnt)?;
			tracked_objects.push(TrackingData {
				cnt,
				approx,
				area,
				bounding,
				frame_size,
			});
		}

		Ok(tracked_objects)
	}
}

impl BinaryThreshold {
	pub fn new(settings: &ThresholdSettings) -> Self {
		Self {
			level: settings.level,
			invert: settings.invert,
			epsilon_ratio: settings.epsilon_ratio,
		}
	}
}
