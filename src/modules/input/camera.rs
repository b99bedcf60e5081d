use crate::modules::{InputModule, VisionError};
use crate::settings::InputSettings;

use opencv::core;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use log::{info, warn};

const MAX_EMPTY_GRABS: u32 = 30;

pub struct CameraInput {
	cap: VideoCapture,
	flip: bool,
}

impl InputModule for CameraInput {
	fn run(&mut self) -> Result<Option<Mat>, VisionError> {
		let mut frame = Mat::default();
		for _ in 0..MAX_EMPTY_GRABS {
			if !self.cap.read(&mut frame)? {
				info!("camera stream ended");
				return Ok(None);
			}
			if frame.rows() <= 0 || frame.cols() <= 0 {
				continue;
			}
			if !self.flip {
				return Ok(Some(frame));
			}
			// Mirror so the image origin sits on the sheet's origin corner.
			let mut flipped = Mat::default();
			core::flip(&frame, &mut flipped, 1)?;
			return Ok(Some(flipped));
		}
		warn!("camera returned {} empty frames in a row, giving up", MAX_EMPTY_GRABS);
		Ok(None)
	}
}

impl CameraInput {
	pub fn new(settings: &InputSettings) -> Result<Self, VisionError> {
		let mut cap = VideoCapture::new(settings.camera, videoio::CAP_ANY)?;
		if !cap.is_opened()? {
			return Err(VisionError::CameraOpen {
				index: settings.camera,
			});
		}
		cap.set(videoio::CAP_PROP_FRAME_HEIGHT, settings.height as f64)?;
		cap.set(videoio::CAP_PROP_FRAME_WIDTH, settings.width as f64)?;
		cap.set(videoio::CAP_PROP_FPS, settings.fps as f64)?;
		info!(
			"camera {} opened at {}x{} @ {} fps",
			settings.camera, settings.width, settings.height, settings.fps
		);
		Ok(Self {
			cap,
			flip: settings.flip_horizontal,
		})
	}
}
