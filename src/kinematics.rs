//! Inverse kinematics for the three joint arm.
//!
//! The working surface is a 13 x 9 inch sheet whose near edge sits
//! `base_offset_y` millimetres in front of the base. Pixel positions are
//! mapped linearly onto the sheet, then solved analytically with a set of
//! empirical corrections measured on the real arm.

use opencv::core::{Point, Size};

use serde::Deserialize;
use thiserror::Error;

use std::cmp::Ordering;
use std::fmt;

use crate::protocol::{avoid_delimiters, JointAngles};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
	Base,
	Shoulder,
	Elbow,
}

impl fmt::Display for Joint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Joint::Base => f.write_str("base"),
			Joint::Shoulder => f.write_str("shoulder"),
			Joint::Elbow => f.write_str("elbow"),
		}
	}
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
	#[error("target at reach {reach:.1} mm is outside the arm's workspace")]
	TargetUnreachable { reach: f64 },
	#[error("{joint} angle {degrees:.1} does not fit in a byte")]
	AngleOutOfRange { joint: Joint, degrees: f64 },
	#[error("frame size {width}x{height} is empty")]
	EmptyFrame { width: i32, height: i32 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArmGeometry {
	pub surface_width: f64,
	pub surface_height: f64,
	pub mm_per_unit: f64,
	/// Distance from the base axis to the near edge of the sheet.
	pub base_offset_y: f64,
	/// Lateral offset of the gripper from the wrist axis.
	pub tool_offset_x: f64,
	pub upper_link: f64,
	pub forearm: f64,
	pub z_offset: f64,
	pub home_base: f64,
	pub centered_base: f64,
	pub base_linear_limit: f64,
	pub base_linear_gain: f64,
	pub elbow_offset: f64,
	pub shoulder_gain: f64,
	pub shoulder_offset: f64,
}

impl Default for ArmGeometry {
	fn default() -> Self {
		Self {
			surface_width: 13.,
			surface_height: 9.,
			mm_per_unit: 25.4,
			base_offset_y: 255.,
			tool_offset_x: 15.,
			upper_link: 300.,
			forearm: 250.,
			z_offset: 90.,
			home_base: 60.,
			centered_base: 61.,
			base_linear_limit: 3.,
			base_linear_gain: 0.8,
			elbow_offset: 6.,
			shoulder_gain: 1.1,
			shoulder_offset: 18.,
		}
	}
}

/// Result of a solve. Only `angles` is transmitted; the rest is kept for the
/// operator display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSolution {
	pub angles: JointAngles,
	pub base: f64,
	pub shoulder: f64,
	pub elbow: f64,
	pub theta4: f64,
	pub theta2_prime: f64,
	pub reach: f64,
}

impl ArmGeometry {
	pub fn solve(&self, center: Point, frame: Size) -> Result<JointSolution, KinematicsError> {
		if frame.width <= 0 || frame.height <= 0 {
			return Err(KinematicsError::EmptyFrame {
				width: frame.width,
				height: frame.height,
			});
		}

		let sheet_w = self.surface_width * self.mm_per_unit;
		let sheet_h = self.surface_height * self.mm_per_unit;
		let x = center.x as f64 * sheet_w / frame.width as f64;
		let y = center.y as f64 * sheet_h / frame.height as f64 + self.base_offset_y;

		// Which half of the sheet, decided on pixels so the centre line is exact.
		let side = (2 * center.x as i64).cmp(&(frame.width as i64));

		let mut dx = (sheet_w / 2. - x).abs();
		dx = match side {
			Ordering::Greater => dx - self.tool_offset_x,
			_ => dx + self.tool_offset_x,
		};

		let r2 = y * y + dx * dx;
		let reach = r2.sqrt();

		let mut sweep = (dx / y).atan().to_degrees();
		if sweep > self.base_linear_limit {
			sweep *= self.base_linear_gain;
		}
		let base = match side {
			Ordering::Less => self.home_base + sweep,
			Ordering::Greater => self.home_base - sweep,
			Ordering::Equal => self.centered_base,
		};

		let a = self.upper_link;
		let b = self.forearm;
		let z = self.z_offset;

		let elbow = law_of_cosines((a * a + b * b - r2 - z * z) / (2. * a * b), reach)?
			- self.elbow_offset;

		let wrist = (z * z + r2).sqrt();
		let theta4 = law_of_cosines((a * a + z * z + r2 - b * b) / (2. * a * wrist), reach)?;
		let theta2_prime = (reach / z).atan().to_degrees();
		let shoulder =
			(180. - (theta2_prime + theta4)) * self.shoulder_gain + self.shoulder_offset;

		let angles = JointAngles {
			base: to_byte(Joint::Base, base, reach)?,
			shoulder: to_byte(Joint::Shoulder, shoulder, reach)?,
			elbow: to_byte(Joint::Elbow, elbow, reach)?,
		};

		Ok(JointSolution {
			angles,
			base,
			shoulder,
			elbow,
			theta4,
			theta2_prime,
			reach,
		})
	}
}

fn law_of_cosines(cosine: f64, reach: f64) -> Result<f64, KinematicsError> {
	if !(-1.0..=1.0).contains(&cosine) {
		return Err(KinematicsError::TargetUnreachable { reach });
	}
	Ok(cosine.acos().to_degrees())
}

fn to_byte(joint: Joint, degrees: f64, reach: f64) -> Result<u8, KinematicsError> {
	if !degrees.is_finite() {
		return Err(KinematicsError::TargetUnreachable { reach });
	}
	let rounded = degrees.round_ties_even();
	if !(0.0..=255.0).contains(&rounded) {
		return Err(KinematicsError::AngleOutOfRange { joint, degrees });
	}
	Ok(avoid_delimiters(rounded as u8))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn frame() -> Size {
		Size::new(1280, 720)
	}

	#[test]
	fn centred_target() {
		let solution = ArmGeometry::default().solve(Point::new(640, 360), frame()).unwrap();
		assert_eq!(
			solution.angles,
			JointAngles {
				base: 61,
				shoulder: 87,
				elbow: 81,
			}
		);
		assert!((solution.theta4 - 41.02).abs() < 0.01);
		assert!((solution.theta2_prime - 76.31).abs() < 0.01);
	}

	#[test]
	fn same_input_same_angles() {
		let arm = ArmGeometry::default();
		let a = arm.solve(Point::new(211, 588), frame()).unwrap();
		let b = arm.solve(Point::new(211, 588), frame()).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn sides_move_base_in_opposite_directions() {
		let arm = ArmGeometry::default();
		let left = arm.solve(Point::new(100, 600), frame()).unwrap();
		let right = arm.solve(Point::new(1200, 100), frame()).unwrap();
		assert_eq!(left.angles.base, 75);
		assert_eq!(right.angles.base, 41);
	}

	#[test]
	fn base_near_delimiters_is_shifted() {
		let arm = ArmGeometry::default();

		let near_end = arm.solve(Point::new(650, 360), frame()).unwrap();
		assert!((near_end.base - 61.93).abs() < 0.01);
		assert_eq!(near_end.angles.base, 63);

		let near_start = arm.solve(Point::new(700, 360), frame()).unwrap();
		assert!((near_start.base - 59.93).abs() < 0.01);
		assert_eq!(near_start.angles.base, 61);
	}

	#[test]
	fn no_delimiter_bytes_anywhere_on_the_sheet() {
		let arm = ArmGeometry::default();
		for (width, height) in [(1280, 720), (640, 480), (333, 251)] {
			for x in (0..=width).step_by(7) {
				for y in (0..=height).step_by(7) {
					let solution = arm.solve(Point::new(x, y), Size::new(width, height)).unwrap();
					for byte in solution.angles.to_bytes() {
						assert_ne!(byte, 60, "({}, {}) on {}x{}", x, y, width, height);
						assert_ne!(byte, 62, "({}, {}) on {}x{}", x, y, width, height);
					}
				}
			}
		}
	}

	#[test]
	fn far_target_is_unreachable() {
		let err = ArmGeometry::default().solve(Point::new(640, 1500), frame()).unwrap_err();
		match err {
			KinematicsError::TargetUnreachable { reach } => assert!(reach > 700.),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn empty_frame_is_rejected() {
		let err = ArmGeometry::default().solve(Point::new(0, 0), Size::new(0, 720)).unwrap_err();
		assert_eq!(err, KinematicsError::EmptyFrame { width: 0, height: 720 });
	}

	#[test]
	fn oversized_calibration_overflows_a_byte() {
		let arm = ArmGeometry {
			shoulder_offset: 300.,
			..ArmGeometry::default()
		};
		let err = arm.solve(Point::new(640, 360), frame()).unwrap_err();
		assert!(matches!(
			err,
			KinematicsError::AngleOutOfRange {
				joint: Joint::Shoulder,
				..
			}
		));
	}
}
