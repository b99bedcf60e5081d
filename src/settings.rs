use serde::Deserialize;

use thiserror::Error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::kinematics::ArmGeometry;

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("failed to read settings file {path:?}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse settings: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid settings: {0}")]
	Invalid(String),
}

/// Everything read from `vset.toml`. Missing sections fall back to the
/// calibration the arm was tuned with.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub input: InputSettings,
	pub threshold: ThresholdSettings,
	pub filter: FilterSettings,
	pub selector: SelectorSettings,
	pub kinematics: ArmGeometry,
	pub serial: SerialSettings,
	pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputSettings {
	pub camera: i32,
	pub width: i32,
	pub height: i32,
	pub fps: i32,
	pub flip_horizontal: bool,
}

impl Default for InputSettings {
	fn default() -> Self {
		Self {
			camera: 1,
			width: 1280,
			height: 720,
			fps: 30,
			flip_horizontal: true,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
	pub level: f64,
	pub invert: bool,
	/// Simplification tolerance as a fraction of each contour's perimeter.
	pub epsilon_ratio: f64,
}

impl Default for ThresholdSettings {
	fn default() -> Self {
		Self {
			level: 120.,
			invert: false,
			epsilon_ratio: 0.05,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
	pub area_min: f64,
	pub area_max: f64,
	/// Largest share of the frame a bounding box may cover.
	pub max_coverage: f64,
}

impl Default for FilterSettings {
	fn default() -> Self {
		Self {
			area_min: 300.,
			area_max: 12000.,
			max_coverage: 0.5,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorPolicy {
	Last,
	Largest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
	pub policy: SelectorPolicy,
}

impl Default for SelectorSettings {
	fn default() -> Self {
		Self {
			policy: SelectorPolicy::Last,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
	pub port: String,
	pub baud: u32,
	pub connect_attempts: u32,
	pub backoff_initial_ms: u64,
	pub backoff_max_ms: u64,
}

impl Default for SerialSettings {
	fn default() -> Self {
		Self {
			port: String::from("/dev/ttyACM0"),
			baud: 9600,
			connect_attempts: 5,
			backoff_initial_ms: 500,
			backoff_max_ms: 8000,
		}
	}
}

impl SerialSettings {
	pub fn backoff_initial(&self) -> Duration {
		Duration::from_millis(self.backoff_initial_ms)
	}

	pub fn backoff_max(&self) -> Duration {
		Duration::from_millis(self.backoff_max_ms)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
	Fixed,
	Ack,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
	pub warmup_frames: u64,
	pub pacing: PacingMode,
	pub quiescence_secs: u64,
	pub ack_timeout_secs: u64,
	pub display: bool,
	pub window: String,
}

impl Default for OutputSettings {
	fn default() -> Self {
		Self {
			warmup_frames: 50,
			pacing: PacingMode::Fixed,
			quiescence_secs: 20,
			ack_timeout_secs: 30,
			display: true,
			window: String::from("armvision"),
		}
	}
}

impl Settings {
	pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml(&content)
	}

	pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
		let settings: Settings = toml::from_str(content)?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		let filter = &self.filter;
		if !(filter.area_min < filter.area_max) {
			return Err(SettingsError::Invalid(format!(
				"filter.area_min ({}) must be below filter.area_max ({})",
				filter.area_min, filter.area_max
			)));
		}
		if !(filter.max_coverage > 0. && filter.max_coverage <= 1.) {
			return Err(SettingsError::Invalid(format!(
				"filter.max_coverage ({}) must lie in (0, 1]",
				filter.max_coverage
			)));
		}
		if !(self.threshold.epsilon_ratio > 0.) {
			return Err(SettingsError::Invalid(String::from(
				"threshold.epsilon_ratio must be positive",
			)));
		}
		if self.serial.baud == 0 {
			return Err(SettingsError::Invalid(String::from("serial.baud must be non-zero")));
		}
		if self.serial.connect_attempts == 0 {
			return Err(SettingsError::Invalid(String::from(
				"serial.connect_attempts must be at least 1",
			)));
		}
		let arm = &self.kinematics;
		if !(arm.upper_link > 0. && arm.forearm > 0.) {
			return Err(SettingsError::Invalid(String::from(
				"kinematics link lengths must be positive",
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_file_uses_calibrated_defaults() {
		let settings = Settings::from_toml("").unwrap();
		assert_eq!(settings.threshold.level, 120.);
		assert_eq!(settings.filter.area_min, 300.);
		assert_eq!(settings.filter.area_max, 12000.);
		assert_eq!(settings.output.warmup_frames, 50);
		assert_eq!(settings.output.quiescence_secs, 20);
		assert_eq!(settings.output.pacing, PacingMode::Fixed);
		assert_eq!(settings.serial.baud, 9600);
		assert_eq!(settings.selector.policy, SelectorPolicy::Last);
		assert_eq!(settings.kinematics.base_offset_y, 255.);
	}

	#[test]
	fn sections_override_defaults() {
		let settings = Settings::from_toml(
			r#"
			[serial]
			port = "/dev/ttyUSB3"

			[output]
			pacing = "ack"
			warmup_frames = 10

			[selector]
			policy = "largest"
			"#,
		)
		.unwrap();
		assert_eq!(settings.serial.port, "/dev/ttyUSB3");
		assert_eq!(settings.serial.baud, 9600);
		assert_eq!(settings.output.pacing, PacingMode::Ack);
		assert_eq!(settings.output.warmup_frames, 10);
		assert_eq!(settings.selector.policy, SelectorPolicy::Largest);
	}

	#[test]
	fn inverted_area_bounds_are_rejected() {
		let err = Settings::from_toml("[filter]\narea_min = 500.0\narea_max = 400.0\n").unwrap_err();
		assert!(matches!(err, SettingsError::Invalid(_)));
	}

	#[test]
	fn unknown_policy_is_a_parse_error() {
		let err = Settings::from_toml("[selector]\npolicy = \"nearest\"\n").unwrap_err();
		assert!(matches!(err, SettingsError::Parse(_)));
	}
}
