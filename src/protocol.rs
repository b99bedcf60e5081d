//! Wire format shared with the arm controller.
//!
//! Outbound: a fixed six byte frame `< b0 b1 b2 shape >` carrying raw
//! angle bytes. Inbound: newline terminated text with a `<...>` payload.

use thiserror::Error;

use std::fmt;

use crate::shape::ShapeKind;

pub const FRAME_START: u8 = b'<';
pub const FRAME_END: u8 = b'>';
pub const FRAME_LEN: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
	#[error("payload byte {0} collides with a frame delimiter")]
	DelimiterCollision(u8),
}

/// Moves a payload byte off the delimiter values.
pub fn avoid_delimiters(byte: u8) -> u8 {
	match byte {
		FRAME_START | FRAME_END => byte + 1,
		other => other,
	}
}

fn is_delimiter(byte: u8) -> bool {
	byte == FRAME_START || byte == FRAME_END
}

impl ShapeKind {
	pub fn code(self) -> u8 {
		match self {
			ShapeKind::Square => 1,
			ShapeKind::Triangle => 2,
		}
	}
}

/// Joint angles in whole degrees, in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointAngles {
	pub base: u8,
	pub shoulder: u8,
	pub elbow: u8,
}

impl JointAngles {
	pub fn to_bytes(self) -> [u8; 3] {
		[self.base, self.shoulder, self.elbow]
	}
}

impl fmt::Display for JointAngles {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}, {}, {}", self.base, self.shoulder, self.elbow)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCommand {
	angles: JointAngles,
	shape: ShapeKind,
}

impl TargetCommand {
	pub fn new(angles: JointAngles, shape: ShapeKind) -> Result<Self, ProtocolError> {
		if let Some(&byte) = angles.to_bytes().iter().find(|b| is_delimiter(**b)) {
			return Err(ProtocolError::DelimiterCollision(byte));
		}
		Ok(Self { angles, shape })
	}

	pub fn angles(&self) -> JointAngles {
		self.angles
	}

	pub fn shape(&self) -> ShapeKind {
		self.shape
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFrame([u8; FRAME_LEN]);

impl SerialFrame {
	pub fn encode(command: &TargetCommand) -> Self {
		let [b0, b1, b2] = command.angles.to_bytes();
		Self([FRAME_START, b0, b1, b2, command.shape.code(), FRAME_END])
	}

	pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
		&self.0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
	Unlocked,
	Locked,
}

impl fmt::Display for GateState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GateState::Unlocked => f.write_str("Unlocked"),
			GateState::Locked => f.write_str("Locked"),
		}
	}
}

/// A message reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
	Gate(GateState),
	Point(String),
	Unknown(char),
}

/// Parses one inbound line. `None` means the line carried no payload and is
/// dropped without a trace.
pub fn parse_line(line: &str) -> Option<Inbound> {
	let open = line.find('<')?;
	let rest = &line[open + 1..];
	let close = rest.find('>')?;
	let payload = &rest[..close];

	let mut chars = payload.chars();
	let command = chars.next()?;
	let body = chars.as_str();
	let message = match command {
		'S' => {
			if body.starts_with('1') {
				Inbound::Gate(GateState::Locked)
			} else {
				Inbound::Gate(GateState::Unlocked)
			}
		}
		'P' => Inbound::Point(body.to_string()),
		other => Inbound::Unknown(other),
	};
	Some(message)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn angles(base: u8, shoulder: u8, elbow: u8) -> JointAngles {
		JointAngles {
			base,
			shoulder,
			elbow,
		}
	}

	#[test]
	fn frame_layout() {
		let command = TargetCommand::new(angles(61, 87, 81), ShapeKind::Triangle).unwrap();
		let frame = SerialFrame::encode(&command);
		assert_eq!(frame.as_bytes(), &[0x3C, 61, 87, 81, 2, 0x3E]);

		let command = TargetCommand::new(angles(0, 255, 10), ShapeKind::Square).unwrap();
		assert_eq!(SerialFrame::encode(&command).as_bytes(), &[0x3C, 0, 255, 10, 1, 0x3E]);
	}

	#[test]
	fn delimiter_payloads_are_refused() {
		assert_eq!(
			TargetCommand::new(angles(60, 90, 90), ShapeKind::Square),
			Err(ProtocolError::DelimiterCollision(60))
		);
		assert_eq!(
			TargetCommand::new(angles(90, 90, 62), ShapeKind::Square),
			Err(ProtocolError::DelimiterCollision(62))
		);
	}

	#[test]
	fn delimiter_bytes_are_shifted_up() {
		assert_eq!(avoid_delimiters(60), 61);
		assert_eq!(avoid_delimiters(62), 63);
		assert_eq!(avoid_delimiters(61), 61);
		assert_eq!(avoid_delimiters(0), 0);
		assert_eq!(avoid_delimiters(255), 255);
	}

	#[test]
	fn gate_commands() {
		assert_eq!(parse_line("<S1>\r\n"), Some(Inbound::Gate(GateState::Locked)));
		assert_eq!(parse_line("<S0>\n"), Some(Inbound::Gate(GateState::Unlocked)));
		assert_eq!(parse_line("<S7>"), Some(Inbound::Gate(GateState::Unlocked)));
		assert_eq!(parse_line("<S>"), Some(Inbound::Gate(GateState::Unlocked)));
		assert_eq!(parse_line("noise<S1>trailing"), Some(Inbound::Gate(GateState::Locked)));
	}

	#[test]
	fn point_report_is_verbatim() {
		assert_eq!(
			parse_line("<P 120.5, 33 >\n"),
			Some(Inbound::Point(String::from(" 120.5, 33 ")))
		);
		assert_eq!(parse_line("<P>"), Some(Inbound::Point(String::new())));
	}

	#[test]
	fn malformed_lines_are_dropped() {
		assert_eq!(parse_line("no delimiters here"), None);
		assert_eq!(parse_line("<S1"), None);
		assert_eq!(parse_line("S1>"), None);
		assert_eq!(parse_line("<>"), None);
		assert_eq!(parse_line(">S1<"), None);
	}

	#[test]
	fn unknown_commands_are_reported() {
		assert_eq!(parse_line("<X42>"), Some(Inbound::Unknown('X')));
		assert_eq!(parse_line("<s1>"), Some(Inbound::Unknown('s')));
	}
}
