//! Picks the one shape per cycle that the arm is sent to.
//!
//! The calibrated behaviour takes the last shape the contour scan found.
//! That order is an artefact of the scan rather than a deliberate ranking,
//! so the choice sits behind a trait and is selected in `vset.toml`.

use crate::settings::SelectorPolicy;
use crate::shape::DetectedShape;

use std::cmp::Ordering;

pub trait TargetSelector: Send {
	fn select<'a>(&mut self, shapes: &'a [DetectedShape]) -> Option<&'a DetectedShape>;
}

#[derive(Debug, Default)]
pub struct LastDiscovered;

impl TargetSelector for LastDiscovered {
	fn select<'a>(&mut self, shapes: &'a [DetectedShape]) -> Option<&'a DetectedShape> {
		shapes.last()
	}
}

/// Largest simplified area; ties go to the earlier shape.
#[derive(Debug, Default)]
pub struct LargestArea;

impl TargetSelector for LargestArea {
	fn select<'a>(&mut self, shapes: &'a [DetectedShape]) -> Option<&'a DetectedShape> {
		shapes.iter().rev().max_by(|a, b| a.area.partial_cmp(&b.area).unwrap_or(Ordering::Equal))
	}
}

pub fn from_policy(policy: SelectorPolicy) -> Box<dyn TargetSelector> {
	match policy {
		SelectorPolicy::Last => Box::new(LastDiscovered),
		SelectorPolicy::Largest => Box::new(LargestArea),
	}
}
