mod contourarea;
mod coverage;

pub use contourarea::ContourArea;
pub use coverage::Coverage;
