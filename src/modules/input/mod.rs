mod camera;

pub use camera::CameraInput;
