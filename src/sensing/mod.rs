pub mod camera;
pub mod controller;
pub mod encode;
pub mod loop_worker;
pub mod publisher;

pub use camera::{Camera, CaptureConstraints, MediaStream, StillImageCamera, StreamHandle};
pub use controller::CaptureController;
pub use encode::encode_jpeg;
pub use publisher::{Applied, CaptureSnapshot, CaptureStatus, Publisher};
