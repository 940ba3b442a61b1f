//! Camera paths driven by track values.

pub mod rig;

pub use rig::{CameraBasis, CameraFrame, CameraPose, CameraRig, CameraVariant, Projection};
