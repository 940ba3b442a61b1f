//! Per-frame context handed to every pass.

use crate::camera::{CameraFrame, CameraRig};
use crate::core::{beat, not_rand};
use crate::render::letterbox::Viewport;
use crate::render::scene::SceneVariant;
use crate::sync::tracks::FrameValues;

/// Everything evaluated for one frame before any GPU work
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Presented frame counter
    pub index: u64,
    pub row: f64,
    pub beat: f64,
    pub values: FrameValues,
    pub scene: SceneVariant,
    pub camera: CameraFrame,
    /// Letterboxed content rectangle on the presentation surface
    pub viewport: Viewport,
    /// Per-frame value in [0, 1) for effects that want noise
    pub random: f32,
}

impl FrameContext {
    pub fn new(index: u64, values: FrameValues, rig: &CameraRig, viewport: Viewport) -> Self {
        let beat = beat(values.row);
        Self {
            index,
            row: values.row,
            beat,
            values,
            scene: SceneVariant::from_part(values.part),
            camera: rig.evaluate(&values.camera, beat),
            viewport,
            random: not_rand(index as i32 ^ 0x5f37),
        }
    }
}
