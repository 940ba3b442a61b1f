//! Letterboxed viewport geometry.

/// Integer pixel rectangle inside the presentation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Centered viewport showing `demo_aspect` content undistorted on a
/// `width`×`height` surface displayed at `monitor_aspect`.
///
/// Content normally spans the full width with bars above and below; when
/// that would need more than the full height it spans the full height with
/// bars at the sides instead (pillarbox).
pub fn letterbox(width: u32, height: u32, monitor_aspect: f32, demo_aspect: f32) -> Viewport {
    let mut w_ratio = 1.0f32;
    let mut h_ratio = monitor_aspect / demo_aspect;
    if h_ratio > 1.0 {
        w_ratio /= h_ratio;
        h_ratio = 1.0;
    }

    let vw = ((width as f32 * w_ratio).round() as u32).clamp(1, width.max(1));
    let vh = ((height as f32 * h_ratio).round() as u32).clamp(1, height.max(1));
    Viewport {
        x: (width.saturating_sub(vw)) / 2,
        y: (height.saturating_sub(vh)) / 2,
        width: vw,
        height: vh,
    }
}
