//! Camera variant selection, shake and roll.
//!
//! Each variant is a pure function of the frame's camera values. Nothing is
//! retained between frames, so switching `cam.index` cuts instantly.

use glam::{Mat4, Vec3};

use crate::sync::tracks::CameraValues;

/// Radius of the ring traversed by [`CameraVariant::Ring`]
pub const RING_RADIUS: f32 = 30.0;

/// Shake oscillation cycles per beat at unit shake speed
const SHAKE_RATE: f64 = 32.0;

/// Camera path selected by the `cam.index` track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraVariant {
    /// Orbit the at-tracks target at `cam.dist`, height `cam.y`
    Orbit,
    /// Position and target both circle the origin, `cam.offset` degrees apart
    MutualOrbit,
    /// Position and target on a fixed ring, pushed outward by `cam.y`
    Ring,
    /// Position and target straight from the per-axis tracks
    Free,
    /// Above the origin looking down
    TopDown,
}

impl CameraVariant {
    const INDEXED: [CameraVariant; 4] = [
        CameraVariant::Orbit,
        CameraVariant::MutualOrbit,
        CameraVariant::Ring,
        CameraVariant::Free,
    ];

    /// Variant for a camera index; unknown indices fall back to top-down
    pub fn from_index(index: i32) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::INDEXED.get(i).copied())
            .unwrap_or(CameraVariant::TopDown)
    }

    /// Evaluate the variant's pose
    pub fn pose(self, values: &CameraValues) -> CameraPose {
        let path: fn(&CameraValues) -> CameraPose = match self {
            CameraVariant::Orbit => orbit,
            CameraVariant::MutualOrbit => mutual_orbit,
            CameraVariant::Ring => ring,
            CameraVariant::Free => free,
            CameraVariant::TopDown => top_down,
        };
        path(values)
    }
}

/// Position, look-at target and up vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

fn orbit(v: &CameraValues) -> CameraPose {
    let target = Vec3::from(v.target);
    let angle = v.time / 2.0;
    CameraPose {
        position: target + Vec3::new(angle.sin() * v.distance, v.position[1], angle.cos() * v.distance),
        target,
        up: Vec3::Y,
    }
}

fn mutual_orbit(v: &CameraValues) -> CameraPose {
    let on_circle = |degrees: f32| {
        let a = degrees.to_radians();
        Vec3::new(a.sin(), a.cos(), 0.0) * v.distance
    };
    let position = on_circle(v.time);
    let target = on_circle(v.time + v.offset);
    let d = position - target;
    CameraPose {
        position,
        target,
        up: Vec3::new(d.y, d.z, d.x),
    }
}

fn ring(v: &CameraValues) -> CameraPose {
    let on_ring = |degrees: f32| {
        let a = degrees.to_radians();
        let p = Vec3::new(a.sin(), 0.0, a.cos()) * RING_RADIUS;
        p + p.normalize_or_zero() * v.position[1]
    };
    CameraPose {
        position: on_ring(v.time),
        target: on_ring(v.time + v.offset),
        up: Vec3::Y,
    }
}

fn free(v: &CameraValues) -> CameraPose {
    CameraPose {
        position: Vec3::from(v.position),
        target: Vec3::from(v.target),
        up: Vec3::Y,
    }
}

fn top_down(v: &CameraValues) -> CameraPose {
    CameraPose {
        position: Vec3::Y * v.distance,
        target: Vec3::ZERO,
        up: Vec3::Y,
    }
}

/// Shake displacement for a beat position
pub fn shake_offset(beat: f64, speed: f32, amount: f32) -> Vec3 {
    let phase = beat * SHAKE_RATE * speed as f64;
    Vec3::new(
        phase.sin() as f32,
        (phase * 0.9).cos() as f32,
        (phase - 0.5).sin() as f32,
    ) * amount
}

/// Left-handed look-at. A degenerate direction or an up vector parallel to
/// it is replaced so the basis stays finite.
fn look_at(pose: &CameraPose) -> Mat4 {
    let forward = (pose.target - pose.position).try_normalize().unwrap_or(Vec3::Z);
    let up = [pose.up, Vec3::Z, Vec3::X]
        .into_iter()
        .find(|up| up.cross(forward).length_squared() > 1e-12)
        .unwrap_or(Vec3::Y);
    Mat4::look_to_lh(pose.position, forward, up.normalize())
}

/// Perspective parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn new(aspect: f32) -> Self {
        Self {
            fov_y_degrees: 80.0,
            aspect,
            near: 1.0,
            far: 10000.0,
        }
    }

    /// Left-handed projection with 0..1 depth
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }
}

/// View-space axes expressed in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub up: Vec3,
    pub left: Vec3,
    pub forward: Vec3,
}

impl CameraBasis {
    /// Read the basis from a world-to-view transform
    pub fn from_view(view: &Mat4) -> Self {
        Self {
            up: view.row(1).truncate().normalize_or_zero(),
            left: view.row(0).truncate().normalize_or_zero(),
            forward: view.row(2).truncate(),
        }
    }
}

/// Everything a frame needs from the camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub variant: CameraVariant,
    pub pose: CameraPose,
    pub view: Mat4,
    pub projection: Mat4,
    pub basis: CameraBasis,
}

/// Turns camera track values into view and projection transforms
#[derive(Debug, Clone, Copy)]
pub struct CameraRig {
    projection: Projection,
}

impl CameraRig {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Evaluate the camera for one frame
    pub fn evaluate(&self, values: &CameraValues, beat: f64) -> CameraFrame {
        let variant = CameraVariant::from_index(values.index);
        let mut pose = variant.pose(values);

        let shake = shake_offset(beat, values.shake_speed, values.shake_amount);
        pose.position += shake;
        pose.target += shake;

        let view = Mat4::from_rotation_z(values.roll_degrees.to_radians()) * look_at(&pose);

        CameraFrame {
            variant,
            pose,
            view,
            projection: self.projection.matrix(),
            basis: CameraBasis::from_view(&view),
        }
    }
}
