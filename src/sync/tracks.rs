//! The named tracks the demo reads every frame.
//!
//! All handles are resolved once at startup so a missing track fails before
//! the first frame instead of silently evaluating to a default.

use crate::sync::timeline::{SyncError, TimelineEvaluator, TrackHandle};

/// Every track name the demo consumes
pub const TRACK_NAMES: &[&str] = &[
    "part",
    "cam.dist", "cam.time", "cam.x", "cam.y", "cam.z",
    "cam.at.x", "cam.at.y", "cam.at.z",
    "cam.roll", "cam.offset", "cam.index",
    "cam.shake.amt", "cam.shake.speed",
    "cm.fade", "cm.flash", "cm.overlay", "cm.overlay_alpha",
    "cm.pulse.amt", "cm.pulse.speed",
    "cm.map1", "cm.map2", "cm.lerp",
    "bloom.cutoff", "bloom.shape", "bloom.amt",
    "dist.amt", "dist.freq", "dist.offset",
    "dof.fstop", "dof.flen", "dof.fdist",
];

/// Camera-related values for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraValues {
    pub index: i32,
    pub distance: f32,
    pub time: f32,
    pub offset: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub roll_degrees: f32,
    pub shake_amount: f32,
    pub shake_speed: f32,
}

/// Colour grading values for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradeValues {
    pub fade: f32,
    pub flash: f32,
    pub overlay: i32,
    pub overlay_alpha: f32,
    pub pulse_amount: f32,
    pub pulse_speed: f32,
    pub map1: i32,
    pub map2: i32,
    pub map_lerp: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BloomValues {
    pub cutoff: f32,
    pub shape: f32,
    pub amount: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistortionValues {
    pub amount: f32,
    pub frequency: f32,
    pub offset: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DofValues {
    pub f_stop: f32,
    pub focal_length: f32,
    pub focal_distance: f32,
}

/// Snapshot of every demo track at one row
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameValues {
    pub row: f64,
    pub part: i32,
    pub camera: CameraValues,
    pub grade: GradeValues,
    pub bloom: BloomValues,
    pub distortion: DistortionValues,
    pub dof: DofValues,
}

/// Resolved handles for every demo track
#[derive(Debug, Clone, Copy)]
pub struct DemoTracks {
    part: TrackHandle,
    cam_dist: TrackHandle,
    cam_time: TrackHandle,
    cam_pos: [TrackHandle; 3],
    cam_at: [TrackHandle; 3],
    cam_roll: TrackHandle,
    cam_offset: TrackHandle,
    cam_index: TrackHandle,
    shake_amt: TrackHandle,
    shake_speed: TrackHandle,
    fade: TrackHandle,
    flash: TrackHandle,
    overlay: TrackHandle,
    overlay_alpha: TrackHandle,
    pulse_amt: TrackHandle,
    pulse_speed: TrackHandle,
    map1: TrackHandle,
    map2: TrackHandle,
    map_lerp: TrackHandle,
    bloom_cutoff: TrackHandle,
    bloom_shape: TrackHandle,
    bloom_amt: TrackHandle,
    dist_amt: TrackHandle,
    dist_freq: TrackHandle,
    dist_offset: TrackHandle,
    dof_fstop: TrackHandle,
    dof_flen: TrackHandle,
    dof_fdist: TrackHandle,
}

impl DemoTracks {
    /// Resolve every handle, failing on the first unknown name
    pub fn resolve(timeline: &TimelineEvaluator) -> Result<Self, SyncError> {
        let get = |name: &str| timeline.get_track(name);

        Ok(Self {
            part: get("part")?,
            cam_dist: get("cam.dist")?,
            cam_time: get("cam.time")?,
            cam_pos: [get("cam.x")?, get("cam.y")?, get("cam.z")?],
            cam_at: [get("cam.at.x")?, get("cam.at.y")?, get("cam.at.z")?],
            cam_roll: get("cam.roll")?,
            cam_offset: get("cam.offset")?,
            cam_index: get("cam.index")?,
            shake_amt: get("cam.shake.amt")?,
            shake_speed: get("cam.shake.speed")?,
            fade: get("cm.fade")?,
            flash: get("cm.flash")?,
            overlay: get("cm.overlay")?,
            overlay_alpha: get("cm.overlay_alpha")?,
            pulse_amt: get("cm.pulse.amt")?,
            pulse_speed: get("cm.pulse.speed")?,
            map1: get("cm.map1")?,
            map2: get("cm.map2")?,
            map_lerp: get("cm.lerp")?,
            bloom_cutoff: get("bloom.cutoff")?,
            bloom_shape: get("bloom.shape")?,
            bloom_amt: get("bloom.amt")?,
            dist_amt: get("dist.amt")?,
            dist_freq: get("dist.freq")?,
            dist_offset: get("dist.offset")?,
            dof_fstop: get("dof.fstop")?,
            dof_flen: get("dof.flen")?,
            dof_fdist: get("dof.fdist")?,
        })
    }

    /// Evaluate every track at `row`
    pub fn sample(&self, timeline: &TimelineEvaluator, row: f64) -> FrameValues {
        let val = |handle: TrackHandle| timeline.evaluate(handle, row);
        // Discrete selectors truncate toward zero
        let int = |handle: TrackHandle| val(handle) as i32;

        FrameValues {
            row,
            part: int(self.part),
            camera: CameraValues {
                index: int(self.cam_index),
                distance: val(self.cam_dist),
                time: val(self.cam_time),
                offset: val(self.cam_offset),
                position: self.cam_pos.map(val),
                target: self.cam_at.map(val),
                roll_degrees: val(self.cam_roll),
                shake_amount: val(self.shake_amt),
                shake_speed: val(self.shake_speed),
            },
            grade: GradeValues {
                fade: val(self.fade),
                flash: val(self.flash),
                overlay: int(self.overlay),
                overlay_alpha: val(self.overlay_alpha),
                pulse_amount: val(self.pulse_amt),
                pulse_speed: val(self.pulse_speed),
                map1: int(self.map1),
                map2: int(self.map2),
                map_lerp: val(self.map_lerp),
            },
            bloom: BloomValues {
                cutoff: val(self.bloom_cutoff),
                shape: val(self.bloom_shape),
                amount: val(self.bloom_amt),
            },
            distortion: DistortionValues {
                amount: val(self.dist_amt),
                frequency: val(self.dist_freq),
                offset: val(self.dist_offset),
            },
            dof: DofValues {
                f_stop: val(self.dof_fstop),
                focal_length: val(self.dof_flen),
                focal_distance: val(self.dof_fdist),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sync::track::{Interpolation, Keyframe, Track};

    /// Timeline with every demo track present, each holding a single constant key
    pub(crate) fn constant_timeline(overrides: &[(&str, f32)]) -> TimelineEvaluator {
        let mut timeline = TimelineEvaluator::new();
        for name in TRACK_NAMES {
            let value = overrides
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0);
            timeline.insert(
                Track::from_keys(*name, vec![Keyframe::new(0, value, Interpolation::Step)]).unwrap(),
            );
        }
        timeline
    }

    #[test]
    fn test_names_are_unique() {
        let mut names = TRACK_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TRACK_NAMES.len());
    }

    #[test]
    fn test_resolve_fails_fast_on_missing_track() {
        let mut timeline = constant_timeline(&[]);
        assert!(DemoTracks::resolve(&timeline).is_ok());

        timeline = TimelineEvaluator::new();
        timeline.insert(Track::new("part"));
        assert!(matches!(
            DemoTracks::resolve(&timeline),
            Err(SyncError::UnknownTrack(name)) if name == "cam.dist"
        ));
    }

    #[test]
    fn test_sample() {
        let timeline = constant_timeline(&[
            ("part", 3.7),
            ("cam.index", -1.5),
            ("cam.at.y", 2.0),
            ("cm.map2", 5.9),
            ("bloom.amt", 0.25),
            ("dof.fdist", 40.0),
        ]);
        let tracks = DemoTracks::resolve(&timeline).unwrap();
        let values = tracks.sample(&timeline, 12.0);

        assert_eq!(values.row, 12.0);
        assert_eq!(values.part, 3);
        assert_eq!(values.camera.index, -1);
        assert_eq!(values.camera.target, [0.0, 2.0, 0.0]);
        assert_eq!(values.grade.map2, 5);
        assert_eq!(values.bloom.amount, 0.25);
        assert_eq!(values.dof.focal_distance, 40.0);
    }
}
