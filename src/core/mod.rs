//! Core arithmetic shared by every stage of the frame pipeline.
//!
//! Time is expressed in rows: a fractional timeline position derived from the
//! audio playback position through the tune's tempo.

pub mod noise;
pub mod time;

pub use noise::not_rand;
pub use time::{beat, row_rate, row_to_seconds, seconds_to_row, Row};
