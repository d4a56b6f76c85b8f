//! Arrangement model for Strata - clips, decoded buffers, and the timeline
//!
//! This crate owns the declarative side of the system:
//! - AudioBuffer: immutable decoded sample data shared between clips and voices
//! - Clip: a placed, trimmed reference to a buffer on a track
//! - Arrangement: the mutable clip set the playback engine reconciles against
//! - TimelineConfig: pixel <-> seconds mapping for the timeline editor

mod buffer;
mod clip;
mod timeline;

pub use buffer::{AudioBuffer, DecodeError, DecodedInfo, MediaDecoder};
pub use clip::{Clip, ClipId, ClipUpdate, MIN_TRIM_SPAN};
pub use timeline::{Arrangement, TimelineConfig};
