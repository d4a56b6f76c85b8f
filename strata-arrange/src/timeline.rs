//! Timeline configuration and the arrangement container

use crate::clip::{Clip, ClipId, ClipUpdate};
use tracing::debug;

/// Static timeline/session configuration
///
/// The track count is fixed for the lifetime of an engine session; the
/// pixel mapping serves the editing collaborator, which reports clip
/// positions back in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineConfig {
    pub pixels_per_second: f64,
    pub track_count: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            pixels_per_second: 40.0,
            track_count: 4,
        }
    }
}

impl TimelineConfig {
    pub fn time_to_pixels(&self, seconds: f64) -> f64 {
        seconds * self.pixels_per_second
    }

    pub fn pixels_to_time(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_second
    }

    /// Clamp a track index into the configured range
    pub fn clamp_track(&self, track: usize) -> usize {
        track.min(self.track_count.saturating_sub(1))
    }

    /// Total timeline width in pixels: at least `min_secs`, with headroom
    /// past the last clip for dragging
    pub fn timeline_width(&self, clips: &[Clip], min_secs: f64) -> f64 {
        let last_end = clips.iter().map(Clip::end).fold(0.0, f64::max);
        let min_width = min_secs * self.pixels_per_second;
        min_width.max(self.time_to_pixels(last_end + 10.0))
    }
}

/// The mutable clip set
///
/// Owned by the engine; mutated only through add/update/remove events from
/// the editing collaborator. Mutations clamp rather than reject, so the
/// arrangement is always in a playable state.
#[derive(Debug, Default)]
pub struct Arrangement {
    clips: Vec<Clip>,
}

impl Arrangement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clip built by the editing collaborator
    pub fn insert(&mut self, clip: Clip) {
        debug!(id = %clip.id, track = clip.track, start = clip.start, "clip added");
        self.clips.retain(|c| c.id != clip.id);
        self.clips.push(clip);
    }

    /// Apply a move/trim/track mutation event. Unknown ids are ignored.
    pub fn apply(&mut self, update: &ClipUpdate) -> bool {
        let Some(clip) = self.clips.iter_mut().find(|c| c.id == update.id) else {
            return false;
        };
        clip.move_to(update.start, update.track);
        clip.set_trim(update.trim_start, update.trim_end);
        true
    }

    /// Remove a clip, returning it if present
    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let pos = self.clips.iter().position(|c| c.id == id)?;
        debug!(id = %id, "clip removed");
        Some(self.clips.remove(pos))
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Timeline position where the last clip stops sounding
    pub fn end_secs(&self) -> f64 {
        self.clips.iter().map(Clip::end).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use std::sync::Arc;

    fn clip(id: u64, track: usize, start: f64, secs: f64) -> Clip {
        let frames = (secs * 48000.0) as usize;
        let buffer = Arc::new(AudioBuffer::new(48000, 2, vec![0.0; frames * 2]));
        Clip::new(ClipId::new(id), format!("clip-{id}"), track, start, buffer)
    }

    #[test]
    fn test_pixel_time_roundtrip() {
        let config = TimelineConfig::default();
        assert!((config.time_to_pixels(2.5) - 100.0).abs() < 1e-9);
        assert!((config.pixels_to_time(100.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_timeline_width_has_minimum() {
        let config = TimelineConfig::default();
        let width = config.timeline_width(&[], 30.0);
        assert!((width - 1200.0).abs() < 1e-9, "empty timeline should be 30s wide");
    }

    #[test]
    fn test_timeline_width_extends_past_last_clip() {
        let config = TimelineConfig::default();
        let clips = vec![clip(1, 0, 50.0, 4.0)];
        // clip ends at 54s, plus 10s headroom
        let width = config.timeline_width(&clips, 30.0);
        assert!((width - 64.0 * 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_track() {
        let config = TimelineConfig {
            track_count: 4,
            ..Default::default()
        };
        assert_eq!(config.clamp_track(0), 0);
        assert_eq!(config.clamp_track(9), 3);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut arr = Arrangement::new();
        arr.insert(clip(1, 0, 0.0, 2.0));
        arr.insert(clip(1, 2, 5.0, 2.0));
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.get(ClipId::new(1)).unwrap().track, 2);
    }

    #[test]
    fn test_apply_moves_and_trims() {
        let mut arr = Arrangement::new();
        arr.insert(clip(1, 0, 0.0, 4.0));

        let applied = arr.apply(&ClipUpdate {
            id: ClipId::new(1),
            start: 3.0,
            track: 1,
            trim_start: 1.0,
            trim_end: 3.5,
        });
        assert!(applied);

        let c = arr.get(ClipId::new(1)).unwrap();
        assert!((c.start - 3.0).abs() < 1e-9);
        assert_eq!(c.track, 1);
        assert!((c.trim_start - 1.0).abs() < 1e-9);
        assert!((c.trim_end - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_apply_unknown_id_is_ignored() {
        let mut arr = Arrangement::new();
        assert!(!arr.apply(&ClipUpdate {
            id: ClipId::new(42),
            start: 0.0,
            track: 0,
            trim_start: 0.0,
            trim_end: 1.0,
        }));
    }

    #[test]
    fn test_remove_and_end_secs() {
        let mut arr = Arrangement::new();
        arr.insert(clip(1, 0, 0.0, 5.0));
        arr.insert(clip(2, 1, 5.0, 5.0));
        assert!((arr.end_secs() - 10.0).abs() < 1e-9);

        assert!(arr.remove(ClipId::new(2)).is_some());
        assert!(arr.remove(ClipId::new(2)).is_none());
        assert!((arr.end_secs() - 5.0).abs() < 1e-9);
    }
}
