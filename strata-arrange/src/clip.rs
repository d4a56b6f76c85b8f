//! Clips - placed, trimmed references to decoded buffers

use crate::buffer::AudioBuffer;
use std::fmt;
use std::sync::Arc;

/// Smallest trim window a clip can be reduced to, in seconds.
/// Collapse requests clamp to this span instead of failing.
pub const MIN_TRIM_SPAN: f64 = 0.1;

/// Clip identity, allocated by the editing collaborator and stable for the
/// clip's whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(u64);

impl ClipId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip-{}", self.0)
    }
}

/// A move/trim/track mutation event from the editing collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipUpdate {
    pub id: ClipId,
    pub start: f64,
    pub track: usize,
    pub trim_start: f64,
    pub trim_end: f64,
}

/// A placed, trimmed reference to a decoded buffer on a track
///
/// `start` is the timeline position in seconds (the editor derives it from
/// pixel x / pixels-per-second). The trim window selects the audible region
/// of the buffer: `0 <= trim_start < trim_end <= buffer duration`. The
/// buffer is absent while the clip's audio is still loading.
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub start: f64,
    pub track: usize,
    pub trim_start: f64,
    pub trim_end: f64,
    pub buffer: Option<Arc<AudioBuffer>>,
}

impl Clip {
    /// Create a clip over a fully decoded buffer, trimmed to the whole buffer
    pub fn new(
        id: ClipId,
        name: impl Into<String>,
        track: usize,
        start: f64,
        buffer: Arc<AudioBuffer>,
    ) -> Self {
        let duration = buffer.duration_secs();
        Self {
            id,
            name: name.into(),
            start: start.max(0.0),
            track,
            trim_start: 0.0,
            trim_end: duration,
            buffer: Some(buffer),
        }
    }

    /// Create a clip whose audio has not finished decoding yet
    pub fn pending(id: ClipId, name: impl Into<String>, track: usize, start: f64) -> Self {
        Self {
            id,
            name: name.into(),
            start: start.max(0.0),
            track,
            trim_start: 0.0,
            trim_end: 0.0,
            buffer: None,
        }
    }

    /// Attach the decoded buffer once loading completes; resets the trim
    /// window to the full buffer
    pub fn attach_buffer(&mut self, buffer: Arc<AudioBuffer>) {
        self.trim_start = 0.0;
        self.trim_end = buffer.duration_secs();
        self.buffer = Some(buffer);
    }

    /// Audible duration in seconds
    pub fn duration(&self) -> f64 {
        self.trim_end - self.trim_start
    }

    /// Timeline position where the clip stops sounding
    pub fn end(&self) -> f64 {
        self.start + self.duration()
    }

    /// Reposition the clip on the timeline
    pub fn move_to(&mut self, start: f64, track: usize) {
        self.start = start.max(0.0);
        self.track = track;
    }

    /// Apply a trim request, clamped to the legal window.
    ///
    /// A request that would collapse the span (`trim_start >= trim_end`)
    /// clamps to [`MIN_TRIM_SPAN`] instead of being rejected.
    pub fn set_trim(&mut self, trim_start: f64, trim_end: f64) {
        let limit = self.buffer.as_ref().map(|b| b.duration_secs());

        let mut start = trim_start.max(0.0);
        let mut end = match limit {
            Some(d) => trim_end.min(d),
            None => trim_end,
        };

        if end - start < MIN_TRIM_SPAN {
            end = start + MIN_TRIM_SPAN;
            if let Some(d) = limit {
                if end > d {
                    end = d;
                    start = (d - MIN_TRIM_SPAN).max(0.0);
                }
            }
        }

        self.trim_start = start;
        self.trim_end = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(secs: f64) -> Arc<AudioBuffer> {
        let frames = (secs * 48000.0) as usize;
        Arc::new(AudioBuffer::new(48000, 2, vec![0.0; frames * 2]))
    }

    #[test]
    fn test_new_clip_trims_to_full_buffer() {
        let clip = Clip::new(ClipId::new(1), "kick", 0, 2.0, buffer(4.0));
        assert_eq!(clip.trim_start, 0.0);
        assert!((clip.trim_end - 4.0).abs() < 1e-9);
        assert!((clip.duration() - 4.0).abs() < 1e-9);
        assert!((clip.end() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_start_clamps_to_zero() {
        let mut clip = Clip::new(ClipId::new(1), "kick", 0, -3.0, buffer(1.0));
        assert_eq!(clip.start, 0.0);
        clip.move_to(-1.0, 2);
        assert_eq!(clip.start, 0.0);
        assert_eq!(clip.track, 2);
    }

    #[test]
    fn test_trim_clamps_to_buffer_duration() {
        let mut clip = Clip::new(ClipId::new(1), "pad", 0, 0.0, buffer(2.0));
        clip.set_trim(0.5, 10.0);
        assert!((clip.trim_start - 0.5).abs() < 1e-9);
        assert!((clip.trim_end - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_collapsed_trim_clamps_to_minimum_span() {
        let mut clip = Clip::new(ClipId::new(1), "pad", 0, 0.0, buffer(2.0));
        clip.set_trim(1.0, 1.0);
        assert!(
            clip.duration() >= MIN_TRIM_SPAN - 1e-9,
            "collapsed trim should clamp to minimum span, got {}",
            clip.duration()
        );
        assert!((clip.trim_start - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_trim_near_buffer_end_stays_in_bounds() {
        let mut clip = Clip::new(ClipId::new(1), "pad", 0, 0.0, buffer(2.0));
        clip.set_trim(1.98, 1.95);
        assert!(clip.trim_end <= 2.0 + 1e-9);
        assert!(clip.trim_start >= 0.0);
        assert!(clip.duration() >= MIN_TRIM_SPAN - 1e-9);
    }

    #[test]
    fn test_attach_buffer_resets_trim() {
        let mut clip = Clip::pending(ClipId::new(7), "loading", 1, 5.0);
        assert!(clip.buffer.is_none());
        assert_eq!(clip.duration(), 0.0);

        clip.attach_buffer(buffer(3.0));
        assert!(clip.buffer.is_some());
        assert!((clip.trim_end - 3.0).abs() < 1e-9);
    }
}
