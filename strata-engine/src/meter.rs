//! Level monitor - per-track and master meter levels

use crate::session::Session;

/// One metering snapshot: peak level per track plus the master bus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Levels {
    pub tracks: Vec<f32>,
    pub master: f32,
}

impl Levels {
    fn silent(track_count: usize) -> Self {
        Self {
            tracks: vec![0.0; track_count],
            master: 0.0,
        }
    }

    pub fn track(&self, index: usize) -> f32 {
        self.tracks.get(index).copied().unwrap_or(0.0)
    }
}

/// Periodic sampler over the session's analyzer taps
///
/// Sampled once per display frame while playing; reports silence otherwise
/// so meters clear. Strictly read-only: it never influences scheduling,
/// mixer, or transport state.
#[derive(Debug, Default)]
pub struct LevelMonitor {
    last: Levels,
}

impl LevelMonitor {
    pub fn new(track_count: usize) -> Self {
        Self {
            last: Levels::silent(track_count),
        }
    }

    /// Read the analyzers and publish a fresh snapshot
    pub fn sample(&mut self, session: &Session, playing: bool) -> Levels {
        if !playing {
            self.last = Levels::silent(self.last.tracks.len().max(session.track_analyzers().len()));
            return self.last.clone();
        }

        self.last = Levels {
            tracks: session
                .track_analyzers()
                .iter()
                .map(|analyzer| analyzer.peak())
                .collect(),
            master: session.master_analyzer().peak(),
        };
        self.last.clone()
    }

    /// The most recently published snapshot
    pub fn levels(&self) -> &Levels {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::MixerState;
    use std::sync::Arc;
    use strata_arrange::{Arrangement, AudioBuffer, Clip, ClipId};

    const RATE: u32 = 48000;

    fn session_with_tone() -> Session {
        let buffer = Arc::new(AudioBuffer::new(RATE, 2, vec![0.5; RATE as usize * 2]));
        let mut arrangement = Arrangement::new();
        arrangement.insert(Clip::new(ClipId::new(1), "tone", 0, 0.0, buffer));

        let mixer = MixerState::new(2);
        let mut session = Session::new(&mixer, RATE);
        session.start(&arrangement, &mixer, 0.0);

        let mut output = vec![0.0f32; 2048];
        session.render(&mut output);
        session
    }

    #[test]
    fn test_levels_zero_when_not_playing() {
        let session = session_with_tone();
        let mut monitor = LevelMonitor::new(2);
        let levels = monitor.sample(&session, false);
        assert_eq!(levels.master, 0.0);
        assert!(levels.tracks.iter().all(|l| *l == 0.0));
    }

    #[test]
    fn test_levels_follow_analyzers_while_playing() {
        let session = session_with_tone();
        let mut monitor = LevelMonitor::new(2);
        let levels = monitor.sample(&session, true);

        assert!(levels.track(0) > 0.3, "sounding track meters, got {}", levels.track(0));
        assert_eq!(levels.track(1), 0.0);
        assert!(levels.master > 0.2);
        assert_eq!(monitor.levels(), &levels);
    }

    #[test]
    fn test_unknown_track_reads_zero() {
        let levels = Levels::silent(2);
        assert_eq!(levels.track(9), 0.0);
    }
}
