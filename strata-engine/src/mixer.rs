//! Mixer state - track strips, master strip, and audibility

/// One mixer channel strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackStrip {
    pub index: usize,
    /// 0.0 - 1.0
    pub volume: f32,
    /// -1.0 (full left) - 1.0 (full right)
    pub pan: f32,
    pub muted: bool,
    pub solo: bool,
}

impl TrackStrip {
    fn new(index: usize) -> Self {
        Self {
            index,
            volume: 0.8,
            pan: 0.0,
            muted: false,
            solo: false,
        }
    }
}

/// The master bus strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterStrip {
    /// 0.0 - 1.0
    pub volume: f32,
    pub muted: bool,
}

impl Default for MasterStrip {
    fn default() -> Self {
        Self {
            volume: 0.8,
            muted: false,
        }
    }
}

/// Per-track and master mixer state
///
/// The strip set is created once per session and fixed in size. Writes clamp
/// silently to legal ranges; out-of-range track indices are no-ops.
/// Audibility is derived on every query, never cached, since mute/solo
/// changes arrive asynchronously relative to playback.
#[derive(Debug, Clone)]
pub struct MixerState {
    tracks: Vec<TrackStrip>,
    master: MasterStrip,
}

impl MixerState {
    pub fn new(track_count: usize) -> Self {
        Self {
            tracks: (0..track_count).map(TrackStrip::new).collect(),
            master: MasterStrip::default(),
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&TrackStrip> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[TrackStrip] {
        &self.tracks
    }

    pub fn master(&self) -> &MasterStrip {
        &self.master
    }

    pub fn set_track_volume(&mut self, index: usize, volume: f32) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn set_track_pan(&mut self, index: usize, pan: f32) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn toggle_track_mute(&mut self, index: usize) {
        if let Some(track) = self.tracks.get_mut(index) {
            track.muted = !track.muted;
        }
    }

    /// Toggle solo on a track. Solo is exclusive: engaging it clears solo on
    /// every other track; disengaging the only soloed track returns the
    /// mixer to its no-solo state.
    pub fn toggle_track_solo(&mut self, index: usize) {
        if index >= self.tracks.len() {
            return;
        }
        let was_solo = self.tracks[index].solo;
        if was_solo {
            self.tracks[index].solo = false;
        } else {
            for (i, track) in self.tracks.iter_mut().enumerate() {
                track.solo = i == index;
            }
        }
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master.volume = volume.clamp(0.0, 1.0);
    }

    pub fn toggle_master_mute(&mut self) {
        self.master.muted = !self.master.muted;
    }

    /// Whether the given track currently reaches the output.
    ///
    /// False when the master or the track is muted. When any solo is
    /// engaged, only the soloed track is audible.
    pub fn is_audible(&self, index: usize) -> bool {
        if self.master.muted {
            return false;
        }
        let Some(track) = self.tracks.get(index) else {
            return false;
        };
        if track.muted {
            return false;
        }
        if self.tracks.iter().any(|t| t.solo) {
            return track.solo;
        }
        true
    }

    /// Net track gain: `track volume * master volume` when audible, else 0
    pub fn effective_gain(&self, index: usize) -> f32 {
        match self.tracks.get(index) {
            Some(track) if self.is_audible(index) => track.volume * self.master.volume,
            _ => 0.0,
        }
    }

    /// Gain applied at the master stage
    pub fn master_gain(&self) -> f32 {
        if self.master.muted {
            0.0
        } else {
            self.master.volume
        }
    }
}
