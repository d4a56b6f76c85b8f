//! Playback session - the live voice set and shared analyzers

use crate::analyzer::Analyzer;
use crate::mixer::MixerState;
use crate::voice::{build_voice, SmoothedParam, Voice};
use std::collections::HashMap;
use strata_arrange::{Arrangement, ClipId};
use tracing::{debug, trace};

/// Pre-allocated bus capacity in samples (2048 stereo frames)
const MAX_BUFFER_SIZE: usize = 4096;

/// The live set of active voices, keyed by clip identity
///
/// Voices own their source/pan/gain stages exclusively. The per-track and
/// master analyzers are the only stages shared across voices; they are
/// created once and reused across starts so restarting never churns the
/// metering taps.
pub struct Session {
    voices: HashMap<ClipId, Voice>,
    track_analyzers: Vec<Analyzer>,
    master_analyzer: Analyzer,
    master_gain: SmoothedParam,
    track_buses: Vec<Vec<f32>>,
    master_bus: Vec<f32>,
    sample_rate: u32,
}

impl Session {
    pub fn new(mixer: &MixerState, sample_rate: u32) -> Self {
        let track_count = mixer.track_count();
        Self {
            voices: HashMap::new(),
            track_analyzers: Vec::new(),
            master_analyzer: Analyzer::new(),
            master_gain: SmoothedParam::new(mixer.master_gain(), sample_rate),
            track_buses: vec![vec![0.0; MAX_BUFFER_SIZE]; track_count],
            master_bus: vec![0.0; MAX_BUFFER_SIZE],
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of voices still held by the session
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn voice(&self, id: ClipId) -> Option<&Voice> {
        self.voices.get(&id)
    }

    pub fn voice_ids(&self) -> impl Iterator<Item = ClipId> + '_ {
        self.voices.keys().copied()
    }

    pub fn track_analyzers(&self) -> &[Analyzer] {
        &self.track_analyzers
    }

    pub fn master_analyzer(&self) -> &Analyzer {
        &self.master_analyzer
    }

    /// Start voices for every eligible clip, relative to `from_time`.
    ///
    /// Any previously active voices are torn down first: a start never
    /// leaves two generations of voices alive. Returns the number of voices
    /// scheduled; zero means there is nothing audible to play.
    pub fn start(&mut self, arrangement: &Arrangement, mixer: &MixerState, from_time: f64) -> usize {
        self.stop_all();
        self.ensure_analyzers(mixer.track_count());

        let mut started = 0;
        for clip in arrangement.clips() {
            let Some(strip) = mixer.track(clip.track) else {
                continue;
            };
            let audible = mixer.is_audible(clip.track);
            if let Some(voice) = build_voice(clip, strip, audible, from_time, self.sample_rate) {
                trace!(
                    clip = %clip.id,
                    track = clip.track,
                    delay_frames = voice.delay_frames(),
                    offset_secs = voice.read_offset_secs(),
                    "voice scheduled"
                );
                self.voices.insert(clip.id, voice);
                started += 1;
            }
        }

        self.master_gain.set_target(mixer.master_gain());
        debug!(from_time, voices = started, "session started");
        started
    }

    /// Tear down every active voice. The analyzers survive for the next
    /// start; their windows are cleared so meters fall silent.
    pub fn stop_all(&mut self) {
        for voice in self.voices.values_mut() {
            voice.release();
        }
        self.voices.clear();
        for analyzer in &mut self.track_analyzers {
            analyzer.reset();
        }
        self.master_analyzer.reset();
    }

    /// Surgically stop one voice without touching the others. A no-op for
    /// unknown or already-finished clips.
    pub fn stop_one(&mut self, id: ClipId) {
        if let Some(mut voice) = self.voices.remove(&id) {
            debug!(clip = %id, "voice stopped");
            voice.release();
        }
    }

    /// Re-apply mixer state to every live voice in place (ramped), instead
    /// of rebuilding the graph
    pub fn apply_mixer(&mut self, mixer: &MixerState) {
        for voice in self.voices.values_mut() {
            let track = voice.track();
            if let Some(strip) = mixer.track(track) {
                let audible = mixer.is_audible(track);
                voice.set_gain_target(if audible { strip.volume } else { 0.0 });
                voice.set_pan_target(strip.pan);
            }
        }
        self.master_gain.set_target(mixer.master_gain());
    }

    /// One per track, idempotent; reused across starts within the session
    fn ensure_analyzers(&mut self, track_count: usize) {
        while self.track_analyzers.len() < track_count {
            self.track_analyzers.push(Analyzer::new());
        }
    }

    /// Render one block of interleaved stereo output.
    ///
    /// Voices mix additively into their track bus, each bus feeds its
    /// analyzer and the master sum, the smoothed master gain shapes the sum,
    /// and the master analyzer taps the result. Naturally completed voices
    /// are swept afterwards. No allocation on this path once the buses have
    /// grown to the device block size.
    pub fn render(&mut self, output: &mut [f32]) {
        let len = output.len();

        if len > self.master_bus.len() {
            for bus in &mut self.track_buses {
                bus.resize(len, 0.0);
            }
            self.master_bus.resize(len, 0.0);
        }

        for bus in &mut self.track_buses {
            bus[..len].fill(0.0);
        }
        self.master_bus[..len].fill(0.0);

        for voice in self.voices.values_mut() {
            let track = voice.track();
            if let Some(bus) = self.track_buses.get_mut(track) {
                voice.render_into(&mut bus[..len]);
            }
        }

        for (i, bus) in self.track_buses.iter().enumerate() {
            if let Some(analyzer) = self.track_analyzers.get_mut(i) {
                analyzer.push(&bus[..len]);
            }
            for (sum, sample) in self.master_bus[..len].iter_mut().zip(&bus[..len]) {
                *sum += sample;
            }
        }

        for frame in self.master_bus[..len].chunks_exact_mut(2) {
            let gain = self.master_gain.next();
            frame[0] *= gain;
            frame[1] *= gain;
        }
        self.master_analyzer.push(&self.master_bus[..len]);

        for (out, mixed) in output.iter_mut().zip(&self.master_bus[..len]) {
            *out = soft_clip(*mixed);
        }

        self.voices.retain(|_, voice| !voice.is_finished());
    }
}

/// Soft clip threshold - peaks below pass through untouched
const SOFT_CLIP_THRESHOLD: f32 = 0.75;
/// Soft clip ceiling for the monitoring bus
const SOFT_CLIP_CEILING: f32 = 0.89;

/// Gentle soft clipper for the master bus
///
/// Transparent below the threshold; peaks above are compressed along a
/// smooth exponential knee up to the ceiling.
#[inline(always)]
fn soft_clip(x: f32) -> f32 {
    let abs_x = x.abs();
    if abs_x <= SOFT_CLIP_THRESHOLD {
        return x;
    }

    let sign = x.signum();
    let knee_width = SOFT_CLIP_CEILING - SOFT_CLIP_THRESHOLD;
    let over = abs_x - SOFT_CLIP_THRESHOLD;
    let ratio = over / knee_width;

    let compressed = SOFT_CLIP_THRESHOLD + knee_width * (1.0 - (-ratio * 3.0).exp());
    sign * compressed.min(SOFT_CLIP_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_arrange::{AudioBuffer, Clip, ClipId};

    const RATE: u32 = 48000;

    fn tone_clip(id: u64, track: usize, start: f64, secs: f64) -> Clip {
        let frames = (secs * RATE as f64) as usize;
        let buffer = Arc::new(AudioBuffer::new(RATE, 2, vec![0.5; frames * 2]));
        Clip::new(ClipId::new(id), format!("clip-{id}"), track, start, buffer)
    }

    fn setup(clips: Vec<Clip>) -> (Arrangement, MixerState, Session) {
        let mut arrangement = Arrangement::new();
        for clip in clips {
            arrangement.insert(clip);
        }
        let mixer = MixerState::new(3);
        let session = Session::new(&mixer, RATE);
        (arrangement, mixer, session)
    }

    #[test]
    fn test_start_builds_one_voice_per_eligible_clip() {
        let (arrangement, mixer, mut session) = setup(vec![
            tone_clip(1, 0, 0.0, 2.0),
            tone_clip(2, 1, 5.0, 2.0),
        ]);
        let started = session.start(&arrangement, &mixer, 0.0);
        assert_eq!(started, 2);
        assert_eq!(session.active_voices(), 2);
        assert_eq!(session.track_analyzers().len(), 3);
    }

    #[test]
    fn test_start_skips_elapsed_and_unloaded_clips() {
        let mut clips = vec![tone_clip(1, 0, 0.0, 2.0)];
        clips.push(Clip::pending(ClipId::new(2), "loading", 1, 0.0));
        let (arrangement, mixer, mut session) = setup(clips);

        // clip 1 spans [0, 2); from 3s it has fully elapsed
        let started = session.start(&arrangement, &mixer, 3.0);
        assert_eq!(started, 0);
        assert!(session.is_empty());
    }

    #[test]
    fn test_start_skips_clips_on_unknown_tracks() {
        let (arrangement, mixer, mut session) = setup(vec![tone_clip(1, 7, 0.0, 2.0)]);
        assert_eq!(session.start(&arrangement, &mixer, 0.0), 0);
    }

    #[test]
    fn test_restart_leaves_single_generation() {
        let (arrangement, mixer, mut session) = setup(vec![
            tone_clip(1, 0, 0.0, 10.0),
            tone_clip(2, 1, 0.0, 10.0),
        ]);
        session.start(&arrangement, &mixer, 0.0);
        session.start(&arrangement, &mixer, 4.0);
        assert_eq!(
            session.active_voices(),
            2,
            "restart must never stack voice generations"
        );
        let voice = session.voice(ClipId::new(1)).unwrap();
        assert!((voice.read_offset_secs() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_all_keeps_analyzers() {
        let (arrangement, mixer, mut session) = setup(vec![tone_clip(1, 0, 0.0, 2.0)]);
        session.start(&arrangement, &mixer, 0.0);
        session.stop_all();
        assert!(session.is_empty());
        assert_eq!(session.track_analyzers().len(), 3);
        assert_eq!(session.master_analyzer().peak(), 0.0);
    }

    #[test]
    fn test_stop_one_is_surgical_and_idempotent() {
        let (arrangement, mixer, mut session) = setup(vec![
            tone_clip(1, 0, 0.0, 2.0),
            tone_clip(2, 1, 0.0, 2.0),
        ]);
        session.start(&arrangement, &mixer, 0.0);

        session.stop_one(ClipId::new(1));
        assert!(session.voice(ClipId::new(1)).is_none());
        assert!(session.voice(ClipId::new(2)).is_some());

        // stopping again, or stopping an unknown clip, is a no-op
        session.stop_one(ClipId::new(1));
        session.stop_one(ClipId::new(99));
        assert_eq!(session.active_voices(), 1);
    }

    #[test]
    fn test_apply_mixer_retargets_voices() {
        let (arrangement, mut mixer, mut session) = setup(vec![
            tone_clip(1, 0, 0.0, 2.0),
            tone_clip(2, 1, 0.0, 2.0),
        ]);
        session.start(&arrangement, &mixer, 0.0);

        mixer.toggle_track_solo(0);
        mixer.set_track_pan(0, -1.0);
        session.apply_mixer(&mixer);

        let soloed = session.voice(ClipId::new(1)).unwrap();
        assert!((soloed.gain_target() - 0.8).abs() < 1e-6);
        assert_eq!(soloed.pan_target(), -1.0);

        let other = session.voice(ClipId::new(2)).unwrap();
        assert_eq!(other.gain_target(), 0.0, "non-soloed voice ramps to silence");
    }

    #[test]
    fn test_render_feeds_track_and_master_analyzers() {
        let (arrangement, mixer, mut session) = setup(vec![tone_clip(1, 0, 0.0, 2.0)]);
        session.start(&arrangement, &mixer, 0.0);

        let mut output = vec![0.0f32; 1024];
        // several blocks so the smoothed gains settle
        for _ in 0..20 {
            session.render(&mut output);
        }

        assert!(session.track_analyzers()[0].peak() > 0.3);
        assert_eq!(
            session.track_analyzers()[1].peak(),
            0.0,
            "idle track stays silent"
        );
        assert!(session.master_analyzer().peak() > 0.2);
        assert!(output.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_render_sweeps_completed_voices() {
        let (arrangement, mixer, mut session) = setup(vec![tone_clip(1, 0, 0.0, 0.01)]);
        session.start(&arrangement, &mixer, 0.0);

        let mut output = vec![0.0f32; 4096];
        while !session.is_empty() {
            session.render(&mut output);
        }
        assert!(session.is_empty(), "finished voices are released");
    }

    #[test]
    fn test_render_with_no_voices_is_silence() {
        let (_, mixer, mut session) = setup(vec![]);
        let mut output = vec![0.7f32; 256];
        session.render(&mut output);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_soft_clip_transparent_below_threshold() {
        assert_eq!(soft_clip(0.5), 0.5);
        assert_eq!(soft_clip(-0.5), -0.5);
    }

    #[test]
    fn test_soft_clip_bounds_peaks() {
        assert!(soft_clip(2.0) <= SOFT_CLIP_CEILING);
        assert!(soft_clip(-2.0) >= -SOFT_CLIP_CEILING);
    }
}
