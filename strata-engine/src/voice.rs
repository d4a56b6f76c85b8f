//! Voices - the live signal chain rendering one sounding clip
//!
//! A voice owns exactly one source cursor into its clip's buffer, one pan
//! stage, and one gain stage. It is created by [`build_voice`] when playback
//! (re)starts, owned by the session keyed by clip id, and destroyed when it
//! completes naturally, is stopped, or its clip is removed.

use crate::mixer::TrackStrip;
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use strata_arrange::{AudioBuffer, Clip, ClipId};

/// Ramp time constant for live gain/pan updates, in seconds
const PARAM_TAU: f32 = 0.05;

/// One-pole parameter smoother
///
/// Live mixer changes retarget the smoother; the value then eases toward the
/// target over roughly [`PARAM_TAU`] so updates never step audibly.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedParam {
    pub(crate) fn new(value: f32, sample_rate: u32) -> Self {
        let coeff = (-1.0 / (PARAM_TAU * sample_rate.max(1) as f32)).exp();
        Self {
            current: value,
            target: value,
            coeff,
        }
    }

    pub(crate) fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub(crate) fn target(&self) -> f32 {
        self.target
    }

    /// Advance one frame and return the smoothed value
    pub(crate) fn next(&mut self) -> f32 {
        self.current = self.target + (self.current - self.target) * self.coeff;
        self.current
    }
}

/// The live chain rendering one currently-sounding clip
pub struct Voice {
    clip_id: ClipId,
    track: usize,
    buffer: Arc<AudioBuffer>,
    /// Read cursor in buffer frames; fractional for rate conversion
    cursor: f64,
    /// Exclusive end of the playable span, in buffer frames
    end_frame: f64,
    /// Buffer frames advanced per output frame
    step: f64,
    /// Output frames of silence left before the source starts sounding
    delay_frames: u64,
    pan: SmoothedParam,
    gain: SmoothedParam,
    finished: bool,
    released: bool,
}

impl Voice {
    pub fn clip_id(&self) -> ClipId {
        self.clip_id
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Remaining scheduling delay before the source sounds
    pub fn delay_frames(&self) -> u64 {
        self.delay_frames
    }

    /// Current read position in buffer seconds
    pub fn read_offset_secs(&self) -> f64 {
        self.cursor / self.buffer.sample_rate().max(1) as f64
    }

    pub fn gain_target(&self) -> f32 {
        self.gain.target()
    }

    pub fn pan_target(&self) -> f32 {
        self.pan.target()
    }

    /// Retarget the gain stage; ramped, never stepped
    pub fn set_gain_target(&mut self, gain: f32) {
        self.gain.set_target(gain);
    }

    /// Retarget the pan stage; ramped, never stepped
    pub fn set_pan_target(&mut self, pan: f32) {
        self.pan.set_target(pan);
    }

    /// Halt and detach the voice's stages.
    ///
    /// Teardown paths race (natural completion, explicit stop, reconcile,
    /// deletion); releasing an already-released voice is a safe no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.finished = true;
    }

    /// Mix this voice into a track bus (interleaved stereo, additive)
    pub fn render_into(&mut self, bus: &mut [f32]) {
        if self.finished {
            return;
        }
        let samples = self.buffer.samples();

        for frame in bus.chunks_exact_mut(2) {
            // ramps keep converging through the scheduling delay
            let gain = self.gain.next();
            let pan = self.pan.next();

            if self.delay_frames > 0 {
                self.delay_frames -= 1;
                continue;
            }
            if self.cursor >= self.end_frame {
                self.finished = true;
                break;
            }

            let pos = self.cursor as usize;
            let frac = (self.cursor - pos as f64) as f32;
            let i = pos * 2;
            if i + 1 >= samples.len() {
                self.finished = true;
                break;
            }

            let (l0, r0) = (samples[i], samples[i + 1]);
            let (l, r) = if i + 3 < samples.len() {
                (
                    l0 + frac * (samples[i + 2] - l0),
                    r0 + frac * (samples[i + 3] - r0),
                )
            } else {
                (l0, r0)
            };

            let (out_l, out_r) = pan_stereo(l * gain, r * gain, pan);
            frame[0] += out_l;
            frame[1] += out_r;

            self.cursor += self.step;
        }
    }
}

/// Equal-power stereo pan: center passes through at unity, the far sides
/// fold the opposite channel in
#[inline]
fn pan_stereo(l: f32, r: f32, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan <= 0.0 {
        let x = (pan + 1.0) * FRAC_PI_2;
        (l + r * x.cos(), r * x.sin())
    } else {
        let x = pan * FRAC_PI_2;
        (l * x.cos(), r + l * x.sin())
    }
}

/// Build the voice for one clip, scheduled relative to `from_time`.
///
/// Returns `None` when the clip has no decoded buffer yet, or when the clip
/// has fully elapsed relative to `from_time` (nothing left to sound).
pub fn build_voice(
    clip: &Clip,
    strip: &TrackStrip,
    audible: bool,
    from_time: f64,
    engine_rate: u32,
) -> Option<Voice> {
    let buffer = clip.buffer.as_ref()?.clone();

    let (delay, offset) = if from_time < clip.start {
        (clip.start - from_time, clip.trim_start)
    } else {
        (0.0, clip.trim_start + (from_time - clip.start))
    };

    let remaining = clip.trim_end - offset;
    if remaining <= 0.0 {
        return None;
    }

    let buffer_rate = buffer.sample_rate().max(1) as f64;
    let end_frame = (clip.trim_end * buffer_rate).min(buffer.frames() as f64);
    let initial_gain = if audible { strip.volume } else { 0.0 };

    Some(Voice {
        clip_id: clip.id,
        track: clip.track,
        cursor: offset * buffer_rate,
        end_frame,
        step: buffer_rate / engine_rate.max(1) as f64,
        delay_frames: (delay * engine_rate as f64).round() as u64,
        pan: SmoothedParam::new(strip.pan, engine_rate),
        gain: SmoothedParam::new(initial_gain, engine_rate),
        buffer,
        finished: false,
        released: false,
    })
}
