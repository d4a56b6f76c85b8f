//! Transport - play/pause/stop/seek state and the timeline clock
//!
//! The hardware clock is the monotonic count of frames the audio callback
//! has rendered. While playing, the timeline position is derived from that
//! clock; paused and stopped positions are pinned values. Seeking while
//! playing is a two-phase operation: voices are torn down immediately, the
//! restart is deferred to the next display frame so the device clock
//! settles, and the seeking flag clears one frame after the restart.

use tracing::debug;

/// Playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Phases of the deferred restart after a seek-while-playing
#[derive(Debug, Clone, Copy, PartialEq)]
enum SeekPhase {
    Idle,
    /// Voices are down; restart from this position on the next frame tick
    PendingRestart(f64),
    /// Restart issued; the seeking flag clears on the following tick
    Settling,
}

/// The play/pause/stop/seek state machine and its position clock
pub struct Transport {
    state: TransportState,
    /// Pinned position, authoritative whenever the clock is not advancing
    position: f64,
    /// Hardware frame count when the current run began
    run_start_frames: u64,
    /// Timeline offset when the current run began
    run_start_offset: f64,
    seeking: bool,
    phase: SeekPhase,
    sample_rate: u32,
}

impl Transport {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0.0,
            run_start_frames: 0,
            run_start_offset: 0.0,
            seeking: false,
            phase: SeekPhase::Idle,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    /// Timeline position in seconds at the given hardware frame count
    pub fn position(&self, frames_now: u64) -> f64 {
        if self.state == TransportState::Playing && !self.seeking {
            let elapsed = frames_now.saturating_sub(self.run_start_frames);
            self.run_start_offset + elapsed as f64 / self.sample_rate as f64
        } else {
            self.position
        }
    }

    /// Enter Playing with fresh run bookkeeping from `from`
    pub fn begin_run(&mut self, from: f64, frames_now: u64) {
        self.state = TransportState::Playing;
        self.run_start_frames = frames_now;
        self.run_start_offset = from;
        self.position = from;
        debug!(from, "transport playing");
    }

    /// Freeze the position and enter Paused
    pub fn pause(&mut self, frames_now: u64) {
        self.position = self.position(frames_now);
        self.state = TransportState::Paused;
        self.seeking = false;
        self.phase = SeekPhase::Idle;
        debug!(position = self.position, "transport paused");
    }

    /// Enter Stopped and reset the position to zero
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.seeking = false;
        self.phase = SeekPhase::Idle;
        debug!("transport stopped");
    }

    /// Enter Stopped but keep the position, e.g. when every voice completed
    /// naturally or a start found nothing to play
    pub fn halt_at(&mut self, position: f64) {
        self.state = TransportState::Stopped;
        self.position = position.max(0.0);
        self.seeking = false;
        self.phase = SeekPhase::Idle;
        debug!(position = self.position, "transport halted");
    }

    /// Move the position to `t` immediately.
    ///
    /// While playing this arms the deferred restart: the position reads `t`
    /// right away (the run clock is suppressed by the seeking flag), and the
    /// session restarts on the next frame tick. While paused or stopped only
    /// the position moves.
    pub fn begin_seek(&mut self, t: f64) {
        self.position = t.max(0.0);
        if self.state == TransportState::Playing {
            self.seeking = true;
            self.phase = SeekPhase::PendingRestart(self.position);
            debug!(target = self.position, "seek armed, restart deferred");
        }
    }

    /// Advance the deferred-restart machine by one display frame. Returns
    /// the position to restart the session from, on exactly one tick per
    /// seek.
    pub fn tick_seek(&mut self) -> Option<f64> {
        match self.phase {
            SeekPhase::PendingRestart(t) => {
                self.phase = SeekPhase::Settling;
                Some(t)
            }
            SeekPhase::Settling => {
                self.seeking = false;
                self.phase = SeekPhase::Idle;
                None
            }
            SeekPhase::Idle => None,
        }
    }
}
