//! Engine state machine and its command/event surface
//!
//! The UI layer talks to the engine exclusively through [`EngineCommand`]
//! sends on a bounded channel; the engine answers with [`EngineEvent`]
//! snapshots. Every call is non-blocking and schedules effects rather than
//! awaiting them. The audio callback only ever touches
//! [`EngineState::process`]; all other state changes run on the engine's
//! command loop.

use crate::meter::{LevelMonitor, Levels};
use crate::mixer::MixerState;
use crate::reconcile::Reconciler;
use crate::session::Session;
use crate::transport::{Transport, TransportState};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_arrange::{Arrangement, Clip, ClipId, ClipUpdate, TimelineConfig};
use tracing::debug;

/// Commands accepted by the engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    // Transport
    Play,
    Pause,
    Stop,
    Seek(f64),
    /// Display-frame signal: drives the deferred seek restart, the
    /// natural-completion sweep, and metering
    FrameTick,

    // Arrangement (from the clip-editing collaborator)
    AddClip(Clip),
    UpdateClip(ClipUpdate),
    RemoveClip(ClipId),

    // Mixer
    SetTrackVolume(usize, f32),
    SetTrackPan(usize, f32),
    ToggleTrackMute(usize),
    ToggleTrackSolo(usize),
    SetMasterVolume(f32),
    ToggleMasterMute,

    // System
    Shutdown,
}

/// Transport view for the UI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub playing: bool,
    pub position: f64,
}

/// Events published by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Periodic snapshot for UI rendering
    StateUpdate {
        transport: TransportSnapshot,
        levels: Levels,
    },
    /// Device or stream failure
    Error(String),
}

/// Engine state, owned by the engine thread
///
/// The arrangement, mixer, session, transport, and reconciler live together
/// behind one lock; the audio callback renders through [`Self::process`]
/// and everything else arrives as commands.
pub struct EngineState {
    arrangement: Arrangement,
    mixer: MixerState,
    session: Session,
    transport: Transport,
    reconciler: Reconciler,
    monitor: LevelMonitor,
    /// Frames rendered since stream start - the hardware clock
    frames_rendered: u64,
    sample_rate: u32,
}

impl EngineState {
    pub fn new(config: &TimelineConfig, sample_rate: u32) -> Self {
        let mixer = MixerState::new(config.track_count);
        let session = Session::new(&mixer, sample_rate);
        Self {
            arrangement: Arrangement::new(),
            mixer,
            session,
            transport: Transport::new(sample_rate),
            reconciler: Reconciler::new(),
            monitor: LevelMonitor::new(config.track_count),
            frames_rendered: 0,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn mixer(&self) -> &MixerState {
        &self.mixer
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Current timeline position in seconds
    pub fn position(&self) -> f64 {
        self.transport.position(self.frames_rendered)
    }

    /// Process a command
    pub fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Play => self.play(),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Stop => self.stop(),
            EngineCommand::Seek(t) => self.seek(t),
            EngineCommand::FrameTick => self.frame_tick(),

            EngineCommand::AddClip(clip) => {
                self.arrangement.insert(clip);
                self.reconcile();
            }
            EngineCommand::UpdateClip(update) => {
                self.arrangement.apply(&update);
                self.reconcile();
            }
            EngineCommand::RemoveClip(id) => {
                self.arrangement.remove(id);
                self.reconcile();
            }

            EngineCommand::SetTrackVolume(i, v) => {
                self.mixer.set_track_volume(i, v);
                self.session.apply_mixer(&self.mixer);
            }
            EngineCommand::SetTrackPan(i, p) => {
                self.mixer.set_track_pan(i, p);
                self.session.apply_mixer(&self.mixer);
            }
            EngineCommand::ToggleTrackMute(i) => {
                self.mixer.toggle_track_mute(i);
                self.session.apply_mixer(&self.mixer);
            }
            EngineCommand::ToggleTrackSolo(i) => {
                self.mixer.toggle_track_solo(i);
                self.session.apply_mixer(&self.mixer);
            }
            EngineCommand::SetMasterVolume(v) => {
                self.mixer.set_master_volume(v);
                self.session.apply_mixer(&self.mixer);
            }
            EngineCommand::ToggleMasterMute => {
                self.mixer.toggle_master_mute();
                self.session.apply_mixer(&self.mixer);
            }

            EngineCommand::Shutdown => {} // Handled at higher level
        }
    }

    fn play(&mut self) {
        let from = self.position();
        self.start_session(from);
    }

    fn pause(&mut self) {
        if !self.transport.is_playing() {
            return;
        }
        self.session.stop_all();
        self.transport.pause(self.frames_rendered);
    }

    fn stop(&mut self) {
        self.session.stop_all();
        self.transport.stop();
    }

    /// Two-phase seek: the position moves now; while playing, voices come
    /// down now and the session restarts on the next frame tick
    fn seek(&mut self, t: f64) {
        if self.transport.is_playing() {
            self.session.stop_all();
        }
        self.transport.begin_seek(t);
    }

    fn frame_tick(&mut self) {
        if let Some(t) = self.transport.tick_seek() {
            self.start_session(t);
            return;
        }
        if self.transport.is_playing()
            && !self.transport.is_seeking()
            && self.session.is_empty()
        {
            // every voice completed naturally
            let position = self.position();
            self.transport.halt_at(position);
        }
    }

    fn start_session(&mut self, from: f64) {
        let started = self.session.start(&self.arrangement, &self.mixer, from);
        if started > 0 {
            self.transport.begin_run(from, self.frames_rendered);
        } else {
            // nothing audible to play
            self.transport.halt_at(from);
        }
    }

    fn reconcile(&mut self) {
        let action = self.reconciler.reconcile(
            self.arrangement.clips(),
            self.transport.is_playing(),
            self.transport.is_seeking(),
        );
        for id in &action.removed {
            self.session.stop_one(*id);
        }
        if action.rebuild {
            let position = self.position();
            debug!(position, "surviving clip changed, rebuilding session");
            self.session.stop_all();
            self.start_session(position);
        }
    }

    /// Render one block of interleaved stereo output and advance the
    /// hardware clock. Called from the audio callback.
    pub fn process(&mut self, output: &mut [f32]) {
        self.session.render(output);
        self.frames_rendered += (output.len() / 2) as u64;
    }

    /// Snapshot transport and levels for UI rendering
    pub fn get_state(&mut self) -> EngineEvent {
        let playing = self.transport.is_playing();
        let levels = self.monitor.sample(&self.session, playing);
        EngineEvent::StateUpdate {
            transport: TransportSnapshot {
                playing,
                position: self.transport.position(self.frames_rendered),
            },
            levels,
        }
    }
}

/// Handle to communicate with the engine thread
pub struct AudioEngine {
    /// Send commands to the engine thread
    pub command_tx: Sender<EngineCommand>,
    /// Receive events from the engine thread
    pub event_rx: Receiver<EngineEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
}

impl AudioEngine {
    /// Create channels for engine communication.
    /// Buffer size of 1024 gives headroom for command bursts.
    pub fn create_channels() -> (
        Sender<EngineCommand>,
        Receiver<EngineCommand>,
        Sender<EngineEvent>,
        Receiver<EngineEvent>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(1024);
        let (evt_tx, evt_rx) = bounded(1024);
        (cmd_tx, cmd_rx, evt_tx, evt_rx)
    }

    /// Create a new engine handle
    pub fn new(command_tx: Sender<EngineCommand>, event_rx: Receiver<EngineEvent>) -> Self {
        Self {
            command_tx,
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send a command, never blocking the caller
    pub fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.try_send(cmd);
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.try_send(EngineCommand::Shutdown);
    }
}
