//! Playback and mixing engine for Strata
//!
//! This crate turns a declarative clip/track arrangement into a live audio
//! signal graph and keeps the two synchronized while either changes:
//! - Mixer: per-track volume/pan/mute/solo strips and the master strip
//! - Voice: the live chain rendering one sounding clip (source -> pan -> gain)
//! - Session: the active voice set keyed by clip id, plus shared analyzers
//! - Transport: play/pause/stop/seek state and the timeline clock
//! - Reconciler: adapts the live voice graph to arrangement changes
//! - LevelMonitor: per-track and master peak levels for metering

mod analyzer;
mod engine;
mod meter;
mod mixer;
mod reconcile;
mod session;
mod transport;
mod voice;

pub use analyzer::{Analyzer, ANALYZER_WINDOW};
pub use engine::{AudioEngine, EngineCommand, EngineEvent, EngineState, TransportSnapshot};
pub use meter::{LevelMonitor, Levels};
pub use mixer::{MasterStrip, MixerState, TrackStrip};
pub use reconcile::{ReconcileAction, Reconciler};
pub use session::Session;
pub use transport::{Transport, TransportState};
pub use voice::{build_voice, Voice};
