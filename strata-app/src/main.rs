//! Strata - headless timeline playback monitoring host
//!
//! Builds a small demo arrangement from synthesized tone buffers, drives the
//! playback engine at display-frame cadence, and logs transport position and
//! meter levels until the arrangement finishes sounding.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use strata_arrange::{AudioBuffer, Clip, ClipId, TimelineConfig};
use strata_engine::{AudioEngine, EngineCommand, EngineEvent, EngineState};

/// Display-frame rate driving the engine tick
const FPS: u64 = 60;

/// Sample rate of the synthesized demo buffers; the engine resamples to the
/// device rate at playback time
const DEMO_RATE: u32 = 48_000;

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Multitrack timeline playback engine - demo host")]
struct Args {
    /// Number of mixer tracks
    #[arg(long, default_value_t = 4)]
    tracks: usize,

    /// Timeline position to start playback from, in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Maximum run time before the host shuts down, in seconds
    #[arg(long, default_value_t = 30.0)]
    max_secs: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.tracks > 0, "at least one track is required");

    let config = TimelineConfig {
        track_count: args.tracks,
        ..Default::default()
    };

    // Create engine channels
    let (cmd_tx, cmd_rx, evt_tx, evt_rx) = AudioEngine::create_channels();

    // Shutdown flag
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_audio = shutdown.clone();

    // Spawn the engine thread (owns the device stream and the command loop)
    let audio_handle = thread::spawn(move || {
        run_engine_thread(cmd_rx, evt_tx, shutdown_audio, config);
    });

    // Engine handle for the host loop
    let engine = AudioEngine::new(cmd_tx, evt_rx);

    let result = run_host(&engine, &args);

    shutdown.store(true, Ordering::SeqCst);
    engine.shutdown();
    let _ = audio_handle.join();

    result
}

/// Engine thread: device stream plus the command loop
fn run_engine_thread(
    cmd_rx: Receiver<EngineCommand>,
    evt_tx: Sender<EngineEvent>,
    shutdown: Arc<AtomicBool>,
    config: TimelineConfig,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(d) => d,
        None => {
            let _ = evt_tx.send(EngineEvent::Error("No audio output device found".into()));
            return;
        }
    };

    let stream_config = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = evt_tx.send(EngineEvent::Error(format!(
                "Failed to get audio config: {}",
                e
            )));
            return;
        }
    };

    let sample_rate = stream_config.sample_rate().0;
    let channels = stream_config.channels() as usize;
    info!(sample_rate, channels, "audio device ready");

    let engine_state = Arc::new(Mutex::new(EngineState::new(&config, sample_rate)));
    let engine_for_callback = engine_state.clone();

    // Pre-allocated stereo buffer for non-stereo device layouts
    let mut stereo_buffer = vec![0.0f32; 16384];

    let stream = device.build_output_stream(
        &stream_config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            // try_lock only: on contention the callback outputs silence
            // rather than blocking the real-time thread
            if let Some(mut state) = engine_for_callback.try_lock() {
                if channels == 2 {
                    state.process(data);
                } else {
                    let frames = data.len() / channels;
                    let stereo_len = frames * 2;
                    if stereo_buffer.len() < stereo_len {
                        stereo_buffer.resize(stereo_len, 0.0);
                    }
                    let stereo = &mut stereo_buffer[..stereo_len];
                    state.process(stereo);
                    for (frame, out) in stereo.chunks_exact(2).zip(data.chunks_exact_mut(channels))
                    {
                        match channels {
                            1 => out[0] = (frame[0] + frame[1]) * 0.5,
                            _ => {
                                out[0] = frame[0];
                                out[1] = frame[1];
                                for extra in &mut out[2..] {
                                    *extra = 0.0;
                                }
                            }
                        }
                    }
                }
            } else {
                data.fill(0.0);
            }
        },
        |err| {
            error!("audio stream error: {}", err);
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = evt_tx.send(EngineEvent::Error(format!(
                "Failed to create audio stream: {}",
                e
            )));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = evt_tx.send(EngineEvent::Error(format!("Failed to start audio: {}", e)));
        return;
    }

    // Command loop
    while !shutdown.load(Ordering::Relaxed) {
        match cmd_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(EngineCommand::Shutdown) => break,
            Ok(EngineCommand::FrameTick) => {
                let mut state = engine_state.lock();
                state.handle_command(EngineCommand::FrameTick);
                let _ = evt_tx.try_send(state.get_state());
            }
            Ok(cmd) => {
                engine_state.lock().handle_command(cmd);
            }
            Err(_) => {}
        }
    }
}

/// Host loop: build the demo arrangement, drive frame ticks, log meters
fn run_host(engine: &AudioEngine, args: &Args) -> anyhow::Result<()> {
    for clip in demo_clips(args.tracks) {
        info!(name = %clip.name, track = clip.track, start = clip.start, "adding demo clip");
        engine.send(EngineCommand::AddClip(clip));
    }

    // Spread the demo across the stereo field
    engine.send(EngineCommand::SetTrackPan(0, -0.4));
    if args.tracks > 2 {
        engine.send(EngineCommand::SetTrackPan(2, 0.4));
    }

    if args.start > 0.0 {
        engine.send(EngineCommand::Seek(args.start));
    }
    engine.send(EngineCommand::Play);

    let frame_duration = Duration::from_millis(1000 / FPS);
    let started_at = Instant::now();
    let mut frame: u64 = 0;
    let mut heard_playback = false;

    loop {
        engine.send(EngineCommand::FrameTick);

        while let Ok(event) = engine.event_rx.try_recv() {
            match event {
                EngineEvent::StateUpdate { transport, levels } => {
                    if transport.playing {
                        heard_playback = true;
                    }
                    if frame % FPS == 0 && transport.playing {
                        let tracks: Vec<String> =
                            levels.tracks.iter().map(|l| format!("{l:.2}")).collect();
                        info!(
                            "position {:6.2}s  master {:.2}  tracks [{}]",
                            transport.position,
                            levels.master,
                            tracks.join(" ")
                        );
                    }
                    if heard_playback && !transport.playing {
                        info!("arrangement finished at {:.2}s", transport.position);
                        return Ok(());
                    }
                }
                EngineEvent::Error(message) => {
                    error!("engine error: {message}");
                    anyhow::bail!("engine error: {message}");
                }
            }
        }

        if started_at.elapsed().as_secs_f64() > args.max_secs {
            warn!("run limit reached, shutting down");
            return Ok(());
        }

        frame = frame.wrapping_add(1);
        thread::sleep(frame_duration);
    }
}

/// Build the demo arrangement: staggered tones across the first tracks
fn demo_clips(tracks: usize) -> Vec<Clip> {
    let notes = [
        ("a4", 440.00),
        ("c#5", 554.37),
        ("e5", 659.25),
        ("a5", 880.00),
    ];

    notes
        .iter()
        .take(tracks)
        .enumerate()
        .map(|(i, (name, freq))| {
            Clip::new(
                ClipId::new(i as u64 + 1),
                *name,
                i,
                i as f64 * 2.0,
                tone(*freq, 4.0, 0.4),
            )
        })
        .collect()
}

/// Synthesize a stereo sine buffer with short fades at both edges
fn tone(freq: f32, secs: f64, amplitude: f32) -> Arc<AudioBuffer> {
    let frames = (secs * DEMO_RATE as f64) as usize;
    let fade = (DEMO_RATE / 100) as usize; // 10ms edges
    let mut samples = Vec::with_capacity(frames * 2);

    for i in 0..frames {
        let t = i as f32 / DEMO_RATE as f32;
        let edge_in = (i as f32 / fade as f32).min(1.0);
        let edge_out = ((frames - i) as f32 / fade as f32).min(1.0);
        let s = (t * freq * TAU).sin() * amplitude * edge_in.min(edge_out);
        samples.push(s);
        samples.push(s);
    }

    Arc::new(AudioBuffer::new(DEMO_RATE, 2, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_clips_stagger_across_tracks() {
        let clips = demo_clips(3);
        assert_eq!(clips.len(), 3);
        for (i, clip) in clips.iter().enumerate() {
            assert_eq!(clip.track, i);
            assert!((clip.start - i as f64 * 2.0).abs() < 1e-9);
            assert!((clip.duration() - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_demo_clips_capped_by_track_count() {
        assert_eq!(demo_clips(2).len(), 2);
        assert_eq!(demo_clips(16).len(), 4);
    }

    #[test]
    fn test_tone_shape() {
        let buffer = tone(440.0, 1.0, 0.4);
        assert_eq!(buffer.frames(), DEMO_RATE as usize);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);

        let samples = buffer.samples();
        assert_eq!(samples[0], 0.0, "fade-in starts from silence");
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.4 + 1e-6);
        assert!(peak > 0.35, "tone should reach its amplitude, got {peak}");
    }
}
