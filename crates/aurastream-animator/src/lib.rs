//! `PipelineAnimator`: the pipeline's external audio-device consumer
//! (spec.md §2 component 18, §4.4.5, §9). It owns nothing upstream of
//! `PreDriver`'s output — it only pulls [`Msg::Playable`](aurastream_core::msg::Msg::Playable)
//! at the device's clock, remixes channels, resamples to the device rate,
//! and hands samples to CPAL.
//!
//! [`CpalAnimator`] is the default implementation, grounded the way
//! `audio-player` wires `device.rs` → `resample.rs` → `playback.rs`
//! together, adapted to pull from a [`Pipeline`] instead of a decode
//! thread.

pub mod device;
pub mod playback;
pub mod pump;
pub mod queue;
pub mod resample;

pub use device::{list_device_infos, pick_buffer_size, pick_device, pick_output_config, DeviceInfo};
pub use playback::PlaybackConfig;
pub use queue::SharedAudio;
pub use resample::ResampleConfig;

use anyhow::{Context, Result};
use aurastream_pipeline::Pipeline;
use cpal::traits::StreamTrait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// External consumer of `MsgPlayable`: pulls pipeline output at the audio
/// device's clock (spec.md §2 component 18).
pub trait PipelineAnimator: Send {
    /// Latency this animator is currently adding, for the animator-side
    /// `VariableDelay` (spec.md §4.4.3, the "right" instance).
    fn reported_delay_jiffies(&self) -> u64;

    /// Pause/resume device output without unwinding the pipeline.
    fn set_paused(&self, paused: bool);

    /// Frames of device-rate audio currently buffered ahead of the callback.
    fn buffered_frames(&self) -> u64;

    /// Total frames actually written to the device so far.
    fn played_frames(&self) -> u64;

    /// Stop the device stream and join every worker thread it owns.
    fn shutdown(self: Box<Self>);
}

#[derive(Clone, Debug)]
pub struct AnimatorConfig {
    /// Select an output device by substring match; `None` uses the host default.
    pub device_name: Option<String>,
    /// Preferred device sample rate; `None` picks the device's own maximum.
    pub target_rate: Option<u32>,
    pub refill_max_frames: usize,
    pub chunk_frames: usize,
    pub buffer_seconds: f32,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            target_rate: None,
            refill_max_frames: 512,
            chunk_frames: 1024,
            buffer_seconds: 0.5,
        }
    }
}

/// CPAL-backed [`PipelineAnimator`]. Owns the pump thread (pulls the
/// pipeline), the resample thread, and the device's output stream.
pub struct CpalAnimator {
    stream: cpal::Stream,
    device_rate: u32,
    buffer_size_frames: Option<u32>,
    paused: Arc<AtomicBool>,
    played_frames: Arc<AtomicU64>,
    buffered_frames: Arc<AtomicU64>,
    pump: Option<JoinHandle<()>>,
}

impl CpalAnimator {
    /// Open the selected output device, spawn the pump/resample threads
    /// feeding it, and start the stream. `pipeline` is consumed: from this
    /// point on, only this animator calls `pipeline.pull()`.
    pub fn spawn(pipeline: Pipeline, config: AnimatorConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, config.device_name.as_deref())?;
        let supported = pick_output_config(&device, config.target_rate)?;
        let sample_format = supported.sample_format();
        let mut stream_config = supported.config();
        stream_config.buffer_size = pick_buffer_size(&supported)
            .unwrap_or(cpal::BufferSize::Default);
        let buffer_size_frames = match &stream_config.buffer_size {
            cpal::BufferSize::Fixed(n) => Some(*n),
            cpal::BufferSize::Default => None,
        };

        let device_rate = stream_config.sample_rate;
        let channels = stream_config.channels as usize;

        let (rate_tx, rate_rx) = crossbeam_channel::unbounded();
        let (pump, decode_queue) = pump::spawn_pump(pipeline, channels, rate_tx, config.buffer_seconds);
        let playback_queue = resample::spawn_resampler(
            decode_queue,
            channels,
            device_rate,
            rate_rx,
            resample::ResampleConfig { chunk_frames: config.chunk_frames, buffer_seconds: config.buffer_seconds },
        );

        let paused = Arc::new(AtomicBool::new(false));
        let played_frames = Arc::new(AtomicU64::new(0));
        let buffered_frames = Arc::new(AtomicU64::new(0));
        let underrun_frames = Arc::new(AtomicU64::new(0));
        let underrun_events = Arc::new(AtomicU64::new(0));

        let stream = playback::build_output_stream(
            &device,
            &stream_config,
            sample_format,
            &playback_queue,
            PlaybackConfig {
                refill_max_frames: config.refill_max_frames,
                paused: Some(paused.clone()),
                played_frames: Some(played_frames.clone()),
                underrun_frames: Some(underrun_frames.clone()),
                underrun_events: Some(underrun_events.clone()),
                buffered_frames: Some(buffered_frames.clone()),
            },
        )
        .context("building animator output stream")?;
        stream.play().context("starting animator output stream")?;

        tracing::info!(rate_hz = device_rate, channels, "animator started");

        Ok(Self {
            stream,
            device_rate,
            buffer_size_frames,
            paused,
            played_frames,
            buffered_frames,
            pump: Some(pump),
        })
    }
}

impl PipelineAnimator for CpalAnimator {
    fn reported_delay_jiffies(&self) -> u64 {
        let frames = self.buffer_size_frames.unwrap_or(self.device_rate / 20) as u64;
        aurastream_core::jiffies::samples_to_jiffies(frames, self.device_rate)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    fn buffered_frames(&self) -> u64 {
        self.buffered_frames.load(Ordering::Relaxed)
    }

    fn played_frames(&self) -> u64 {
        self.played_frames.load(Ordering::Relaxed)
    }

    fn shutdown(self: Box<Self>) {
        let _ = self.stream.pause();
        drop(self.stream);
        if let Some(pump) = self.pump {
            let _ = pump.join();
        }
    }
}
