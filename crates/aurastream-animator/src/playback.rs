//! The CPAL output stream and its real-time callback.
//!
//! Samples arriving here have already been remixed to the device's channel
//! count and resampled to its rate (spec.md §4.4.5's "flat `MsgPlayable`
//! stream" becomes, on this side of the boundary, a flat interleaved `f32`
//! queue); the callback's only job is draining it without blocking and
//! converting to the device's sample format. Underruns are filled with
//! silence rather than stalling the device clock.

use crate::queue::{PopStrategy, SharedAudio};
use anyhow::{anyhow, Result};
use cpal::traits::DeviceTrait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Maximum frames to pull from the queue per refill.
    pub refill_max_frames: usize,
    /// When set and true, the callback outputs silence without draining the queue.
    pub paused: Option<Arc<AtomicBool>>,
    /// Incremented by the number of frames the callback actually produced.
    pub played_frames: Option<Arc<AtomicU64>>,
    /// Incremented by the number of frames filled with silence due to underrun.
    pub underrun_frames: Option<Arc<AtomicU64>>,
    pub underrun_events: Option<Arc<AtomicU64>>,
    /// Updated with the queue's current buffered frame count (best-effort).
    pub buffered_frames: Option<Arc<AtomicU64>>,
}

pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    srcq: &Arc<SharedAudio>,
    cfg: PlaybackConfig,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, srcq, cfg),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, srcq, cfg),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, srcq, cfg),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, srcq, cfg),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig, srcq: &Arc<SharedAudio>, cfg: PlaybackConfig) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let refill_max_frames = cfg.refill_max_frames.max(1);
    let srcq_cb = srcq.clone();
    let paused_flag = cfg.paused.clone();
    let played_frames = cfg.played_frames.clone();
    let underrun_frames = cfg.underrun_frames.clone();
    let underrun_events = cfg.underrun_events.clone();
    let buffered_frames = cfg.buffered_frames.clone();
    let mut carry: Vec<f32> = Vec::new();
    let mut carry_pos = 0usize;

    let err_fn = |err| tracing::warn!("animator stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if let Some(p) = &paused_flag {
                if p.load(Ordering::Relaxed) {
                    if let Some(counter) = &buffered_frames {
                        counter.store(srcq_cb.len_frames() as u64, Ordering::Relaxed);
                    }
                    data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                    return;
                }
            }

            let frames = data.len() / channels;
            let mut filled_frames = 0usize;

            for frame in 0..frames {
                if carry_pos >= carry.len() {
                    carry_pos = 0;
                    carry.clear();
                    match srcq_cb.pop(PopStrategy::NonBlocking { max_frames: refill_max_frames }) {
                        Some(v) => carry = v,
                        None => {
                            if let Some(events) = &underrun_events {
                                let prev = events.fetch_add(1, Ordering::Relaxed);
                                if prev == 0 {
                                    tracing::warn!(queued_frames = srcq_cb.len_frames(), "animator underrun: queue empty in output callback");
                                }
                            }
                            if let Some(counter) = &underrun_frames {
                                counter.fetch_add((frames - frame) as u64, Ordering::Relaxed);
                            }
                            for idx in (frame * channels)..data.len() {
                                data[idx] = <T as cpal::Sample>::from_sample::<f32>(0.0);
                            }
                            break;
                        }
                    }
                }
                for ch in 0..channels {
                    let sample = carry.get(carry_pos + ch).copied().unwrap_or(0.0);
                    data[frame * channels + ch] = <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                carry_pos += channels;
                filled_frames += 1;
            }

            if filled_frames > 0 {
                if let Some(counter) = &played_frames {
                    counter.fetch_add(filled_frames as u64, Ordering::Relaxed);
                }
            }
            if let Some(counter) = &buffered_frames {
                counter.store(srcq_cb.len_frames() as u64, Ordering::Relaxed);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
