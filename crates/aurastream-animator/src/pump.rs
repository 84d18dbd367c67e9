//! Pump thread: the thing that actually calls [`Pipeline::pull`] on the
//! device's behalf, remixes whatever channel count the current track
//! decoded at onto the device's fixed channel count, and feeds the decode
//! queue the resample thread drains.
//!
//! Everything here runs off the real-time path; only [`playback`](crate::playback)'s
//! CPAL callback is real-time.

use crate::queue::{calc_max_buffered_samples, SharedAudio};
use aurastream_core::msg::Msg;
use aurastream_pipeline::Pipeline;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Remix interleaved `src_channels`-wide audio onto `dst_channels`,
/// following the same mono/stereo rules the rest of the corpus uses:
/// duplicate mono to both ears, average stereo down to mono, otherwise
/// clamp to the nearest available channel.
fn remix(src: &[f32], src_channels: u16, dst_channels: usize) -> Vec<f32> {
    let src_channels = src_channels.max(1) as usize;
    if src_channels == dst_channels {
        return src.to_vec();
    }
    let frames = src.len() / src_channels;
    let mut out = Vec::with_capacity(frames * dst_channels);
    for frame in 0..frames {
        let base = frame * src_channels;
        for dst_ch in 0..dst_channels {
            let sample = match (src_channels, dst_channels) {
                (1, _) => src[base],
                (2, 1) => 0.5 * (src[base] + src[base + 1]),
                (_, _) => src[base + dst_ch.min(src_channels - 1)],
            };
            out.push(sample);
        }
    }
    out
}

/// Spawn the pump thread, returning its join handle and the queue the
/// resample stage should read from (at `pipeline`'s native decode rate,
/// already remixed to `dst_channels`).
pub fn spawn_pump(mut pipeline: Pipeline, dst_channels: usize, rate_tx: Sender<u32>, buffer_seconds: f32) -> (JoinHandle<()>, Arc<SharedAudio>) {
    // Sized generously since source rate is unknown until the first
    // `DecodedStream`; the resample thread's own queue is the one actually
    // tuned to the device rate.
    let max_buffered_samples = calc_max_buffered_samples(192_000, dst_channels, buffer_seconds);
    let decode_queue = Arc::new(SharedAudio::new(dst_channels, max_buffered_samples));
    let decode_queue_thread = decode_queue.clone();

    let handle = std::thread::Builder::new()
        .name("aurastream-animator-pump".into())
        .spawn(move || {
            let mut current_rate: Option<u32> = None;
            loop {
                match pipeline.pull() {
                    Msg::DecodedStream(info) => {
                        if current_rate != Some(info.sample_rate) {
                            current_rate = Some(info.sample_rate);
                            if rate_tx.send(info.sample_rate).is_err() {
                                break;
                            }
                        }
                    }
                    Msg::Playable(p) => {
                        if current_rate != Some(p.sample_rate) {
                            current_rate = Some(p.sample_rate);
                            if rate_tx.send(p.sample_rate).is_err() {
                                break;
                            }
                        }
                        let interleaved = remix(p.samples.as_slice(), p.channels, dst_channels);
                        decode_queue_thread.push_interleaved_blocking(&interleaved);
                    }
                    Msg::Drain(callback) => callback(),
                    Msg::Quit => break,
                    _ => {}
                }
            }
            decode_queue_thread.close();
        })
        .expect("spawn animator pump thread");

    (handle, decode_queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remix_mono_duplicates_to_stereo() {
        let out = remix(&[0.25, 0.5], 1, 2);
        assert_eq!(out, vec![0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn remix_stereo_averages_to_mono() {
        let out = remix(&[1.0, -1.0], 2, 1);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn remix_passthrough_when_matching() {
        let out = remix(&[0.1, 0.2, 0.3, 0.4], 2, 2);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
    }
}
