//! Streaming resample stage: converts interleaved `f32` audio from the
//! sample rate of whatever `DecodedStream` is currently playing to the
//! animator's fixed device rate. Runs on its own thread, reading fixed-size
//! chunks from the pump's decode queue and writing into the playback queue
//! the CPAL callback drains.
//!
//! The source rate can change mid-stream (every `DecodedStream` resets
//! ramps and may carry a different rate, spec.md §4.4.1); the pump thread
//! reports the new rate over `rate_rx` and this stage rebuilds its
//! resampler before the next chunk rather than tearing down the queues.

use crate::queue::{calc_max_buffered_samples, PopStrategy, SharedAudio};
use crossbeam_channel::Receiver;
use rubato::{calculate_cutoff, Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::sync::Arc;
use std::thread;

#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size (frames) for the steady-state resampling loop.
    pub chunk_frames: usize,
    /// Target buffering, in seconds, for the output queue.
    pub buffer_seconds: f32,
}

fn build_resampler(src_rate: u32, dst_rate: u32, channels: usize, chunk_frames: usize) -> Box<dyn Resampler<f32>> {
    let f_ratio = dst_rate as f64 / src_rate.max(1) as f64;
    let sinc_len = 128;
    let oversampling_factor = 256;
    let interpolation = SincInterpolationType::Cubic;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters { sinc_len, f_cutoff, interpolation, oversampling_factor, window };
    match Async::<f32>::new_sinc(f_ratio, 1.1, &params, chunk_frames.max(1), channels, FixedAsync::Input) {
        Ok(r) => Box::new(r),
        Err(e) => {
            tracing::error!(error = %e, "resampler init failed; falling back to identity ratio");
            Async::<f32>::new_sinc(1.0, 1.1, &params, chunk_frames.max(1), channels, FixedAsync::Input)
                .map(|r| Box::new(r) as Box<dyn Resampler<f32>>)
                .expect("identity-ratio resampler must build")
        }
    }
}

/// Start the resample thread. `rate_rx` carries every new source sample
/// rate the pump thread observes; the first value must arrive before any
/// audio does, since `srcq`'s content is silent on rate.
pub fn spawn_resampler(srcq: Arc<SharedAudio>, channels: usize, dst_rate: u32, rate_rx: Receiver<u32>, cfg: ResampleConfig) -> Arc<SharedAudio> {
    let max_buffered_samples = calc_max_buffered_samples(dst_rate, channels, cfg.buffer_seconds);
    let dstq = Arc::new(SharedAudio::new(channels, max_buffered_samples));
    let dstq_thread = dstq.clone();
    let chunk_in_frames = cfg.chunk_frames.max(1);

    thread::spawn(move || {
        let Ok(mut src_rate) = rate_rx.recv() else {
            dstq_thread.close();
            return;
        };
        let mut resampler = build_resampler(src_rate, dst_rate, channels, chunk_in_frames);
        let mut out_interleaved = vec![0.0f32; channels * chunk_in_frames * 3];
        let mut indexing = Indexing { input_offset: 0, output_offset: 0, active_channels_mask: None, partial_len: None };

        loop {
            while let Ok(new_rate) = rate_rx.try_recv() {
                if new_rate != src_rate && new_rate > 0 {
                    src_rate = new_rate;
                    resampler = build_resampler(src_rate, dst_rate, channels, chunk_in_frames);
                }
            }

            let interleaved = match srcq.pop(PopStrategy::BlockingExact { frames: chunk_in_frames }) {
                Some(v) => v,
                None => break,
            };

            let input_adapter = match audioadapter_buffers::direct::InterleavedSlice::new(&interleaved, channels, chunk_in_frames) {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!(error = %e, "interleaved slice (input) error");
                    break;
                }
            };
            let out_capacity_frames = out_interleaved.len() / channels;
            let mut output_adapter = match audioadapter_buffers::direct::InterleavedSlice::new_mut(&mut out_interleaved, channels, out_capacity_frames) {
                Ok(a) => a,
                Err(e) => {
                    tracing::error!(error = %e, "interleaved slice (output) error");
                    break;
                }
            };

            indexing.input_offset = 0;
            indexing.output_offset = 0;
            indexing.partial_len = None;

            let (_nbr_in, nbr_out) = match resampler.process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing)) {
                Ok(x) => x,
                Err(e) => {
                    tracing::error!(error = %e, "resampler process error");
                    break;
                }
            };

            let produced_samples = nbr_out * channels;
            dstq_thread.push_interleaved_blocking(&out_interleaved[..produced_samples]);
        }

        dstq_thread.close();
    });

    dstq
}
