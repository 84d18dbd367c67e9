//! Thread-safe bounded queue of interleaved `f32` audio samples: the
//! hand-off between the pump thread (pulling `MsgPlayable` off the
//! pipeline), the resample thread, and the CPAL output callback.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Strategy for popping interleaved frames from the queue.
pub enum PopStrategy {
    /// Block until exactly `frames` are available, or `None` if closed first.
    BlockingExact { frames: usize },
    /// Return immediately with up to `max_frames`, or `None` if empty.
    NonBlocking { max_frames: usize },
}

/// Conservative queue capacity in samples for `(rate, channels, seconds)`.
pub fn calc_max_buffered_samples(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 { buffer_seconds } else { 1.0 };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

pub struct SharedAudio {
    channels: usize,
    inner: Mutex<Inner>,
    cv: Condvar,
    max_buffered_samples: usize,
}

struct Inner {
    queue: VecDeque<f32>,
    done: bool,
}

impl SharedAudio {
    pub fn new(channels: usize, max_buffered_samples: usize) -> Self {
        Self {
            channels,
            inner: Mutex::new(Inner { queue: VecDeque::new(), done: false }),
            cv: Condvar::new(),
            max_buffered_samples: max_buffered_samples.max(channels),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len_frames(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.queue.len() / self.channels
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().unwrap().done
    }

    /// Mark finished and wake all waiters; idempotent.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.done = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    pub fn push_interleaved_blocking(&self, samples: &[f32]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();
            while g.queue.len() >= self.max_buffered_samples && !g.done {
                g = self.cv.wait(g).unwrap();
            }
            if g.done {
                return;
            }
            let mut pushed_any = false;
            while offset < samples.len() && g.queue.len() < self.max_buffered_samples {
                g.queue.push_back(samples[offset]);
                offset += 1;
                pushed_any = true;
            }
            drop(g);
            if pushed_any {
                self.cv.notify_all();
            }
        }
    }

    pub fn pop(&self, strategy: PopStrategy) -> Option<Vec<f32>> {
        match strategy {
            PopStrategy::BlockingExact { frames } => {
                let want = frames * self.channels;
                let mut g = self.inner.lock().unwrap();
                while g.queue.len() < want && !g.done {
                    g = self.cv.wait(g).unwrap();
                }
                if g.queue.len() < want {
                    return None;
                }
                let out: Vec<f32> = g.queue.drain(..want).collect();
                drop(g);
                self.cv.notify_all();
                Some(out)
            }
            PopStrategy::NonBlocking { max_frames } => {
                let mut g = self.inner.lock().unwrap();
                let available_frames = g.queue.len() / self.channels;
                let take_frames = available_frames.min(max_frames);
                let take_samples = take_frames * self.channels;
                if take_samples == 0 {
                    return None;
                }
                let out: Vec<f32> = g.queue.drain(..take_samples).collect();
                drop(g);
                self.cv.notify_all();
                Some(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pop_nonblocking_empty() {
        let q = SharedAudio::new(2, 16);
        assert!(q.pop(PopStrategy::NonBlocking { max_frames: 4 }).is_none());
    }

    #[test]
    fn pop_blocking_exact_waits_for_full_frames() {
        let q = Arc::new(SharedAudio::new(2, 64));
        let q_push = q.clone();
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let start = barrier.clone();
        let handle = thread::spawn(move || {
            start.wait();
            let out = q.pop(PopStrategy::BlockingExact { frames: 3 }).unwrap();
            assert_eq!(out.len(), 6);
        });
        barrier.wait();
        q_push.push_interleaved_blocking(&[0.1, 0.2, 0.3, 0.4]);
        q_push.push_interleaved_blocking(&[0.5, 0.6]);
        handle.join().unwrap();
    }

    #[test]
    fn pop_blocking_exact_returns_none_when_closed() {
        let q = SharedAudio::new(2, 64);
        q.close();
        assert!(q.pop(PopStrategy::BlockingExact { frames: 1 }).is_none());
    }

    #[test]
    fn pop_nonblocking_returns_available_frames() {
        let q = SharedAudio::new(2, 64);
        q.push_interleaved_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = q.pop(PopStrategy::NonBlocking { max_frames: 2 }).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
