//! Shared decoded-audio buffers.
//!
//! A single decode call can produce audio that several downstream
//! messages slice into (e.g. a skipper trimming samples off one end).
//! `DecodedAudio` wraps the sample data in an `Arc` so those slices share
//! the underlying allocation instead of copying, while each holder keeps
//! its own `offset`/`len` window (spec.md §3.1, `AudioPcm` invariant:
//! "split without copying the underlying samples").

use crate::pool::PoolPermit;
use std::sync::Arc;

/// Interleaved `f32` PCM samples, shareable without copying.
#[derive(Clone)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    offset: usize,
    len: usize,
    channels: u16,
    sample_rate: u32,
    /// The `MessageFactory` decoded-audio pool slot backing this buffer,
    /// shared (not duplicated) across every window split from it so pool
    /// accounting tracks the allocation, not the message count.
    permit: Option<Arc<PoolPermit>>,
}

impl DecodedAudio {
    /// Wrap a freshly decoded, fully-owned sample buffer.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let len = samples.len();
        Self {
            samples: Arc::from(samples),
            offset: 0,
            len,
            channels,
            sample_rate,
            permit: None,
        }
    }

    /// Attach the pool permit backing this buffer's allocation.
    pub fn with_permit(mut self, permit: Arc<PoolPermit>) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn has_permit(&self) -> bool {
        self.permit.is_some()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved samples (frames * channels) in this window.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole frames in this window.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.len / self.channels as usize
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples[self.offset..self.offset + self.len]
    }

    /// Split this window at `frame_index` into (before, after), sharing the
    /// same backing allocation. Used by the skipper to discard a prefix of
    /// decoded audio without copying the rest.
    pub fn split_at_frame(&self, frame_index: usize) -> (Self, Self) {
        let ch = self.channels.max(1) as usize;
        let split_sample = (frame_index * ch).min(self.len);
        let before = Self {
            samples: self.samples.clone(),
            offset: self.offset,
            len: split_sample,
            channels: self.channels,
            sample_rate: self.sample_rate,
            permit: self.permit.clone(),
        };
        let after = Self {
            samples: self.samples.clone(),
            offset: self.offset + split_sample,
            len: self.len - split_sample,
            channels: self.channels,
            sample_rate: self.sample_rate,
            permit: self.permit.clone(),
        };
        (before, after)
    }

    /// Number of holders (including this one) sharing the backing allocation.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_shares_backing_storage() {
        let audio = DecodedAudio::new(vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5], 1, 44_100);
        let (before, after) = audio.split_at_frame(2);
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 4);
        assert_eq!(audio.share_count(), 3);
        assert_eq!(after.as_slice(), &[0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn split_past_end_is_clamped() {
        let audio = DecodedAudio::new(vec![0.0; 4], 1, 44_100);
        let (before, after) = audio.split_at_frame(100);
        assert_eq!(before.len(), 4);
        assert_eq!(after.len(), 0);
    }
}
