//! The `Msg` enum: the lingua franca of the pipeline (spec.md §3.1).
//!
//! Every value that travels between stages is a `Msg`, reference-counted
//! via `Arc` and drawn from a per-variant pool via [`MessageFactory`]. A
//! `Msg` is cheap to clone (it just bumps the `Arc`'s refcount) and cheap
//! to split when it carries a [`DecodedAudio`] block, since that block is
//! itself shared rather than copied.

use crate::decoded_audio::DecodedAudio;
use crate::handler::StreamHandlerId;
use crate::pool::PoolPermit;
use crate::ramp::Ramp;
use aurastream_types::{FlushId, HaltId, StreamId, TrackId};
use std::sync::Arc;

/// Flags carried by a `Mode` boundary message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub supports_latency: bool,
    pub is_real_time: bool,
    pub supports_next_prev: bool,
}

/// Payload of a `Track` message.
#[derive(Clone, Debug)]
pub struct TrackInfo {
    pub uri: String,
    pub metadata: String,
    pub track_id: TrackId,
}

/// Payload of an `EncodedStream` message.
#[derive(Clone)]
pub struct EncodedStreamInfo {
    pub uri: String,
    pub total_bytes: Option<u64>,
    pub stream_id: StreamId,
    pub seekable: bool,
    pub live: bool,
    pub handler: StreamHandlerId,
}

/// Payload of a `DecodedStream` message, reissued on every codec (re)start.
#[derive(Clone)]
pub struct DecodedStreamInfo {
    pub stream_id: StreamId,
    pub bit_rate: Option<u32>,
    pub bit_depth: Option<u16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub codec_name: String,
    pub total_jiffies: Option<u64>,
    pub start_sample: u64,
    pub lossless: bool,
    pub seekable: bool,
    pub live: bool,
    pub handler: StreamHandlerId,
}

/// Payload of an `AudioEncoded` message: opaque bytes, splittable at any offset.
#[derive(Clone)]
pub struct EncodedAudio {
    bytes: Arc<[u8]>,
    offset: usize,
    len: usize,
    /// The `MessageFactory` encoded-audio pool slot backing this buffer,
    /// shared across every window split from it.
    permit: Option<Arc<PoolPermit>>,
}

impl EncodedAudio {
    pub fn new(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self { bytes: Arc::from(bytes), offset: 0, len, permit: None }
    }

    /// Attach the pool permit backing this buffer's allocation.
    pub fn with_permit(mut self, permit: Arc<PoolPermit>) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn has_permit(&self) -> bool {
        self.permit.is_some()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Split off the first `n` bytes, sharing the backing allocation.
    pub fn split_at(&self, n: usize) -> (Self, Self) {
        let n = n.min(self.len);
        (
            Self { bytes: self.bytes.clone(), offset: self.offset, len: n, permit: self.permit.clone() },
            Self { bytes: self.bytes.clone(), offset: self.offset + n, len: self.len - n, permit: self.permit.clone() },
        )
    }
}

/// Payload of an `AudioPcm` message.
#[derive(Clone)]
pub struct AudioPcmMsg {
    pub audio: DecodedAudio,
    pub size_jiffies: u64,
    pub track_offset_jiffies: u64,
    pub ramp: Ramp,
}

/// Payload of a `Silence` message: materialises to zero samples when played,
/// deferring choice of sample rate until the PreDriver consumes it.
#[derive(Clone, Copy, Debug)]
pub struct SilenceMsg {
    pub size_jiffies: u64,
    pub track_offset_jiffies: u64,
}

/// Final, driver-ready form produced by PreDriver. Carries bound sample
/// rate/channel count so the driver never needs to consult `DecodedStream`
/// state itself.
#[derive(Clone)]
pub struct PlayableMsg {
    pub samples: DecodedAudio,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A callback fired when a `Drain` message is consumed by the driver, used
/// to synchronise state changes with actual audio delivery.
pub type DrainCallback = Arc<dyn Fn() + Send + Sync>;

/// Every value that travels the pipeline (spec.md §3.1).
#[derive(Clone)]
pub enum Msg {
    Mode { name: String, flags: ModeFlags },
    Track(TrackInfo),
    Drain(DrainCallback),
    Delay { requested_jiffies: u64, animator_jiffies: u64 },
    EncodedStream(EncodedStreamInfo),
    AudioEncoded(EncodedAudio),
    MetaText(String),
    StreamInterrupted,
    Halt(HaltId),
    Flush(FlushId),
    Wait,
    DecodedStream(DecodedStreamInfo),
    AudioPcm(AudioPcmMsg),
    Silence(SilenceMsg),
    Playable(PlayableMsg),
    Quit,
}

impl Msg {
    /// Short name used in logs and assertion messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Msg::Mode { .. } => "Mode",
            Msg::Track(_) => "Track",
            Msg::Drain(_) => "Drain",
            Msg::Delay { .. } => "Delay",
            Msg::EncodedStream(_) => "EncodedStream",
            Msg::AudioEncoded(_) => "AudioEncoded",
            Msg::MetaText(_) => "MetaText",
            Msg::StreamInterrupted => "StreamInterrupted",
            Msg::Halt(_) => "Halt",
            Msg::Flush(_) => "Flush",
            Msg::Wait => "Wait",
            Msg::DecodedStream(_) => "DecodedStream",
            Msg::AudioPcm(_) => "AudioPcm",
            Msg::Silence(_) => "Silence",
            Msg::Playable(_) => "Playable",
            Msg::Quit => "Quit",
        }
    }

    /// True for the variants the PreDriver guarantees the driver only ever
    /// sees: `{Mode, Drain, Track, DecodedStream, Playable, Halt, Quit}`
    /// (spec.md §4.4.5).
    pub fn is_driver_safe(&self) -> bool {
        matches!(
            self,
            Msg::Mode { .. }
                | Msg::Drain(_)
                | Msg::Track(_)
                | Msg::DecodedStream(_)
                | Msg::Playable(_)
                | Msg::Halt(_)
                | Msg::Quit
        )
    }
}

/// Abort the process because a stage received a `Msg` variant it did not
/// declare support for. Deliberate per spec.md §7: "if a stage receives a
/// message variant it did not declare as supported, the process aborts."
pub fn unsupported_variant(stage: &str, msg: &Msg) -> ! {
    panic!("stage '{stage}' received unsupported Msg variant '{}'", msg.variant_name());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_audio_split_preserves_bytes() {
        let audio = EncodedAudio::new(vec![1, 2, 3, 4, 5]);
        let (head, tail) = audio.split_at(2);
        assert_eq!(head.as_slice(), &[1, 2]);
        assert_eq!(tail.as_slice(), &[3, 4, 5]);
    }

    #[test]
    fn driver_safe_variants_match_spec() {
        assert!(Msg::Quit.is_driver_safe());
        assert!(!Msg::Wait.is_driver_safe());
        assert!(!Msg::AudioEncoded(EncodedAudio::new(vec![])).is_driver_safe());
    }
}
