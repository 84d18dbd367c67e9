//! Shared wire/API types for the pipeline control surface.
//!
//! These are the DTOs that cross the boundary between the pipeline core
//! and anything observing or controlling it (HTTP status endpoint,
//! observer callbacks). Kept dependency-light on purpose.

use serde::{Deserialize, Serialize};

/// Track id, stable for the lifetime of a `Track`.
pub type TrackId = u32;
/// Stream id, changes whenever a protocol (re)starts a stream.
pub type StreamId = u32;
/// Opaque id used to reconcile a stop/seek/wait request with its effect.
pub type FlushId = u32;
/// Opaque id used to reconcile a pause/stop request with its halt message.
pub type HaltId = u32;

/// Sentinel returned when an id-producing call does not apply.
pub const ID_INVALID: u32 = 0;

/// High-level state of the pipeline, surfaced to observers and HTTP clients.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Playing,
    Paused,
    Stopped,
    Buffering,
    Waiting,
}

/// Reason playback of the current stream ended, surfaced to observers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    Eof,
    Error,
    Stopped,
}

/// Snapshot of decoded-stream format info, reissued whenever the codec
/// (re)starts (mirrors `MsgDecodedStream`'s payload).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamInfo {
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
}

/// Snapshot status payload for the HTTP control surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub state: Option<PipelineState>,
    pub track_id: Option<TrackId>,
    pub track_uri: Option<String>,
    pub metatext: Option<String>,
    pub stream: Option<StreamInfo>,
    pub elapsed_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub end_reason: Option<PlaybackEndReason>,
    pub encoded_reservoir_bytes: Option<u64>,
    pub decoded_reservoir_jiffies: Option<u64>,
    pub allocator_stats: Option<AllocatorStats>,
}

/// Pool-utilisation snapshot reported by the message factory for diagnostics
/// (spec.md §4.1: "Reported via an aggregator for diagnostics").
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct AllocatorStats {
    pub msg_pool_capacity: usize,
    pub msg_pool_in_use: usize,
    pub decoded_audio_pool_capacity: usize,
    pub decoded_audio_pool_in_use: usize,
}

/// Events pushed to pipeline observers (`IPipelineObserver` in spec.md §6),
/// dispatched on the dedicated event thread (spec.md §5).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObserverEvent {
    PipelineState { state: PipelineState },
    Track { id: TrackId, uri: String },
    TrackPlay { id: TrackId },
    TrackFail { id: TrackId },
    MetaText { text: String },
    Time { seconds: u64, duration_seconds: Option<u64> },
    StreamInfo { info: StreamInfo },
    Mode { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_event_round_trips_through_json() {
        let ev = ObserverEvent::TrackPlay { id: 42 };
        let json = serde_json::to_string(&ev).unwrap();
        let back: ObserverEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn pipeline_state_serializes_snake_case() {
        let json = serde_json::to_string(&PipelineState::Buffering).unwrap();
        assert_eq!(json, "\"buffering\"");
    }
}
