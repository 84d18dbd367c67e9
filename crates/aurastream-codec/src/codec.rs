//! The `Codec` interface (spec.md §4.3, §9: "dynamic codec registration
//! ... a list of dyn-capability objects with a recognise_cost ordering").
//!
//! Specific codec implementations (WAV, FLAC, MP3, AAC, ALAC, Vorbis) are
//! explicitly out of scope (spec.md §1) and are provided collectively by
//! [`crate::symphonia_codec::SymphoniaCodec`], the single reference
//! adapter every registered instance wraps.

use crate::errors::CodecError;
use aurastream_core::msg::DecodedStreamInfo;
use aurastream_core::{DecodedAudio, StreamHandlerId};
use std::io::{Read, Seek};

/// A chunk of decoded audio plus the jiffies it represents, as produced by
/// [`Codec::process`].
pub struct DecodedChunk {
    pub audio: DecodedAudio,
    pub size_jiffies: u64,
}

/// What happened on one call to [`Codec::process`].
pub enum ProcessOutcome {
    Audio(DecodedChunk),
    /// The underlying source has no more packets; matches `CodecStreamEnded`.
    Ended,
}

/// A source of encoded bytes plus whether it can be seeked by byte offset.
/// Implemented by the codec controller's channel-backed adapter over an
/// `EncodedReservoir`; codecs never know their bytes ultimately came from
/// a network protocol.
pub trait EncodedSource: Read + Seek + Send {
    fn is_seekable(&self) -> bool;
}

/// A registered decoder capability (spec.md §4.3).
pub trait Codec: Send {
    /// Stable name used in `DecodedStream.codec_name` and logs.
    fn name(&self) -> &'static str;

    /// Lower values are tried first during recognition.
    fn recognise_cost(&self) -> u32;

    /// Does this codec recognise the container/codec in `window`, a
    /// buffered (not consumed) prefix of the stream, typically 6 KiB?
    fn recognise(&self, window: &[u8]) -> bool;

    /// Reads headers from `source` and returns exactly one
    /// `DecodedStream` description, carrying `handler` as its back-pointer
    /// so downstream stages call back onto the protocol session that
    /// produced this particular `EncodedStream` (spec.md §4.7), not
    /// whichever one happened to be current when the codec was
    /// constructed. Called once per recognised stream.
    fn stream_initialise(
        &mut self,
        source: Box<dyn EncodedSource>,
        stream_id: u32,
        start_sample: u64,
        handler: StreamHandlerId,
    ) -> Result<DecodedStreamInfo, CodecError>;

    /// Pulls more encoded bytes and produces the next chunk of decoded
    /// audio, or signals end of stream.
    fn process(&mut self) -> Result<ProcessOutcome, CodecError>;

    /// Translate a requested sample position into a byte offset the
    /// controller should pass to `StreamHandler::TrySeek`. `None` means
    /// not seekable / out of range.
    fn try_seek(&mut self, sample: u64) -> Option<u64>;
}
