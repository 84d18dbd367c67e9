//! Codec error taxonomy (spec.md §4.3, §7).

use thiserror::Error;

/// Errors a [`crate::codec::Codec`] may raise while recognising or decoding
/// a stream. These map directly to the control-flow the codec controller
/// branches on: `StreamCorrupt`/`FeatureUnsupported` end the stream the
/// same way "no codec recognised it" does; `StreamEnded` waits for the
/// next `EncodedStream`; `StreamStart` restarts recognition with a fresh
/// window.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("stream corrupt: {0}")]
    StreamCorrupt(String),

    #[error("unsupported feature: {0}")]
    FeatureUnsupported(String),

    #[error("stream ended")]
    StreamEnded,

    #[error("codec requests recognition restart")]
    StreamStart,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("symphonia error: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),
}
