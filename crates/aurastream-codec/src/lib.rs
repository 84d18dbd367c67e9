//! Container recognition and codec decoding.

pub mod codec;
pub mod container;
pub mod controller;
pub mod errors;
pub mod registry;
pub mod source;
pub mod symphonia_codec;

pub use codec::{Codec, DecodedChunk, EncodedSource, ProcessOutcome};
pub use controller::{CodecController, PendingSeek, PendingStop};
pub use errors::CodecError;
pub use registry::CodecRegistry;
pub use source::ChannelEncodedSource;
pub use symphonia_codec::SymphoniaCodec;
