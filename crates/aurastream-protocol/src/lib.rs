//! Wire protocols implementing the `Protocol` interface (spec.md §4.2, §6).
//!
//! Each submodule owns one URI scheme. `raop` is the "one representative"
//! protocol spec.md §2 calls out for full bit-exact reproduction of its
//! wire format (RTSP/RTP/resend/AES); the others are specified to the
//! level of detail spec.md §6 gives for their wire formats.

pub mod context;
pub mod hls;
pub mod http;
pub mod protocol;
pub mod qobuz;
pub mod raop;
pub mod songcast;

pub use context::ProtocolContext;
pub use http::HttpProtocol;
pub use protocol::{Protocol, StreamOutcome};
pub use qobuz::QobuzProtocol;
pub use songcast::SongcastProtocol;
