//! The `Protocol` interface (spec.md §4.2, §6).
//!
//! A `Protocol` owns one stream at a time. During `stream(uri)` it emits
//! exactly one `EncodedStream` message followed by zero or more
//! `AudioEncoded` messages, ending either by returning (end of stream) or
//! by emitting `Flush` (stop) / `Halt` (wait). Specific wire protocols
//! (HTTP, RAOP, HLS, Songcast, Qobuz) are external collaborators
//! implementing this trait; only one, RAOP, is reproduced bit-exactly
//! in full per spec.md §6.

use aurastream_core::msg::Msg;
use crossbeam_channel::Sender;

/// Outcome of one call to [`Protocol::stream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Success,
    Stopped,
    ErrorRecoverable,
    ErrorUnrecoverable,
    NotSupported,
}

/// A wire protocol capable of streaming one URI scheme's content into the
/// pipeline as `Msg`s.
///
/// `stream` takes `&self`, not `&mut self`: every session-local mutable
/// state a concrete protocol needs (cancellation flags, pending
/// stop/seek ids) lives behind atomics or an `Arc`, so a caller can hold
/// the protocol behind a plain `Arc<dyn Protocol>` and call `interrupt`
/// from another thread for the full duration of a blocking `stream`
/// call — exactly the concurrent cancellation spec.md §5 describes.
pub trait Protocol: Send + Sync {
    /// Does this protocol recognise `uri` by scheme?
    fn supports(&self, uri: &str) -> bool;

    /// Stream `uri` into `output`, blocking until end of stream, stop, or
    /// error. See module docs for the exact message sequence contract.
    fn stream(&self, uri: &str, output: &Sender<Msg>) -> StreamOutcome;

    /// Unblock any outstanding blocking network read so `stream` returns
    /// promptly. Safe to call from another thread while `stream` is
    /// running.
    fn interrupt(&self);
}
