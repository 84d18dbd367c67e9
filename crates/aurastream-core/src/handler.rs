//! Stream handler back-pointers.
//!
//! Protocol implementations (`StreamHandler`s) are asked for permission
//! before the pipeline starts playing a stream they supplied, and are
//! notified when that stream's messages are consumed or discarded.
//! `EncodedStream`/`DecodedStream` messages in spec.md carry a pointer
//! back to the handler that created them; in safe Rust that back-pointer
//! is represented as a [`StreamHandlerId`] resolved through a
//! [`StreamHandlerRegistry`] rather than a raw or owning pointer, so a
//! handler that has already been torn down is simply absent instead of
//! dangling (spec.md §9 Design Notes).

use std::sync::{Arc, Mutex, Weak};

/// Answer to "is it OK to start playing this stream now?" (spec.md §4.2,
/// §4.7). `Later` applies backpressure on the stopper until asked again,
/// distinct from `No` which skips the stream outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OkToPlay {
    Yes,
    No,
    Later,
}

/// Callback surface a protocol implements so pipeline stages can report
/// back on the fate of the stream/track messages that protocol created.
pub trait StreamHandler: Send + Sync {
    /// Called once, synchronously, before the pipeline commits to playing
    /// the stream this handler produced.
    fn ok_to_play(&self) -> OkToPlay;

    /// Request that the stream carrying `stream_id` stop; returns a flush
    /// id to expect downstream, or [`aurastream_types::ID_INVALID`] if the
    /// stream is already stopped or not current.
    fn try_stop(&self, stream_id: u32) -> u32;

    /// Request a seek to `byte_offset` on the stream carrying `stream_id`;
    /// same return convention as [`StreamHandler::try_stop`].
    fn try_seek(&self, stream_id: u32, byte_offset: u64) -> u32;

    /// The decoded reservoir has dropped below its starvation threshold.
    fn notify_starving(&self, _mode: &str, _stream_id: u32) {}

    /// Called when this handler's encoded data has been fully consumed.
    fn notify_stream_played(&self) {}

    /// Called when this handler's stream is discarded (flush, stop, error)
    /// before being fully played.
    fn notify_stream_discarded(&self) {}
}

/// Opaque index into a [`StreamHandlerRegistry`]. This is what
/// `EncodedStream`/`DecodedStream` messages actually carry instead of a
/// pointer to the handler itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamHandlerId(u64);

/// Registry mapping [`StreamHandlerId`]s to weak references to their
/// handlers. Holding only a `Weak` means a handler can be dropped by its
/// owning protocol without the registry (or any message still holding its
/// id) keeping it alive or producing a dangling pointer.
#[derive(Default)]
pub struct StreamHandlerRegistry {
    inner: Mutex<Vec<(StreamHandlerId, Weak<dyn StreamHandler>)>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl StreamHandlerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Register a handler, returning the id messages should carry.
    pub fn register(&self, handler: &Arc<dyn StreamHandler>) -> StreamHandlerId {
        let id = StreamHandlerId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed));
        let mut guard = self.inner.lock().expect("stream handler registry poisoned");
        guard.retain(|(_, weak)| weak.strong_count() > 0);
        guard.push((id, Arc::downgrade(handler)));
        id
    }

    /// Resolve an id back to a live handler, if it still exists.
    pub fn resolve(&self, id: StreamHandlerId) -> Option<Arc<dyn StreamHandler>> {
        let guard = self.inner.lock().expect("stream handler registry poisoned");
        guard.iter().find(|(entry_id, _)| *entry_id == id).and_then(|(_, weak)| weak.upgrade())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysYes;
    impl StreamHandler for AlwaysYes {
        fn ok_to_play(&self) -> OkToPlay {
            OkToPlay::Yes
        }

        fn try_stop(&self, _stream_id: u32) -> u32 {
            aurastream_types::ID_INVALID
        }

        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            aurastream_types::ID_INVALID
        }
    }

    #[test]
    fn registered_handler_resolves() {
        let registry = StreamHandlerRegistry::new();
        let handler: Arc<dyn StreamHandler> = Arc::new(AlwaysYes);
        let id = registry.register(&handler);
        let resolved = registry.resolve(id).expect("handler should resolve");
        assert_eq!(resolved.ok_to_play(), OkToPlay::Yes);
    }

    #[test]
    fn dropped_handler_no_longer_resolves() {
        let registry = StreamHandlerRegistry::new();
        let handler: Arc<dyn StreamHandler> = Arc::new(AlwaysYes);
        let id = registry.register(&handler);
        drop(handler);
        assert!(registry.resolve(id).is_none());
    }
}
