//! Bridges a `Protocol` implementation (which pushes `Msg`s onto a
//! `crossbeam_channel::Sender`, spec.md §3) onto [`EncodedReservoir`]'s
//! blocking `push` API (spec.md §4.5).
//!
//! The shape mirrors [`crate::controller_bridge`]'s relay thread: a
//! protocol's `stream()` call and the reservoir's backpressure both want to
//! run on their own thread, so a dedicated feed thread sits between them,
//! draining the channel and blocking on `encoded.push()` on the protocol's
//! behalf. Unlike the codec bridge, there's exactly one relay stage here —
//! nothing downstream needs to see the channel form, only the reservoir.

use crate::reservoir::EncodedReservoir;
use aurastream_core::msg::Msg;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One protocol session's feed into `encoded`: the channel a `Protocol`
/// implementation's `stream()` call writes to, and the thread draining it.
pub struct ProtocolFeed {
    pub sender: Sender<Msg>,
    relay: JoinHandle<()>,
}

impl ProtocolFeed {
    /// Wait for the feed thread to drain and exit (it does once its sender
    /// is dropped or a `Msg::Quit` comes through).
    pub fn join(self) {
        let _ = self.relay.join();
    }
}

/// Spawn a feed thread forwarding every message sent on the returned
/// `Sender<Msg>` into `encoded.push()`. Give the `Sender` to a single
/// `Protocol::stream()` call; dropping it (or sending `Msg::Quit`) ends the
/// feed.
pub fn spawn_protocol_feed(encoded: Arc<EncodedReservoir>) -> ProtocolFeed {
    let (tx, rx): (Sender<Msg>, Receiver<Msg>) = crossbeam_channel::unbounded();
    let relay = std::thread::Builder::new()
        .name("aurastream-protocol-feed".into())
        .spawn(move || {
            while let Ok(msg) = rx.recv() {
                let is_quit = matches!(msg, Msg::Quit);
                encoded.push(msg);
                if is_quit {
                    break;
                }
            }
        })
        .expect("spawn protocol feed thread");
    ProtocolFeed { sender: tx, relay }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservoir::EncodedReservoirConfig;
    use crate::stage::MsgSource;
    use aurastream_core::handler::{StreamHandler, StreamHandlerRegistry};
    use aurastream_core::msg::EncodedStreamInfo;
    use aurastream_core::{FactoryConfig, MessageFactory};

    struct NoopHandler;
    impl StreamHandler for NoopHandler {
        fn ok_to_play(&self) -> aurastream_core::OkToPlay {
            aurastream_core::OkToPlay::Yes
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            aurastream_types::ID_INVALID
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            aurastream_types::ID_INVALID
        }
    }

    #[test]
    fn forwards_messages_into_the_reservoir() {
        let factory = Arc::new(MessageFactory::new(FactoryConfig::default()));
        let encoded = Arc::new(EncodedReservoir::new(EncodedReservoirConfig::default(), factory));
        let feed = spawn_protocol_feed(encoded.clone());

        let registry = StreamHandlerRegistry::new();
        let handler: Arc<dyn StreamHandler> = Arc::new(NoopHandler);
        let handler_id = registry.register(&handler);
        let info = EncodedStreamInfo {
            uri: "http://example.invalid/track.mp3".to_string(),
            total_bytes: None,
            stream_id: 1,
            seekable: false,
            live: true,
            handler: handler_id,
        };
        feed.sender.send(Msg::EncodedStream(info)).unwrap();
        feed.sender.send(Msg::Quit).unwrap();
        drop(feed.sender);
        feed.join();

        let mut encoded = encoded;
        assert!(matches!(encoded.pull(), Msg::EncodedStream(_)));
        assert!(matches!(encoded.pull(), Msg::Quit));
    }
}
