//! Bridges the codec controller (which speaks `crossbeam_channel`, spec.md
//! §4.3) to the two reservoirs (which speak blocking pull/push, spec.md
//! §4.5).
//!
//! Three threads cooperate here, though spec.md §5 describes the codec
//! controller as a single logical thread:
//! - a **relay** thread is the sole puller of [`EncodedReservoir`]
//!   (a reservoir has exactly one consumer) and forwards every message
//!   verbatim onto an unbounded channel;
//! - the **codec controller** thread — the one spec.md means — consumes
//!   that channel, detecting `EncodedStream` boundaries and running
//!   [`CodecController::run_one_stream`] for each one in turn;
//! - a **decoded pump** thread drains the controller's bounded (capacity
//!   0) output channel into [`DecodedReservoir::push`], so a full decoded
//!   reservoir applies backpressure all the way back to the controller's
//!   `output.send()` — preserving the "reservoirs are the only blocking
//!   points" contract (spec.md §4.5) even though the controller itself
//!   talks to a channel, not the reservoir, directly.

use crate::reservoir::{DecodedReservoir, EncodedReservoir};
use aurastream_codec::{CodecController, CodecRegistry, PendingSeek, PendingStop};
use aurastream_core::msg::Msg;
use aurastream_core::{MessageFactory, StreamHandlerRegistry};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long the codec controller thread waits for the next `EncodedStream`
/// before checking whether a stray `PendingSeek` request needs an
/// immediate `ID_INVALID` reply (there is no stream left to seek).
const BETWEEN_STREAMS_POLL: Duration = Duration::from_millis(50);

/// Handles for the three threads spawned by [`spawn_codec_bridge`], plus
/// the shared [`PendingStop`] latch a `StreamHandler::try_stop` should
/// notify so an in-flight `stream_initialise` doesn't swallow it, and the
/// shared [`PendingSeek`] latch a `Seeker` blocks on for a seek's result.
pub struct CodecBridge {
    pub pending_stop: Arc<PendingStop>,
    pub pending_seek: Arc<PendingSeek>,
    relay: JoinHandle<()>,
    controller: JoinHandle<()>,
    pump: JoinHandle<()>,
}

impl CodecBridge {
    pub fn join(self) {
        let _ = self.relay.join();
        let _ = self.controller.join();
        let _ = self.pump.join();
    }
}

/// Spawn the codec controller and its relay/pump threads, consuming
/// `encoded` and feeding `decoded`.
pub fn spawn_codec_bridge(
    encoded: Arc<EncodedReservoir>,
    decoded: Arc<DecodedReservoir>,
    registry: CodecRegistry,
    handler_registry: Arc<StreamHandlerRegistry>,
    factory: Arc<MessageFactory>,
) -> CodecBridge {
    let (in_tx, in_rx) = crossbeam_channel::unbounded::<Msg>();
    // Capacity 0: `run_one_stream`'s `output.send()` rendezvous with the
    // pump thread, which only accepts once `decoded.push()` has room.
    let (out_tx, out_rx) = crossbeam_channel::bounded::<Msg>(0);
    let pending_stop = PendingStop::new();
    let pending_seek = PendingSeek::new();

    let relay = {
        let mut source = encoded.clone();
        std::thread::Builder::new()
            .name("aurastream-encoded-relay".into())
            .spawn(move || loop {
                use crate::stage::MsgSource;
                let msg = source.pull();
                let is_quit = matches!(msg, Msg::Quit);
                if in_tx.send(msg).is_err() || is_quit {
                    break;
                }
            })
            .expect("spawn encoded relay thread")
    };

    let controller = {
        let pending_stop = pending_stop.clone();
        let pending_seek = pending_seek.clone();
        std::thread::Builder::new()
            .name("aurastream-codec-controller".into())
            .spawn(move || {
                let mut controller = CodecController::new(registry, handler_registry, factory);
                loop {
                    // No stream active right now: a `PendingSeek` request
                    // arriving in this window has nothing to resolve
                    // against, so fail it instead of leaving the `Seeker`
                    // blocked until the next stream happens to start.
                    match in_rx.recv_timeout(BETWEEN_STREAMS_POLL) {
                        Ok(Msg::EncodedStream(info)) => {
                            tracing::debug!(stream_id = info.stream_id, "codec controller: new stream");
                            let _terminal = controller.run_one_stream(
                                info.stream_id,
                                0,
                                info.handler,
                                in_rx.clone(),
                                &out_tx,
                                &pending_stop,
                                &pending_seek,
                            );
                        }
                        Ok(Msg::Quit) => break,
                        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => pending_seek.fail_stray(),
                        Ok(other) => {
                            tracing::trace!(variant = other.variant_name(), "codec controller: dropping stray message outside a stream");
                        }
                    }
                }
            })
            .expect("spawn codec controller thread")
    };

    let pump = {
        let decoded = decoded.clone();
        std::thread::Builder::new()
            .name("aurastream-decoded-pump".into())
            .spawn(move || {
                while let Ok(msg) = out_rx.recv() {
                    decoded.push(msg);
                }
                decoded.close();
            })
            .expect("spawn decoded pump thread")
    };

    CodecBridge { pending_stop, pending_seek, relay, controller, pump }
}
