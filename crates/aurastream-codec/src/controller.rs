//! Codec controller: the dedicated thread that recognises and decodes
//! each `EncodedStream` in turn (spec.md §4.3).
//!
//! Key contract: while inside [`Codec::stream_initialise`], a concurrent
//! `TryStop` must not be lost. Callers report such a stop via
//! [`CodecController::notify_pending_stop`] from another thread; the
//! controller checks it immediately after `stream_initialise` returns and
//! emits the matching `Flush` before doing anything else. [`PendingSeek`]
//! follows the same shape for `TrySeek` (spec.md §4.4.2): the only place
//! that actually holds a sample position a codec understands is the codec
//! itself, so a seek request has to round-trip through this thread rather
//! than being resolved by whichever stage issued it.

use crate::codec::ProcessOutcome;
use crate::registry::CodecRegistry;
use crate::source::ChannelEncodedSource;
use aurastream_core::msg::Msg;
use aurastream_core::{MessageFactory, StreamHandlerId, StreamHandlerRegistry};
use aurastream_types::{FlushId, ID_INVALID};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

const RECOGNITION_WINDOW_BYTES: usize = 6 * 1024;

/// Shared slot a `TryStop` can land in while the controller is inside
/// `stream_initialise` and not yet able to observe it any other way.
#[derive(Default)]
pub struct PendingStop {
    flush_id: AtomicU32,
}

impl PendingStop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { flush_id: AtomicU32::new(aurastream_types::ID_INVALID) })
    }

    pub fn set(&self, flush_id: FlushId) {
        self.flush_id.store(flush_id, Ordering::Release);
    }

    fn take(&self) -> Option<FlushId> {
        let id = self.flush_id.swap(aurastream_types::ID_INVALID, Ordering::AcqRel);
        if id == aurastream_types::ID_INVALID {
            None
        } else {
            Some(id)
        }
    }
}

/// A seek request awaiting the codec controller thread: which stream, and
/// which sample position the requester (the `Seeker` stage) wants. Whoever
/// resolves it (normally [`CodecController::run_one_stream`], or a test
/// harness standing in for it) answers with [`SeekRequest::reply`].
pub struct SeekRequest {
    pub stream_id: u32,
    pub sample: u64,
    reply: Sender<FlushId>,
}

impl SeekRequest {
    pub fn reply(self, flush_id: FlushId) {
        let _ = self.reply.send(flush_id);
    }
}

/// Shared slot a `Seeker` uses to ask the codec controller to resolve a
/// seek via [`crate::codec::Codec::try_seek`] and hand the byte offset it
/// returns to the stream's [`aurastream_core::StreamHandler::try_seek`],
/// replying with the resulting [`FlushId`] (spec.md §4.4.2, §8 property 6).
#[derive(Default)]
pub struct PendingSeek {
    inner: Mutex<Option<SeekRequest>>,
}

impl PendingSeek {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block until the codec controller thread resolves this seek,
    /// returning the `FlushId` to expect downstream, or `ID_INVALID` if
    /// the stream wasn't current or couldn't be seeked. Called from the
    /// `Seeker` stage's thread, not the codec controller's.
    pub fn request(&self, stream_id: u32, sample: u64) -> FlushId {
        let (reply, rx) = crossbeam_channel::bounded(1);
        *self.inner.lock().expect("pending seek poisoned") = Some(SeekRequest { stream_id, sample, reply });
        rx.recv().unwrap_or(ID_INVALID)
    }

    /// Take the pending request, if any, for whoever is about to resolve it.
    pub fn take(&self) -> Option<SeekRequest> {
        self.inner.lock().expect("pending seek poisoned").take()
    }

    /// Reply `ID_INVALID` to a request left pending with no stream active
    /// to resolve it against (the controller thread is idle between
    /// streams, so nothing else will ever call [`Self::take`] for it).
    pub fn fail_stray(&self) {
        if let Some(request) = self.take() {
            request.reply(ID_INVALID);
        }
    }
}

pub struct CodecController {
    registry: CodecRegistry,
    handler_registry: Arc<StreamHandlerRegistry>,
    factory: Arc<MessageFactory>,
}

impl CodecController {
    pub fn new(registry: CodecRegistry, handler_registry: Arc<StreamHandlerRegistry>, factory: Arc<MessageFactory>) -> Self {
        Self { registry, handler_registry, factory }
    }

    /// Run the recognise-then-decode loop for one `EncodedStream`.
    /// `input` carries the stream's `AudioEncoded` bytes (and whatever
    /// non-audio message eventually terminates them); `output` receives
    /// exactly one `DecodedStream` followed by zero or more `AudioPcm`.
    /// Returns the message that ended the stream's byte supply, if any,
    /// so the caller (the pipeline stage wiring) can react to it.
    #[allow(clippy::too_many_arguments)]
    pub fn run_one_stream(
        &mut self,
        stream_id: u32,
        start_sample: u64,
        handler: StreamHandlerId,
        input: Receiver<Msg>,
        output: &Sender<Msg>,
        pending_stop: &PendingStop,
        pending_seek: &PendingSeek,
    ) -> Option<Msg> {
        let window = match self.buffer_recognition_window(&input) {
            Ok(w) => w,
            Err(terminal) => return Some(terminal),
        };

        // Peel off a recognised container prefix (ID3v2, MP4 ftyp) before
        // offering the window to codecs, so recognition sees the actual
        // codec magic and the corrected start_sample below accounts for
        // the skipped header bytes (spec.md §4.3 Container).
        let prefix_len = crate::container::recognised_prefix_len(&window).min(window.len());
        let codec_window = &window[prefix_len..];

        let Some(codec_index) = self.registry.recognise(codec_window) else {
            tracing::warn!(stream_id, "no codec recognised stream; stopping");
            return None; // caller issues TryStop; no codec, stream ends here
        };

        let source = ChannelEncodedSource::new(input, codec_window.to_vec());
        let codec = self.registry.get_mut(codec_index).expect("index from recognise()");

        let init_result = codec.stream_initialise(Box::new(source), stream_id, start_sample, handler);

        // The contract: a TryStop that arrived while we were inside
        // stream_initialise above must not be lost.
        if let Some(flush_id) = pending_stop.take() {
            tracing::debug!(stream_id, flush_id, "pending stop observed after stream_initialise");
            let _ = output.send(Msg::Flush(flush_id));
            return None;
        }

        let decoded_info = match init_result {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(stream_id, error = %e, "stream_initialise failed; stopping stream");
                return None;
            }
        };

        if output.send(Msg::DecodedStream(decoded_info.clone())).is_err() {
            return None; // downstream gone; nothing more to do
        }

        loop {
            if let Some(flush_id) = pending_stop.take() {
                let _ = output.send(Msg::Flush(flush_id));
                return None;
            }

            // A seek lands here rather than wherever it was requested:
            // only the codec that owns this stream's decode state can
            // turn a sample position into a byte offset.
            if let Some(request) = pending_seek.take() {
                let flush_id = if request.stream_id == stream_id {
                    codec
                        .try_seek(request.sample)
                        .and_then(|byte_offset| self.handler_registry.resolve(handler).map(|h| h.try_seek(stream_id, byte_offset)))
                        .unwrap_or(ID_INVALID)
                } else {
                    ID_INVALID // stale request for a stream that already ended
                };
                request.reply(flush_id);
                continue;
            }

            match codec.process() {
                Ok(ProcessOutcome::Audio(chunk)) => {
                    let permit = self.factory.acquire_decoded_audio();
                    let pcm = Msg::AudioPcm(aurastream_core::msg::AudioPcmMsg {
                        audio: chunk.audio.with_permit(Arc::new(permit)),
                        size_jiffies: chunk.size_jiffies,
                        track_offset_jiffies: 0,
                        ramp: aurastream_core::Ramp::none(),
                    });
                    if output.send(pcm).is_err() {
                        return None;
                    }
                }
                Ok(ProcessOutcome::Ended) => return None,
                Err(e) => {
                    tracing::warn!(stream_id, error = %e, "codec process error; stopping stream");
                    return None;
                }
            }
        }
    }

    /// Buffer up to [`RECOGNITION_WINDOW_BYTES`] without losing any of it
    /// (the bytes are handed back to the chosen codec's source).
    fn buffer_recognition_window(&self, input: &Receiver<Msg>) -> Result<Vec<u8>, Msg> {
        let mut window = Vec::with_capacity(RECOGNITION_WINDOW_BYTES);
        while window.len() < RECOGNITION_WINDOW_BYTES {
            match input.recv() {
                Ok(Msg::AudioEncoded(bytes)) => window.extend_from_slice(bytes.as_slice()),
                Ok(other) => return Err(other),
                Err(_) => return Err(Msg::Quit),
            }
        }
        Ok(window)
    }
}
