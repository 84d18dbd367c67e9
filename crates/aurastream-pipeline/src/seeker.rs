//! `Seeker`: ramps down around a user-requested seek, then ramps back up
//! once the matching flush arrives (spec.md §4.4.2, §8 scenario S2).
//!
//! A seek request names a time position in seconds, the only thing a
//! caller outside the pipeline can reasonably know. Turning that into a
//! byte offset is the codec's job — [`aurastream_codec::codec::Codec::try_seek`]
//! is the only thing that understands the current stream's sample format
//! well enough to do it — so once the ramp-down has silenced audio this
//! stage hands the request to the codec controller thread via
//! [`aurastream_codec::PendingSeek`] and blocks for its reply before
//! forwarding the resulting byte offset to `StreamHandler::try_seek`
//! (spec.md §8 property 6: a seek always round-trips through the codec
//! that owns the stream, never a caller-supplied byte offset).

use crate::durations::ramp_short_jiffies;
use crate::stage::{MsgSource, RampState};
use aurastream_codec::PendingSeek as CodecPendingSeek;
use aurastream_core::msg::Msg;
use aurastream_core::ramp::Ramp;
use aurastream_types::{FlushId, StreamId, ID_INVALID};
use std::sync::{Arc, Mutex};

/// Reported the outcome of a seek: `flush_id` is [`aurastream_types::ID_INVALID`]
/// if the stream refused (not seekable, out of range).
pub trait SeekObserver: Send + Sync {
    fn seek_complete(&self, handle: u64, flush_id: FlushId);
}

struct SeekRequest {
    handle: u64,
    seconds: f64,
}

/// Shared handle the HTTP control surface uses to request a seek from
/// another thread; the seeker notices it on its next `pull`.
#[derive(Default)]
pub struct SeekerControl {
    pending: Mutex<Option<SeekRequest>>,
}

impl SeekerControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_seek(&self, handle: u64, seconds: f64) {
        *self.pending.lock().expect("seeker control poisoned") = Some(SeekRequest { handle, seconds });
    }

    fn take(&self) -> Option<SeekRequest> {
        self.pending.lock().expect("seeker control poisoned").take()
    }
}

pub struct Seeker<S> {
    upstream: S,
    control: Arc<SeekerControl>,
    codec_seek: Arc<CodecPendingSeek>,
    observer: Option<Arc<dyn SeekObserver>>,
    state: RampState,
    ramp: Ramp,
    current_stream: Option<StreamId>,
    current_sample_rate: Option<u32>,
    pending_handle: Option<u64>,
    pending_seconds: Option<f64>,
    awaited_flush: Option<FlushId>,
}

impl<S: MsgSource> Seeker<S> {
    pub fn new(upstream: S, codec_seek: Arc<CodecPendingSeek>) -> Self {
        Self {
            upstream,
            control: SeekerControl::new(),
            codec_seek,
            observer: None,
            state: RampState::Running,
            ramp: Ramp::none(),
            current_stream: None,
            current_sample_rate: None,
            pending_handle: None,
            pending_seconds: None,
            awaited_flush: None,
        }
    }

    pub fn control(&self) -> Arc<SeekerControl> {
        self.control.clone()
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SeekObserver>) {
        self.observer = Some(observer);
    }

    /// Called once the ramp-down has fully silenced audio: resolve the
    /// requested time position against the codec that owns the current
    /// stream, then ask its handler to honour the byte offset the codec
    /// hands back. Blocks on [`CodecPendingSeek::request`] until the
    /// codec controller thread replies — a deliberate exception to "stages
    /// only block on reservoir pulls" (spec.md §4.5), justified by there
    /// being no other thread that can resolve a sample position into bytes.
    fn issue_seek(&mut self) {
        let seconds = self.pending_seconds.take().unwrap_or(0.0);
        let stream_id = self.current_stream.unwrap_or(ID_INVALID);
        let sample_rate = self.current_sample_rate.unwrap_or(0);

        let flush_id = if sample_rate == 0 || stream_id == ID_INVALID {
            ID_INVALID
        } else {
            let sample = (seconds.max(0.0) * sample_rate as f64) as u64;
            self.codec_seek.request(stream_id, sample)
        };

        if flush_id == ID_INVALID {
            self.complete(ID_INVALID);
        } else {
            self.awaited_flush = Some(flush_id);
        }
    }

    fn complete(&mut self, flush_id: FlushId) {
        if let (Some(handle), Some(observer)) = (self.pending_handle.take(), &self.observer) {
            observer.seek_complete(handle, flush_id);
        }
        self.awaited_flush = None;
        self.state = RampState::RampingUp;
        self.ramp = Ramp::start_up(ramp_short_jiffies());
    }
}

impl<S: MsgSource> MsgSource for Seeker<S> {
    fn pull(&mut self) -> Msg {
        loop {
            if self.state == RampState::Running {
                if let Some(req) = self.control.take() {
                    self.pending_handle = Some(req.handle);
                    self.pending_seconds = Some(req.seconds);
                    self.state = RampState::RampingDown;
                    self.ramp = Ramp::start_down(ramp_short_jiffies());
                }
            }

            let msg = self.upstream.pull();

            if let Msg::DecodedStream(info) = &msg {
                self.current_stream = Some(info.stream_id);
                self.current_sample_rate = Some(info.sample_rate);
            }

            match self.state {
                RampState::RampingDown => match msg {
                    Msg::AudioPcm(mut pcm) => {
                        pcm.ramp = pcm.ramp.combine(&self.ramp);
                        self.ramp.advance(pcm.size_jiffies);
                        if self.ramp.is_silent() {
                            self.state = RampState::RampedDown;
                            self.issue_seek();
                        }
                        return Msg::AudioPcm(pcm);
                    }
                    other => return other,
                },
                RampState::RampedDown => match msg {
                    Msg::Flush(id) if self.awaited_flush == Some(id) => {
                        self.complete(id);
                        return Msg::Flush(id);
                    }
                    Msg::AudioPcm(_) | Msg::Silence(_) => continue, // discard until the matching flush
                    other => return other,
                },
                RampState::RampingUp => match msg {
                    Msg::AudioPcm(mut pcm) => {
                        pcm.ramp = pcm.ramp.combine(&self.ramp);
                        self.ramp.advance(pcm.size_jiffies);
                        if self.ramp.is_full() {
                            self.state = RampState::Running;
                        }
                        return Msg::AudioPcm(pcm);
                    }
                    other => return other,
                },
                RampState::Running | RampState::Starting => return msg,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::handler::{OkToPlay, StreamHandler, StreamHandlerRegistry};
    use aurastream_core::msg::{AudioPcmMsg, DecodedStreamInfo};
    use std::collections::VecDeque;

    struct FixedSeek(u32);
    impl StreamHandler for FixedSeek {
        fn ok_to_play(&self) -> OkToPlay {
            OkToPlay::Yes
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            ID_INVALID
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            self.0
        }
    }

    struct Fixture(VecDeque<Msg>);
    impl MsgSource for Fixture {
        fn pull(&mut self) -> Msg {
            self.0.pop_front().unwrap_or(Msg::Quit)
        }
    }

    fn pcm(jiffies: u64) -> Msg {
        Msg::AudioPcm(AudioPcmMsg {
            audio: DecodedAudio::new(vec![1.0; 4], 2, 44_100),
            size_jiffies: jiffies,
            track_offset_jiffies: 0,
            ramp: Ramp::none(),
        })
    }

    fn stream_msg(registry: &StreamHandlerRegistry, handler: Arc<dyn StreamHandler>) -> Msg {
        Msg::DecodedStream(DecodedStreamInfo {
            stream_id: 7,
            bit_rate: None,
            bit_depth: None,
            sample_rate: 44_100,
            channels: 2,
            codec_name: "pcm".into(),
            total_jiffies: None,
            start_sample: 0,
            lossless: true,
            seekable: true,
            live: false,
            handler: registry.register(&handler),
        })
    }

    /// Spawns a thread that answers exactly one `CodecPendingSeek::request`
    /// with `reply_flush_id`, mimicking the codec controller thread.
    fn answer_one_seek(codec_seek: Arc<CodecPendingSeek>, reply_flush_id: FlushId) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            for _ in 0..200 {
                if let Some(request) = codec_seek.take() {
                    request.reply(reply_flush_id);
                    return;
                }
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        })
    }

    #[test]
    fn seek_rejected_skips_ramp_down_and_reports_invalid() {
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler: Arc<dyn StreamHandler> = Arc::new(FixedSeek(ID_INVALID));
        let fixture = Fixture(VecDeque::from([
            stream_msg(&registry, handler),
            pcm(ramp_short_jiffies()),
            pcm(1000),
        ]));
        let codec_seek = CodecPendingSeek::new();
        let responder = answer_one_seek(codec_seek.clone(), ID_INVALID);
        let mut seeker = Seeker::new(fixture, codec_seek);
        let control = seeker.control();
        control.request_seek(99, 0.5);
        seeker.pull(); // DecodedStream
        seeker.pull(); // ramp all the way down, issues the seek
        let after = seeker.pull();
        assert!(matches!(after, Msg::AudioPcm(_)));
        responder.join().unwrap();
    }

    #[test]
    fn seek_accepted_waits_for_matching_flush() {
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler: Arc<dyn StreamHandler> = Arc::new(FixedSeek(55));
        let fixture = Fixture(VecDeque::from([
            stream_msg(&registry, handler),
            pcm(ramp_short_jiffies()),
            pcm(500), // discarded, no flush yet
            Msg::Flush(55),
            pcm(1000),
        ]));
        let codec_seek = CodecPendingSeek::new();
        let responder = answer_one_seek(codec_seek.clone(), 55);
        let mut seeker = Seeker::new(fixture, codec_seek);
        let control = seeker.control();
        control.request_seek(1, 10.0);
        seeker.pull(); // DecodedStream
        seeker.pull(); // ramps down to silence, issues the seek
        let flush = seeker.pull();
        assert!(matches!(flush, Msg::Flush(55)));
        let resumed = seeker.pull();
        assert!(matches!(resumed, Msg::AudioPcm(_)));
        responder.join().unwrap();
    }
}
