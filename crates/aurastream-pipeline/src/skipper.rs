//! `Skipper`: user-requested "skip current track", implemented as a ramp
//! down, `StreamHandler::try_stop`, discard until the matching flush, then
//! ramp back up (spec.md §4.4.4).

use crate::durations::ramp_short_jiffies;
use crate::stage::{MsgSource, RampState};
use aurastream_core::handler::{StreamHandlerId, StreamHandlerRegistry};
use aurastream_core::msg::Msg;
use aurastream_core::ramp::Ramp;
use aurastream_types::{FlushId, StreamId, ID_INVALID};
use std::sync::{Arc, Mutex};

/// Shared handle used to request a skip from another thread.
#[derive(Default)]
pub struct SkipControl {
    requested: Mutex<bool>,
}

impl SkipControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_skip(&self) {
        *self.requested.lock().expect("skip control poisoned") = true;
    }

    fn take(&self) -> bool {
        let mut guard = self.requested.lock().expect("skip control poisoned");
        std::mem::take(&mut *guard)
    }
}

pub struct Skipper<S> {
    upstream: S,
    control: Arc<SkipControl>,
    registry: Arc<StreamHandlerRegistry>,
    state: RampState,
    ramp: Ramp,
    current_stream: Option<StreamId>,
    current_handler: Option<StreamHandlerId>,
    awaited_flush: Option<FlushId>,
}

impl<S: MsgSource> Skipper<S> {
    pub fn new(upstream: S, registry: Arc<StreamHandlerRegistry>) -> Self {
        Self {
            upstream,
            control: SkipControl::new(),
            registry,
            state: RampState::Running,
            ramp: Ramp::none(),
            current_stream: None,
            current_handler: None,
            awaited_flush: None,
        }
    }

    pub fn control(&self) -> Arc<SkipControl> {
        self.control.clone()
    }

    fn issue_stop(&mut self) {
        let stream_id = self.current_stream.unwrap_or(ID_INVALID);
        let flush_id = self
            .current_handler
            .and_then(|id| self.registry.resolve(id))
            .map(|handler| handler.try_stop(stream_id))
            .unwrap_or(ID_INVALID);
        if flush_id == ID_INVALID {
            self.state = RampState::RampingUp;
            self.ramp = Ramp::start_up(ramp_short_jiffies());
        } else {
            self.awaited_flush = Some(flush_id);
        }
    }
}

impl<S: MsgSource> MsgSource for Skipper<S> {
    fn pull(&mut self) -> Msg {
        loop {
            if self.state == RampState::Running && self.control.take() {
                self.state = RampState::RampingDown;
                self.ramp = Ramp::start_down(ramp_short_jiffies());
            }

            let msg = self.upstream.pull();

            if let Msg::DecodedStream(info) = &msg {
                self.current_stream = Some(info.stream_id);
                self.current_handler = Some(info.handler);
            }

            match self.state {
                RampState::RampingDown => match msg {
                    Msg::AudioPcm(mut pcm) => {
                        pcm.ramp = pcm.ramp.combine(&self.ramp);
                        self.ramp.advance(pcm.size_jiffies);
                        if self.ramp.is_silent() {
                            self.state = RampState::RampedDown;
                            self.issue_stop();
                        }
                        return Msg::AudioPcm(pcm);
                    }
                    other => return other,
                },
                RampState::RampedDown => match msg {
                    Msg::Flush(id) if self.awaited_flush == Some(id) => {
                        self.awaited_flush = None;
                        self.state = RampState::RampingUp;
                        self.ramp = Ramp::start_up(ramp_short_jiffies());
                        return Msg::Flush(id);
                    }
                    Msg::AudioPcm(_) | Msg::Silence(_) => continue,
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
    use aurastream_core::handler::{OkToPlay, StreamHandler};
    use aurastream_core::msg::{AudioPcmMsg, DecodedStreamInfo};
    use std::collections::VecDeque;

    struct FixedStop(u32);
    impl StreamHandler for FixedStop {
        fn ok_to_play(&self) -> OkToPlay {
            OkToPlay::Yes
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            self.0
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            ID_INVALID
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
            stream_id: 3,
            bit_rate: None,
            bit_depth: None,
            sample_rate: 44_100,
            channels: 2,
            codec_name: "pcm".into(),
            total_jiffies: None,
            start_sample: 0,
            lossless: true,
            seekable: false,
            live: false,
            handler: registry.register(&handler),
        })
    }

    #[test]
    fn skip_discards_until_matching_flush() {
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler: Arc<dyn StreamHandler> = Arc::new(FixedStop(9));
        let fixture = Fixture(VecDeque::from([
            stream_msg(&registry, handler),
            pcm(ramp_short_jiffies()),
            pcm(500),
            Msg::Flush(9),
            pcm(1000),
        ]));
        let mut skipper = Skipper::new(fixture, registry);
        skipper.control().request_skip();
        skipper.pull(); // DecodedStream
        skipper.pull(); // ramp down fully
        let flush = skipper.pull();
        assert!(matches!(flush, Msg::Flush(9)));
        let resumed = skipper.pull();
        assert!(matches!(resumed, Msg::AudioPcm(_)));
    }
}
