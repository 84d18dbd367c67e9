//! `Ramper`: start-of-stream fade-in (spec.md §4, stage 7).
//!
//! Every `DecodedStream` is followed by a short ramp-up so the first
//! samples of a new stream never click in at full volume, whatever the
//! state of ramps further downstream.

use crate::durations::ramp_short_jiffies;
use crate::stage::MsgSource;
use aurastream_core::msg::Msg;
use aurastream_core::ramp::Ramp;

pub struct Ramper<S> {
    upstream: S,
    ramp: Ramp,
}

impl<S: MsgSource> Ramper<S> {
    pub fn new(upstream: S) -> Self {
        Self { upstream, ramp: Ramp::none() }
    }
}

impl<S: MsgSource> MsgSource for Ramper<S> {
    fn pull(&mut self) -> Msg {
        let msg = self.upstream.pull();
        match msg {
            Msg::DecodedStream(_) => {
                self.ramp = Ramp::start_up(ramp_short_jiffies());
                msg
            }
            Msg::AudioPcm(mut pcm) => {
                if self.ramp.is_active() {
                    pcm.ramp = pcm.ramp.combine(&self.ramp);
                    self.ramp.advance(pcm.size_jiffies);
                }
                Msg::AudioPcm(pcm)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::msg::{AudioPcmMsg, DecodedStreamInfo};
    use aurastream_core::handler::StreamHandlerId;
    use std::collections::VecDeque;

    fn handler_id() -> StreamHandlerId {
        let registry = aurastream_core::handler::StreamHandlerRegistry::new();
        struct NoOp;
        impl aurastream_core::handler::StreamHandler for NoOp {
            fn ok_to_play(&self) -> aurastream_core::handler::OkToPlay {
                aurastream_core::handler::OkToPlay::Yes
            }
            fn try_stop(&self, _s: u32) -> u32 {
                0
            }
            fn try_seek(&self, _s: u32, _o: u64) -> u32 {
                0
            }
        }
        let h: std::sync::Arc<dyn aurastream_core::handler::StreamHandler> = std::sync::Arc::new(NoOp);
        registry.register(&h)
    }

    struct Fixture(VecDeque<Msg>);
    impl MsgSource for Fixture {
        fn pull(&mut self) -> Msg {
            self.0.pop_front().unwrap_or(Msg::Quit)
        }
    }

    fn decoded_stream_info() -> DecodedStreamInfo {
        DecodedStreamInfo {
            stream_id: 1,
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
            handler: handler_id(),
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

    #[test]
    fn decoded_stream_starts_a_ramp_up() {
        let fixture = Fixture(VecDeque::from([Msg::DecodedStream(decoded_stream_info()), pcm(1000)]));
        let mut ramper = Ramper::new(fixture);
        ramper.pull();
        let Msg::AudioPcm(pcm) = ramper.pull() else { panic!("expected AudioPcm") };
        assert!(pcm.ramp.current_value() < aurastream_core::ramp::RAMP_MAX);
    }

    #[test]
    fn passthrough_once_ramp_completes() {
        let fixture = Fixture(VecDeque::from([
            Msg::DecodedStream(decoded_stream_info()),
            pcm(ramp_short_jiffies()),
            pcm(1000),
        ]));
        let mut ramper = Ramper::new(fixture);
        ramper.pull();
        ramper.pull();
        let Msg::AudioPcm(pcm) = ramper.pull() else { panic!("expected AudioPcm") };
        assert_eq!(pcm.ramp.current_value(), aurastream_core::ramp::RAMP_MAX);
    }
}
