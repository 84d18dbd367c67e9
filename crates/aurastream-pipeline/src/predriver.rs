//! `PreDriver`: the last stage before the animator. Converts `AudioPcm`/
//! `Silence` into `Playable`, binding `Silence`'s sample rate/channel count
//! from the most recently seen `DecodedStream` since `Silence` itself
//! carries neither. Anything else that is not in the driver-safe set
//! (spec.md §4.4.5, [`Msg::is_driver_safe`]) is discarded with a trace log
//! rather than forwarded — the driver must never see it.

use crate::stage::MsgSource;
use aurastream_core::decoded_audio::DecodedAudio;
use aurastream_core::jiffies::jiffies_to_samples;
use aurastream_core::msg::{Msg, PlayableMsg};

pub struct PreDriver<S> {
    upstream: S,
    last_sample_rate: u32,
    last_channels: u16,
}

impl<S: MsgSource> PreDriver<S> {
    pub fn new(upstream: S) -> Self {
        Self { upstream, last_sample_rate: 44_100, last_channels: 2 }
    }
}

impl<S: MsgSource> MsgSource for PreDriver<S> {
    fn pull(&mut self) -> Msg {
        loop {
            let msg = self.upstream.pull();
            match msg {
                Msg::DecodedStream(info) => {
                    self.last_sample_rate = info.sample_rate;
                    self.last_channels = info.channels;
                    return Msg::DecodedStream(info);
                }
                Msg::AudioPcm(pcm) => {
                    let sample_rate = pcm.audio.sample_rate();
                    let channels = pcm.audio.channels();
                    let samples = if pcm.ramp.is_full() {
                        pcm.audio
                    } else {
                        let mut owned: Vec<f32> = pcm.audio.as_slice().to_vec();
                        pcm.ramp.apply(&mut owned);
                        DecodedAudio::new(owned, channels, sample_rate)
                    };
                    return Msg::Playable(PlayableMsg { samples, sample_rate, channels });
                }
                Msg::Silence(silence) => {
                    let channels = self.last_channels.max(1);
                    let frames = jiffies_to_samples(silence.size_jiffies, self.last_sample_rate) as usize;
                    let samples = DecodedAudio::new(vec![0.0; frames * channels as usize], channels, self.last_sample_rate);
                    return Msg::Playable(PlayableMsg { samples, sample_rate: self.last_sample_rate, channels });
                }
                other if other.is_driver_safe() => return other,
                other => {
                    tracing::trace!(variant = other.variant_name(), "predriver discarding non-driver-safe message");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::handler::{OkToPlay, StreamHandler, StreamHandlerRegistry};
    use aurastream_core::msg::{AudioPcmMsg, DecodedStreamInfo, SilenceMsg};
    use aurastream_core::ramp::Ramp;
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct Fixture(VecDeque<Msg>);
    impl MsgSource for Fixture {
        fn pull(&mut self) -> Msg {
            self.0.pop_front().unwrap_or(Msg::Quit)
        }
    }

    struct NoOpHandler;
    impl StreamHandler for NoOpHandler {
        fn ok_to_play(&self) -> OkToPlay {
            OkToPlay::Yes
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            0
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            0
        }
    }

    fn stream_info(sample_rate: u32, channels: u16) -> Msg {
        let registry = StreamHandlerRegistry::new();
        let handler: Arc<dyn StreamHandler> = Arc::new(NoOpHandler);
        Msg::DecodedStream(DecodedStreamInfo {
            stream_id: 1,
            bit_rate: None,
            bit_depth: None,
            sample_rate,
            channels,
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
    fn silence_binds_rate_and_channels_from_last_decoded_stream() {
        let fixture = Fixture(VecDeque::from([
            stream_info(48_000, 2),
            Msg::Silence(SilenceMsg { size_jiffies: aurastream_core::jiffies::JIFFIES_PER_SECOND, track_offset_jiffies: 0 }),
        ]));
        let mut predriver = PreDriver::new(fixture);
        predriver.pull();
        match predriver.pull() {
            Msg::Playable(p) => {
                assert_eq!(p.sample_rate, 48_000);
                assert_eq!(p.channels, 2);
                assert_eq!(p.samples.frames(), 48_000);
            }
            other => panic!("expected Playable, got {}", other.variant_name()),
        }
    }

    #[test]
    fn non_driver_safe_messages_are_discarded() {
        let fixture = Fixture(VecDeque::from([Msg::MetaText("now playing".into()), Msg::Quit]));
        let mut predriver = PreDriver::new(fixture);
        assert!(matches!(predriver.pull(), Msg::Quit));
    }

    #[test]
    fn audio_pcm_is_converted_to_playable() {
        let fixture = Fixture(VecDeque::from([Msg::AudioPcm(AudioPcmMsg {
            audio: aurastream_core::decoded_audio::DecodedAudio::new(vec![1.0, -1.0], 2, 44_100),
            size_jiffies: 10,
            track_offset_jiffies: 0,
            ramp: Ramp::none(),
        })]));
        let mut predriver = PreDriver::new(fixture);
        assert!(matches!(predriver.pull(), Msg::Playable(_)));
    }
}
