//! `StarvationRamper`: watches the decoded reservoir's fullness and ramps
//! audio down before it runs dry, recovering (possibly mid-ramp) if audio
//! returns in time (spec.md §4.4.4, §8 scenario S3).
//!
//! Runs on the pipeline's highest-priority thread in the full assembly
//! (spec.md §5) since a late starvation check is an audible glitch, not
//! just a missed optimisation.

use crate::durations::ramp_long_jiffies;
use crate::reservoir::DecodedReservoir;
use crate::stage::{MsgSource, RampState};
use aurastream_core::handler::{StreamHandlerId, StreamHandlerRegistry};
use aurastream_core::msg::Msg;
use aurastream_core::ramp::Ramp;
use aurastream_types::StreamId;
use std::sync::Arc;

pub struct StarvationRamper<S> {
    upstream: S,
    reservoir: Arc<DecodedReservoir>,
    registry: Arc<StreamHandlerRegistry>,
    state: RampState,
    ramp: Ramp,
    current_stream: Option<StreamId>,
    current_handler: Option<StreamHandlerId>,
    notified: bool,
}

impl<S: MsgSource> StarvationRamper<S> {
    pub fn new(upstream: S, reservoir: Arc<DecodedReservoir>, registry: Arc<StreamHandlerRegistry>) -> Self {
        Self {
            upstream,
            reservoir,
            registry,
            state: RampState::Running,
            ramp: Ramp::none(),
            current_stream: None,
            current_handler: None,
            notified: false,
        }
    }

    fn notify_starving(&mut self) {
        if self.notified {
            return;
        }
        self.notified = true;
        if let Some(handler) = self.current_handler.and_then(|id| self.registry.resolve(id)) {
            handler.notify_starving("pipeline", self.current_stream.unwrap_or(0));
        }
    }
}

impl<S: MsgSource> MsgSource for StarvationRamper<S> {
    fn pull(&mut self) -> Msg {
        let starving = self.reservoir.is_starving();
        match self.state {
            RampState::Running if starving => {
                self.state = RampState::RampingDown;
                self.ramp = Ramp::start_down(ramp_long_jiffies());
                self.notify_starving();
            }
            RampState::RampingDown if !starving => {
                // Reverse mid-ramp: preserves current_value and mirrors
                // remaining_jiffies (spec.md §8 property 4).
                self.ramp.reverse();
                self.state = RampState::RampingUp;
                self.notified = false;
            }
            RampState::RampedDown if !starving => {
                self.state = RampState::RampingUp;
                self.ramp = Ramp::start_up(ramp_long_jiffies());
                self.notified = false;
            }
            _ => {}
        }

        let msg = self.upstream.pull();

        if let Msg::DecodedStream(info) = &msg {
            self.current_stream = Some(info.stream_id);
            self.current_handler = Some(info.handler);
            self.notified = false;
        }

        match self.state {
            RampState::RampingDown | RampState::RampingUp => match msg {
                Msg::AudioPcm(mut pcm) => {
                    pcm.ramp = pcm.ramp.combine(&self.ramp);
                    self.ramp.advance(pcm.size_jiffies);
                    if self.state == RampState::RampingDown && self.ramp.is_silent() {
                        self.state = RampState::RampedDown;
                    }
                    if self.state == RampState::RampingUp && self.ramp.is_full() {
                        self.state = RampState::Running;
                    }
                    Msg::AudioPcm(pcm)
                }
                other => other,
            },
            _ => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservoir::DecodedReservoirConfig;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::msg::AudioPcmMsg;
    use std::collections::VecDeque;

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

    #[test]
    fn starvation_triggers_ramp_down() {
        let reservoir = Arc::new(DecodedReservoir::new(DecodedReservoirConfig {
            max_jiffies: 10_000,
            gorge_jiffies: 0,
            starvation_threshold_jiffies: 1_000_000_000,
        }));
        let registry = Arc::new(StreamHandlerRegistry::new());
        let fixture = Fixture(VecDeque::from([pcm(100)]));
        let mut ramper = StarvationRamper::new(fixture, reservoir, registry);
        let msg = ramper.pull();
        match msg {
            Msg::AudioPcm(pcm) => assert!(pcm.ramp.current_value() < aurastream_core::ramp::RAMP_MAX),
            other => panic!("expected AudioPcm, got {}", other.variant_name()),
        }
    }

    #[test]
    fn non_starving_reservoir_passes_audio_through_unramped() {
        let reservoir = Arc::new(DecodedReservoir::new(DecodedReservoirConfig {
            max_jiffies: 10_000,
            gorge_jiffies: 0,
            starvation_threshold_jiffies: 0,
        }));
        let registry = Arc::new(StreamHandlerRegistry::new());
        let fixture = Fixture(VecDeque::from([pcm(100)]));
        let mut ramper = StarvationRamper::new(fixture, reservoir, registry);
        match ramper.pull() {
            Msg::AudioPcm(pcm) => assert_eq!(pcm.ramp.current_value(), aurastream_core::ramp::RAMP_MAX),
            other => panic!("expected AudioPcm, got {}", other.variant_name()),
        }
    }
}
