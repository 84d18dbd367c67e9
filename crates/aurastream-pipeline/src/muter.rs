//! `Muter`: operator-requested mute/unmute with a long ramp (spec.md §4.4.4).
//! While fully muted it keeps pulling from upstream — discarding the
//! audio content but still emitting a same-duration `Silence` in its
//! place — so timing messages (`Drain`, `Track`, ...) and reservoir
//! draining continue exactly as if audio were still flowing.

use crate::durations::ramp_long_jiffies;
use crate::stage::{MsgSource, RampState};
use aurastream_core::msg::{Msg, SilenceMsg};
use aurastream_core::ramp::Ramp;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MuterControl {
    pending: Mutex<Option<bool>>,
}

impl MuterControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_muted(&self, muted: bool) {
        *self.pending.lock().expect("muter control poisoned") = Some(muted);
    }

    fn take(&self) -> Option<bool> {
        self.pending.lock().expect("muter control poisoned").take()
    }
}

pub struct Muter<S> {
    upstream: S,
    control: Arc<MuterControl>,
    state: RampState,
    ramp: Ramp,
}

impl<S: MsgSource> Muter<S> {
    pub fn new(upstream: S) -> Self {
        Self { upstream, control: MuterControl::new(), state: RampState::Running, ramp: Ramp::none() }
    }

    pub fn control(&self) -> Arc<MuterControl> {
        self.control.clone()
    }
}

impl<S: MsgSource> MsgSource for Muter<S> {
    fn pull(&mut self) -> Msg {
        loop {
            if let Some(muted) = self.control.take() {
                match (muted, self.state) {
                    (true, RampState::Running) | (true, RampState::RampingUp) => {
                        self.ramp.reverse_or_start_down();
                        self.state = RampState::RampingDown;
                    }
                    (false, RampState::RampedDown) | (false, RampState::RampingDown) => {
                        self.ramp.reverse_or_start_up();
                        self.state = RampState::RampingUp;
                    }
                    _ => {}
                }
            }

            match self.state {
                RampState::RampingDown => match self.upstream.pull() {
                    Msg::AudioPcm(mut pcm) => {
                        pcm.ramp = pcm.ramp.combine(&self.ramp);
                        self.ramp.advance(pcm.size_jiffies);
                        if self.ramp.is_silent() {
                            self.state = RampState::RampedDown;
                        }
                        return Msg::AudioPcm(pcm);
                    }
                    other => return other,
                },
                RampState::RampedDown => match self.upstream.pull() {
                    Msg::AudioPcm(pcm) => {
                        return Msg::Silence(SilenceMsg {
                            size_jiffies: pcm.size_jiffies,
                            track_offset_jiffies: pcm.track_offset_jiffies,
                        });
                    }
                    other => return other,
                },
                RampState::RampingUp => match self.upstream.pull() {
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
                RampState::Running | RampState::Starting => return self.upstream.pull(),
            }
        }
    }
}

/// Small extension so `Muter` can start a fresh ramp or reverse an
/// in-flight one uniformly, without duplicating the reversal invariant at
/// every call site.
trait RampExt {
    fn reverse_or_start_down(&mut self);
    fn reverse_or_start_up(&mut self);
}

impl RampExt for Ramp {
    fn reverse_or_start_down(&mut self) {
        if self.is_active() {
            self.reverse();
        } else {
            *self = Ramp::start_down(ramp_long_jiffies());
        }
    }

    fn reverse_or_start_up(&mut self) {
        if self.is_active() {
            self.reverse();
        } else {
            *self = Ramp::start_up(ramp_long_jiffies());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn muted_pipeline_emits_silence_of_same_duration() {
        let fixture = Fixture(VecDeque::from([
            pcm(ramp_long_jiffies()),
            pcm(500),
        ]));
        let mut muter = Muter::new(fixture);
        muter.control().set_muted(true);
        muter.pull(); // ramps fully down
        match muter.pull() {
            Msg::Silence(SilenceMsg { size_jiffies, .. }) => assert_eq!(size_jiffies, 500),
            other => panic!("expected Silence, got {}", other.variant_name()),
        }
    }

    #[test]
    fn unmute_reverses_ramp_mid_flight() {
        let fixture = Fixture(VecDeque::from([
            pcm(ramp_long_jiffies() / 4),
            pcm(200),
        ]));
        let mut muter = Muter::new(fixture);
        muter.control().set_muted(true);
        muter.pull(); // partially down
        muter.control().set_muted(false);
        match muter.pull() {
            Msg::AudioPcm(pcm) => assert!(pcm.ramp.current_value() > 0),
            other => panic!("expected AudioPcm, got {}", other.variant_name()),
        }
    }
}
