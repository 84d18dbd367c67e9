//! `VariableDelay`: grows or shrinks the pipeline's buffered latency on
//! request (spec.md §4.4.3). Two instances are wired into the pipeline —
//! "left" between seeker and skipper accepting user-requested latency,
//! "right" before the starvation ramper accepting animator-reported
//! latency — each independently ramping around its own adjustment.

use crate::durations::ramp_short_jiffies;
use crate::stage::{MsgSource, RampState};
use aurastream_core::jiffies::jiffies_per_sample;
use aurastream_core::msg::{AudioPcmMsg, Msg, SilenceMsg};
use aurastream_core::ramp::Ramp;
use std::sync::Mutex;
use std::sync::Arc;

/// Shared handle used to request a delay change from another thread.
/// Positive jiffies grow the delay (silence is inserted); negative jiffies
/// shrink it (audio is dropped).
#[derive(Default)]
pub struct DelayControl {
    pending: Mutex<Option<i64>>,
}

impl DelayControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn adjust(&self, delta_jiffies: i64) {
        let mut guard = self.pending.lock().expect("delay control poisoned");
        *guard = Some(guard.unwrap_or(0) + delta_jiffies);
    }

    fn take(&self) -> Option<i64> {
        self.pending.lock().expect("delay control poisoned").take()
    }
}

pub struct VariableDelay<S> {
    upstream: S,
    control: Arc<DelayControl>,
    state: RampState,
    ramp: Ramp,
    growing_remaining: u64,
    shrinking_remaining: u64,
}

impl<S: MsgSource> VariableDelay<S> {
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            control: DelayControl::new(),
            state: RampState::Running,
            ramp: Ramp::none(),
            growing_remaining: 0,
            shrinking_remaining: 0,
        }
    }

    pub fn control(&self) -> Arc<DelayControl> {
        self.control.clone()
    }

    fn apply_ramp(&mut self, mut pcm: AudioPcmMsg) -> Msg {
        pcm.ramp = pcm.ramp.combine(&self.ramp);
        self.ramp.advance(pcm.size_jiffies);
        Msg::AudioPcm(pcm)
    }
}

/// Drop `jiffies_to_drop` from the front of `pcm`, sharing the backing
/// sample storage with whatever remains. Returns the remaining message (if
/// any audio is left) and whatever portion of `jiffies_to_drop` could not
/// be satisfied by this single message.
fn drop_from_front(pcm: AudioPcmMsg, jiffies_to_drop: u64) -> (Option<AudioPcmMsg>, u64) {
    if jiffies_to_drop >= pcm.size_jiffies {
        return (None, jiffies_to_drop - pcm.size_jiffies);
    }
    let jps = jiffies_per_sample(pcm.audio.sample_rate());
    let frames_to_drop = (jiffies_to_drop / jps) as usize;
    let (_, after) = pcm.audio.split_at_frame(frames_to_drop);
    let dropped_jiffies = frames_to_drop as u64 * jps;
    let remaining = AudioPcmMsg {
        audio: after,
        size_jiffies: pcm.size_jiffies - dropped_jiffies,
        track_offset_jiffies: pcm.track_offset_jiffies + dropped_jiffies,
        ramp: pcm.ramp,
    };
    (Some(remaining), 0)
}

impl<S: MsgSource> MsgSource for VariableDelay<S> {
    fn pull(&mut self) -> Msg {
        loop {
            if self.state == RampState::Running {
                if let Some(delta) = self.control.take() {
                    if delta != 0 {
                        self.state = RampState::RampingDown;
                        self.ramp = Ramp::start_down(ramp_short_jiffies());
                        if delta > 0 {
                            self.growing_remaining = delta as u64;
                        } else {
                            self.shrinking_remaining = (-delta) as u64;
                        }
                    }
                }
            }

            match self.state {
                RampState::RampingDown => match self.upstream.pull() {
                    Msg::AudioPcm(pcm) => {
                        let msg = self.apply_ramp(pcm);
                        if self.ramp.is_silent() {
                            self.state = RampState::RampedDown;
                        }
                        return msg;
                    }
                    other => return other,
                },
                RampState::RampedDown if self.growing_remaining > 0 => {
                    let chunk = self.growing_remaining.min(aurastream_core::jiffies::JIFFIES_PER_SECOND / 100);
                    self.growing_remaining -= chunk;
                    if self.growing_remaining == 0 {
                        self.state = RampState::RampingUp;
                        self.ramp = Ramp::start_up(ramp_short_jiffies());
                    }
                    return Msg::Silence(SilenceMsg { size_jiffies: chunk, track_offset_jiffies: 0 });
                }
                RampState::RampedDown if self.shrinking_remaining > 0 => match self.upstream.pull() {
                    Msg::AudioPcm(pcm) => {
                        let (remaining, leftover) = drop_from_front(pcm, self.shrinking_remaining);
                        self.shrinking_remaining = leftover;
                        match remaining {
                            Some(pcm) if self.shrinking_remaining == 0 => {
                                self.state = RampState::RampingUp;
                                self.ramp = Ramp::start_up(ramp_short_jiffies());
                                return self.apply_ramp(pcm);
                            }
                            Some(_) => continue, // fully consumed toward the drop target, fetch more
                            None => continue,
                        }
                    }
                    other => return other,
                },
                RampState::RampedDown => {
                    // No adjustment pending; nothing to synthesize or drop, fall through to idle pull.
                    self.state = RampState::RampingUp;
                    self.ramp = Ramp::start_up(ramp_short_jiffies());
                    continue;
                }
                RampState::RampingUp => match self.upstream.pull() {
                    Msg::AudioPcm(pcm) => {
                        let msg = self.apply_ramp(pcm);
                        if self.ramp.is_full() {
                            self.state = RampState::Running;
                        }
                        return msg;
                    }
                    other => return other,
                },
                RampState::Running | RampState::Starting => return self.upstream.pull(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::decoded_audio::DecodedAudio;
    use std::collections::VecDeque;

    struct Fixture(VecDeque<Msg>);
    impl MsgSource for Fixture {
        fn pull(&mut self) -> Msg {
            self.0.pop_front().unwrap_or(Msg::Quit)
        }
    }

    fn pcm(frames: usize, jiffies: u64) -> Msg {
        Msg::AudioPcm(AudioPcmMsg {
            audio: DecodedAudio::new(vec![1.0; frames * 2], 2, 44_100),
            size_jiffies: jiffies,
            track_offset_jiffies: 0,
            ramp: Ramp::none(),
        })
    }

    #[test]
    fn growing_delay_inserts_silence_then_resumes() {
        let short = ramp_short_jiffies();
        let fixture = Fixture(VecDeque::from([pcm(10, short), pcm(10, short)]));
        let mut delay = VariableDelay::new(fixture);
        let control = delay.control();
        control.adjust(1000);
        let ramping_down = delay.pull();
        assert!(matches!(ramping_down, Msg::AudioPcm(_)));
        let silence = delay.pull();
        assert!(matches!(silence, Msg::Silence(_)));
    }

    #[test]
    fn shrinking_delay_drops_requested_jiffies() {
        let short = ramp_short_jiffies();
        let jps = jiffies_per_sample(44_100);
        let drop_amount = jps * 4; // drop 4 frames worth
        let fixture = Fixture(VecDeque::from([pcm(10, short), pcm(20, jps * 20)]));
        let mut delay = VariableDelay::new(fixture);
        delay.control().adjust(-(drop_amount as i64));
        delay.pull(); // ramps down to silence
        let resumed = delay.pull();
        match resumed {
            Msg::AudioPcm(pcm) => assert_eq!(pcm.audio.frames(), 16),
            other => panic!("expected AudioPcm, got {}", other.variant_name()),
        }
    }
}
