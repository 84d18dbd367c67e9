//! `Waiter`: pre-informed of a flush id to expect, ramps down, discards
//! audio until that flush arrives, then ramps back up (spec.md §4.4.4).
//! Used by protocols that must pause pending an external event (e.g. a
//! live source stalling) rather than anything inside the pipeline.

use crate::durations::ramp_short_jiffies;
use crate::stage::{MsgSource, RampState};
use aurastream_core::msg::Msg;
use aurastream_core::ramp::Ramp;
use aurastream_types::FlushId;
use std::sync::{Arc, Mutex};

/// Shared handle used to arm the waiter with the flush id it should expect.
#[derive(Default)]
pub struct WaiterControl {
    armed: Mutex<Option<FlushId>>,
}

impl WaiterControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn arm(&self, flush_id: FlushId) {
        *self.armed.lock().expect("waiter control poisoned") = Some(flush_id);
    }

    fn take(&self) -> Option<FlushId> {
        self.armed.lock().expect("waiter control poisoned").take()
    }
}

pub struct Waiter<S> {
    upstream: S,
    control: Arc<WaiterControl>,
    state: RampState,
    ramp: Ramp,
    awaited_flush: Option<FlushId>,
}

impl<S: MsgSource> Waiter<S> {
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            control: WaiterControl::new(),
            state: RampState::Running,
            ramp: Ramp::none(),
            awaited_flush: None,
        }
    }

    pub fn control(&self) -> Arc<WaiterControl> {
        self.control.clone()
    }
}

impl<S: MsgSource> MsgSource for Waiter<S> {
    fn pull(&mut self) -> Msg {
        loop {
            if self.state == RampState::Running {
                if let Some(flush_id) = self.control.take() {
                    self.awaited_flush = Some(flush_id);
                    self.state = RampState::RampingDown;
                    self.ramp = Ramp::start_down(ramp_short_jiffies());
                }
            }

            let msg = self.upstream.pull();

            match self.state {
                RampState::RampingDown => match msg {
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
    fn armed_waiter_discards_until_matching_flush() {
        let fixture = Fixture(VecDeque::from([
            pcm(ramp_short_jiffies()),
            pcm(200),
            Msg::Flush(42),
            pcm(1000),
        ]));
        let mut waiter = Waiter::new(fixture);
        waiter.control().arm(42);
        waiter.pull(); // ramps down fully
        let flush = waiter.pull();
        assert!(matches!(flush, Msg::Flush(42)));
        let resumed = waiter.pull();
        assert!(matches!(resumed, Msg::AudioPcm(_)));
    }
}
