//! `DecodedReservoir`: a bounded FIFO of decoded audio, measured in
//! playback-time jiffies rather than bytes (spec.md §4.5).
//!
//! Two behaviours live here beyond plain backpressure:
//! - **Gorging**: at the start of each stream, no audio is released
//!   downstream until `gorge_jiffies` has accumulated, so a slow network
//!   does not trigger an immediate starvation ramp right after a track
//!   change (spec.md §4.1 Supplemented Features, §4.5).
//! - **Starvation threshold**: [`DecodedReservoir::is_starving`] answers
//!   whether contained audio has dropped below the level
//!   [`crate::starvation_ramper::StarvationRamper`] watches for.

use crate::stage::MsgSource;
use aurastream_core::msg::{AudioPcmMsg, Msg, SilenceMsg};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Tuning limits for [`DecodedReservoir`] (spec.md §4.5).
#[derive(Clone, Copy, Debug)]
pub struct DecodedReservoirConfig {
    pub max_jiffies: u64,
    pub gorge_jiffies: u64,
    pub starvation_threshold_jiffies: u64,
}

impl Default for DecodedReservoirConfig {
    fn default() -> Self {
        Self {
            max_jiffies: aurastream_core::jiffies::JIFFIES_PER_SECOND * 3,
            gorge_jiffies: aurastream_core::jiffies::JIFFIES_PER_SECOND / 2,
            starvation_threshold_jiffies: aurastream_core::jiffies::JIFFIES_PER_SECOND / 10,
        }
    }
}

struct Inner {
    queue: VecDeque<Msg>,
    jiffies: u64,
    /// Jiffies accumulated since the most recent `DecodedStream`, used to
    /// decide when gorging ends.
    jiffies_since_stream_start: u64,
    gorging: bool,
    closed: bool,
}

pub struct DecodedReservoir {
    config: DecodedReservoirConfig,
    inner: Mutex<Inner>,
    not_full: Condvar,
    releasable: Condvar,
}

impl DecodedReservoir {
    pub fn new(config: DecodedReservoirConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                jiffies: 0,
                jiffies_since_stream_start: 0,
                gorging: true,
                closed: false,
            }),
            not_full: Condvar::new(),
            releasable: Condvar::new(),
        }
    }

    pub fn size_jiffies(&self) -> u64 {
        self.inner.lock().expect("decoded reservoir lock poisoned").jiffies
    }

    /// Below [`DecodedReservoirConfig::starvation_threshold_jiffies`] and
    /// not in the initial gorge window — the condition
    /// [`crate::starvation_ramper::StarvationRamper`] watches for.
    pub fn is_starving(&self) -> bool {
        let inner = self.inner.lock().expect("decoded reservoir lock poisoned");
        !inner.gorging && inner.jiffies < self.config.starvation_threshold_jiffies && !inner.closed
    }

    pub fn push(&self, msg: Msg) {
        let mut inner = self.inner.lock().expect("decoded reservoir lock poisoned");
        let msg_jiffies = msg_jiffies(&msg);
        inner = self
            .not_full
            .wait_while(inner, |i| i.jiffies >= self.config.max_jiffies && !i.closed)
            .expect("decoded reservoir lock poisoned");
        if inner.closed {
            return;
        }
        if matches!(msg, Msg::DecodedStream(_)) {
            inner.jiffies_since_stream_start = 0;
            inner.gorging = self.config.gorge_jiffies > 0;
        } else {
            inner.jiffies_since_stream_start += msg_jiffies;
            if inner.gorging && inner.jiffies_since_stream_start >= self.config.gorge_jiffies {
                inner.gorging = false;
            }
        }
        inner.jiffies += msg_jiffies;
        inner.queue.push_back(msg);
        self.releasable.notify_one();
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("decoded reservoir lock poisoned");
        inner.closed = true;
        self.not_full.notify_all();
        self.releasable.notify_all();
    }
}

fn msg_jiffies(msg: &Msg) -> u64 {
    match msg {
        Msg::AudioPcm(AudioPcmMsg { size_jiffies, .. }) => *size_jiffies,
        Msg::Silence(SilenceMsg { size_jiffies, .. }) => *size_jiffies,
        _ => 0,
    }
}

impl DecodedReservoir {
    /// Blocks while gorging holds back the head of the queue, even if
    /// messages are present, so the ramper downstream never starts
    /// emitting audio until the gorge window has filled.
    fn pull_one(&self) -> Msg {
        let mut inner = self.inner.lock().expect("decoded reservoir lock poisoned");
        loop {
            let front_is_control =
                inner.queue.front().map(|m| msg_jiffies(m) == 0).unwrap_or(false);
            if !inner.queue.is_empty() && (front_is_control || !inner.gorging) {
                let msg = inner.queue.pop_front().expect("checked non-empty above");
                inner.jiffies = inner.jiffies.saturating_sub(msg_jiffies(&msg));
                self.not_full.notify_one();
                return msg;
            }
            if inner.closed {
                return Msg::Quit;
            }
            inner = self.releasable.wait(inner).expect("decoded reservoir lock poisoned");
        }
    }
}

impl MsgSource for &DecodedReservoir {
    fn pull(&mut self) -> Msg {
        (**self).pull_one()
    }
}

/// So an owned `Arc<DecodedReservoir>` can anchor the start of a stage
/// chain without a borrow tying the chain to the reservoir's lifetime.
impl MsgSource for std::sync::Arc<DecodedReservoir> {
    fn pull(&mut self) -> Msg {
        self.as_ref().pull_one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::ramp::Ramp;

    fn pcm(jiffies: u64) -> Msg {
        Msg::AudioPcm(AudioPcmMsg {
            audio: DecodedAudio::new(vec![0.0; 4], 2, 44_100),
            size_jiffies: jiffies,
            track_offset_jiffies: 0,
            ramp: Ramp::none(),
        })
    }

    #[test]
    fn gorging_holds_back_audio_until_threshold() {
        let reservoir = DecodedReservoir::new(DecodedReservoirConfig {
            max_jiffies: 10_000,
            gorge_jiffies: 100,
            starvation_threshold_jiffies: 10,
        });
        reservoir.push(pcm(40));
        reservoir.push(pcm(40));
        reservoir.push(pcm(40));
        let mut pull = &reservoir;
        // total pushed = 120 >= gorge_jiffies(100): gorging has ended, first message now releasable.
        let msg = pull.pull();
        assert!(matches!(msg, Msg::AudioPcm(_)));
    }

    #[test]
    fn starvation_detected_below_threshold_after_gorge() {
        let reservoir = DecodedReservoir::new(DecodedReservoirConfig {
            max_jiffies: 10_000,
            gorge_jiffies: 10,
            starvation_threshold_jiffies: 100,
        });
        reservoir.push(pcm(20));
        let mut pull = &reservoir;
        pull.pull();
        assert!(reservoir.is_starving());
    }

    #[test]
    fn jiffies_accounted_on_push_and_pull() {
        let reservoir = DecodedReservoir::new(DecodedReservoirConfig {
            max_jiffies: 10_000,
            gorge_jiffies: 0,
            starvation_threshold_jiffies: 0,
        });
        reservoir.push(pcm(50));
        assert_eq!(reservoir.size_jiffies(), 50);
        let mut pull = &reservoir;
        pull.pull();
        assert_eq!(reservoir.size_jiffies(), 0);
    }
}
