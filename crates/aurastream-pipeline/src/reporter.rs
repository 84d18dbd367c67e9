//! `Reporter`: translates pipeline messages into [`ObserverEvent`]s and
//! dispatches them on a dedicated thread (spec.md §5, §6 `IPipelineObserver`),
//! so a slow observer callback never blocks the audio path itself.
//!
//! Two events need more than a one-to-one `Msg` mapping:
//! - `PipelineState` also fires on starvation (spec.md §8 scenario S3:
//!   "Expect: `NotifyPipelineState(Buffering)`"), which [`StarvationRamper`]
//!   downstream acts on but this stage can equally observe by polling the
//!   same [`DecodedReservoir`] the ramper watches.
//! - `Time` is derived from every `AudioPcm`'s `track_offset_jiffies`,
//!   throttled to once per elapsed second so it doesn't flood the observer
//!   channel at audio-chunk rate.
//!
//! [`StarvationRamper`]: crate::starvation_ramper::StarvationRamper

use crate::reservoir::DecodedReservoir;
use crate::stage::MsgSource;
use aurastream_core::jiffies::JIFFIES_PER_SECOND;
use aurastream_core::msg::Msg;
use aurastream_types::{ObserverEvent, PipelineState, StreamInfo};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

pub trait PipelineObserver: Send + Sync {
    fn notify(&self, event: ObserverEvent);
}

pub struct Reporter<S> {
    upstream: S,
    sender: Sender<ObserverEvent>,
    decoded: Arc<DecodedReservoir>,
    buffering: bool,
    last_emitted_second: Option<u64>,
    duration_seconds: Option<u64>,
}

impl<S: MsgSource> Reporter<S> {
    /// Wrap `upstream`, returning the stage and the receiving end callers
    /// hand to [`spawn_event_thread`]. `decoded` is the same reservoir
    /// [`StarvationRamper`](crate::starvation_ramper::StarvationRamper)
    /// watches, so this stage's `Buffering`/`Playing` transitions track its
    /// ramp without needing a channel between the two stages.
    pub fn new(upstream: S, decoded: Arc<DecodedReservoir>) -> (Self, Receiver<ObserverEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            Self { upstream, sender, decoded, buffering: false, last_emitted_second: None, duration_seconds: None },
            receiver,
        )
    }

    fn translate(&mut self, msg: &Msg) -> Option<ObserverEvent> {
        match msg {
            Msg::Mode { name, .. } => Some(ObserverEvent::Mode { name: name.clone() }),
            Msg::Track(info) => Some(ObserverEvent::Track { id: info.track_id, uri: info.uri.clone() }),
            Msg::MetaText(text) => Some(ObserverEvent::MetaText { text: text.clone() }),
            Msg::DecodedStream(info) => {
                self.duration_seconds = info.total_jiffies.map(|j| j / JIFFIES_PER_SECOND);
                Some(ObserverEvent::StreamInfo {
                    info: StreamInfo {
                        stream_id: info.stream_id,
                        bit_rate: info.bit_rate,
                        bit_depth: info.bit_depth,
                        sample_rate: info.sample_rate,
                        channels: info.channels,
                        codec_name: info.codec_name.clone(),
                        total_jiffies: info.total_jiffies,
                        start_sample: info.start_sample,
                        lossless: info.lossless,
                        seekable: info.seekable,
                        live: info.live,
                    },
                })
            }
            Msg::AudioPcm(pcm) => self.time_event(pcm.track_offset_jiffies),
            _ => None,
        }
    }

    fn time_event(&mut self, track_offset_jiffies: u64) -> Option<ObserverEvent> {
        let seconds = track_offset_jiffies / JIFFIES_PER_SECOND;
        if self.last_emitted_second == Some(seconds) {
            return None;
        }
        self.last_emitted_second = Some(seconds);
        Some(ObserverEvent::Time { seconds, duration_seconds: self.duration_seconds })
    }

    /// Checked once per `pull`, ahead of pulling upstream, so a transition
    /// is reported even during a run of messages `translate` ignores.
    fn starvation_event(&mut self) -> Option<ObserverEvent> {
        let starving = self.decoded.is_starving();
        if starving == self.buffering {
            return None;
        }
        self.buffering = starving;
        let state = if starving { PipelineState::Buffering } else { PipelineState::Playing };
        Some(ObserverEvent::PipelineState { state })
    }
}

impl<S: MsgSource> MsgSource for Reporter<S> {
    fn pull(&mut self) -> Msg {
        if let Some(event) = self.starvation_event() {
            let _ = self.sender.send(event);
        }
        let msg = self.upstream.pull();
        if let Some(event) = self.translate(&msg) {
            // The event thread may be gone (shutdown); losing a status
            // update there is not a reason to disrupt the audio path.
            let _ = self.sender.send(event);
        }
        msg
    }
}

/// Drain `receiver` on its own thread for the lifetime of the pipeline,
/// handing each event to `observer`. Returns the join handle so callers can
/// wait for it to drain and exit once the sender side is dropped.
pub fn spawn_event_thread(receiver: Receiver<ObserverEvent>, observer: Arc<dyn PipelineObserver>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("aurastream-events".into())
        .spawn(move || {
            for event in receiver.iter() {
                observer.notify(event);
            }
        })
        .expect("failed to spawn event dispatch thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservoir::DecodedReservoirConfig;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::msg::AudioPcmMsg;
    use aurastream_core::ramp::Ramp;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Fixture(VecDeque<Msg>);
    impl MsgSource for Fixture {
        fn pull(&mut self) -> Msg {
            self.0.pop_front().unwrap_or(Msg::Quit)
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ObserverEvent>>);
    impl PipelineObserver for Recorder {
        fn notify(&self, event: ObserverEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn non_starving_reservoir() -> Arc<DecodedReservoir> {
        // Default config starts (and, with nothing ever pushed, stays)
        // inside its initial gorge window, so `is_starving` never trips.
        Arc::new(DecodedReservoir::new(DecodedReservoirConfig::default()))
    }

    fn pcm(track_offset_jiffies: u64) -> Msg {
        Msg::AudioPcm(AudioPcmMsg {
            audio: DecodedAudio::new(vec![1.0; 4], 2, 44_100),
            size_jiffies: 0,
            track_offset_jiffies,
            ramp: Ramp::none(),
        })
    }

    #[test]
    fn track_messages_translate_to_observer_events() {
        let fixture = Fixture(VecDeque::from([Msg::MetaText("hello".into()), Msg::Quit]));
        let (mut reporter, rx) = Reporter::new(fixture, non_starving_reservoir());
        let recorder = Arc::new(Recorder::default());
        let handle = spawn_event_thread(rx, recorder.clone());
        reporter.pull();
        reporter.pull();
        drop(reporter); // drops the Sender, letting the event thread exit
        handle.join().unwrap();
        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ObserverEvent::MetaText { text } if text == "hello"));
    }

    #[test]
    fn audio_pcm_emits_time_once_per_elapsed_second() {
        let fixture = Fixture(VecDeque::from([
            pcm(0),
            pcm(JIFFIES_PER_SECOND / 2), // same second, no new event
            pcm(JIFFIES_PER_SECOND),     // crosses into second 1
            Msg::Quit,
        ]));
        let (mut reporter, rx) = Reporter::new(fixture, non_starving_reservoir());
        let recorder = Arc::new(Recorder::default());
        let handle = spawn_event_thread(rx, recorder.clone());
        for _ in 0..4 {
            reporter.pull();
        }
        drop(reporter);
        handle.join().unwrap();
        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ObserverEvent::Time { seconds: 0, .. }));
        assert!(matches!(&events[1], ObserverEvent::Time { seconds: 1, .. }));
    }

    fn audio_chunk(size_jiffies: u64) -> Msg {
        Msg::AudioPcm(AudioPcmMsg {
            audio: DecodedAudio::new(vec![1.0; 4], 2, 44_100),
            size_jiffies,
            track_offset_jiffies: 0,
            ramp: Ramp::none(),
        })
    }

    #[test]
    fn starvation_reports_buffering_then_playing() {
        let reservoir = Arc::new(DecodedReservoir::new(DecodedReservoirConfig {
            max_jiffies: 10_000,
            gorge_jiffies: 0,
            starvation_threshold_jiffies: 500,
        }));
        // A zero-length push still ends the initial gorge window (gorge_jiffies
        // is 0), so `is_starving` starts reflecting the real jiffy count.
        reservoir.push(audio_chunk(0));

        let fixture = Fixture(VecDeque::from([Msg::Quit, Msg::Quit]));
        let (mut reporter, rx) = Reporter::new(fixture, reservoir.clone());
        let recorder = Arc::new(Recorder::default());
        let handle = spawn_event_thread(rx, recorder.clone());
        reporter.pull(); // 0 jiffies buffered, below the 500 threshold: starving
        reservoir.push(audio_chunk(1_000));
        reporter.pull(); // now above threshold: recovered
        drop(reporter);
        handle.join().unwrap();
        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ObserverEvent::PipelineState { state: PipelineState::Buffering }));
        assert!(matches!(&events[1], ObserverEvent::PipelineState { state: PipelineState::Playing }));
    }
}
