//! `Stopper`: implements play/pause/stop with long ramps and holds the
//! "is it OK to play this stream" decision (spec.md §4.4.1).
//!
//! `RampedDown` is the pipeline's only backpressure point that isn't a
//! reservoir: while paused with no halt pending, `pull` returns
//! [`Msg::Wait`] without ever touching upstream, so nothing downstream of
//! here drains the decoded reservoir and nothing upstream of it blocks on
//! a full one either — the whole chain simply idles.

use crate::durations::ramp_long_jiffies;
use crate::stage::{MsgSource, RampState};
use aurastream_core::handler::{OkToPlay, StreamHandlerId, StreamHandlerRegistry};
use aurastream_core::msg::{DecodedStreamInfo, Msg};
use aurastream_core::ramp::Ramp;
use aurastream_types::{FlushId, HaltId, StreamId, ID_INVALID};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How often a held (`OkToPlay::Later`) stream re-polls its handler while
/// nothing else progresses the chain.
const LATER_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug)]
pub enum StopperCommand {
    Play,
    BeginPause,
    BeginStop(HaltId),
}

#[derive(Default)]
pub struct StopperControl {
    pending: Mutex<Option<StopperCommand>>,
}

impl StopperControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn send(&self, command: StopperCommand) {
        *self.pending.lock().expect("stopper control poisoned") = Some(command);
    }

    fn take(&self) -> Option<StopperCommand> {
        self.pending.lock().expect("stopper control poisoned").take()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopPhase {
    None,
    HaltPending(HaltId),
    AwaitingStopReply,
    AwaitingFlush(FlushId),
}

pub struct Stopper<S> {
    upstream: S,
    control: Arc<StopperControl>,
    registry: Arc<StreamHandlerRegistry>,
    state: RampState,
    ramp: Ramp,
    stop_phase: StopPhase,
    current_stream: Option<StreamId>,
    current_handler: Option<StreamHandlerId>,
    /// A `DecodedStream` held back by an `OkToPlay::Later` verdict, retried
    /// on every subsequent `pull` without consuming any more upstream
    /// messages (spec.md §4.4.1: backpressure, not a skip).
    gated_later: Option<DecodedStreamInfo>,
}

impl<S: MsgSource> Stopper<S> {
    pub fn new(upstream: S, registry: Arc<StreamHandlerRegistry>) -> Self {
        Self {
            upstream,
            control: StopperControl::new(),
            registry,
            state: RampState::Running,
            ramp: Ramp::none(),
            stop_phase: StopPhase::None,
            current_stream: None,
            current_handler: None,
            gated_later: None,
        }
    }

    pub fn control(&self) -> Arc<StopperControl> {
        self.control.clone()
    }

    fn handle_command(&mut self, command: StopperCommand) {
        match command {
            StopperCommand::Play => match self.state {
                RampState::RampedDown | RampState::RampingDown => {
                    self.ramp.reverse();
                    self.state = RampState::RampingUp;
                    self.stop_phase = StopPhase::None;
                }
                _ => {}
            },
            StopperCommand::BeginPause => {
                if self.state == RampState::Running {
                    self.state = RampState::RampingDown;
                    self.ramp = Ramp::start_down(ramp_long_jiffies());
                }
            }
            StopperCommand::BeginStop(halt_id) => {
                self.state = RampState::RampingDown;
                self.ramp = Ramp::start_down(ramp_long_jiffies());
                self.stop_phase = StopPhase::HaltPending(halt_id);
            }
        }
    }

    fn issue_try_stop(&mut self) -> FlushId {
        let stream_id = self.current_stream.unwrap_or(ID_INVALID);
        self.current_handler
            .and_then(|id| self.registry.resolve(id))
            .map(|handler| handler.try_stop(stream_id))
            .unwrap_or(ID_INVALID)
    }

    /// Gate a newly arrived stream on its handler's `ok_to_play` verdict
    /// (spec.md §4.2, §4.7). `No` skips the stream immediately via
    /// `TryStop`. `Later` is genuine backpressure: the stream is held in
    /// [`Stopper::gated_later`] and re-polled on every subsequent `pull`
    /// (see the top of [`Stopper::pull`]) without discarding it or
    /// consuming any further upstream messages, until the verdict changes.
    fn gate_new_stream(&mut self, info: &DecodedStreamInfo) -> Gate {
        self.current_stream = Some(info.stream_id);
        self.current_handler = Some(info.handler);
        let verdict = self
            .registry
            .resolve(info.handler)
            .map(|h| h.ok_to_play())
            .unwrap_or(OkToPlay::No);
        match verdict {
            OkToPlay::Yes => Gate::Admit,
            OkToPlay::Later => {
                self.gated_later = Some(info.clone());
                Gate::Hold
            }
            OkToPlay::No => {
                let flush_id = self.issue_try_stop();
                if flush_id != ID_INVALID {
                    self.stop_phase = StopPhase::AwaitingFlush(flush_id);
                }
                Gate::Deny
            }
        }
    }
}

/// Outcome of [`Stopper::gate_new_stream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    Admit,
    Deny,
    Hold,
}

impl<S: MsgSource> MsgSource for Stopper<S> {
    fn pull(&mut self) -> Msg {
        loop {
            // A stream held by `OkToPlay::Later` is retried here, ahead of
            // everything else, without ever touching `self.upstream` — the
            // only way this stage blocks progress without issuing a
            // `TryStop` (spec.md §4.4.1).
            if let Some(info) = self.gated_later.take() {
                let verdict = self
                    .current_handler
                    .and_then(|id| self.registry.resolve(id))
                    .map(|h| h.ok_to_play())
                    .unwrap_or(OkToPlay::No);
                match verdict {
                    OkToPlay::Yes => return Msg::DecodedStream(info),
                    OkToPlay::Later => {
                        self.gated_later = Some(info);
                        std::thread::sleep(LATER_POLL_INTERVAL);
                        continue;
                    }
                    OkToPlay::No => {
                        let flush_id = self.issue_try_stop();
                        if flush_id != ID_INVALID {
                            self.stop_phase = StopPhase::AwaitingFlush(flush_id);
                        }
                        self.state = RampState::RampedDown;
                        continue;
                    }
                }
            }

            if let Some(command) = self.control.take() {
                self.handle_command(command);
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
                    Msg::DecodedStream(info) => {
                        self.current_stream = Some(info.stream_id);
                        self.current_handler = Some(info.handler);
                        return Msg::DecodedStream(info);
                    }
                    other => return other,
                },
                RampState::RampedDown => match self.stop_phase {
                    StopPhase::None => return Msg::Wait,
                    StopPhase::HaltPending(halt_id) => {
                        self.stop_phase = StopPhase::AwaitingStopReply;
                        return Msg::Halt(halt_id);
                    }
                    StopPhase::AwaitingStopReply => {
                        let flush_id = self.issue_try_stop();
                        if flush_id == ID_INVALID {
                            self.stop_phase = StopPhase::None;
                            return Msg::Wait;
                        }
                        self.stop_phase = StopPhase::AwaitingFlush(flush_id);
                        continue;
                    }
                    StopPhase::AwaitingFlush(flush_id) => match self.upstream.pull() {
                        Msg::Flush(id) if id == flush_id => {
                            self.stop_phase = StopPhase::None;
                            return Msg::Flush(id);
                        }
                        Msg::AudioPcm(_) | Msg::Silence(_) => continue,
                        Msg::DecodedStream(info) => match self.gate_new_stream(&info) {
                            Gate::Admit => return Msg::DecodedStream(info),
                            Gate::Deny | Gate::Hold => continue,
                        },
                        other => return other,
                    },
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
                RampState::Running | RampState::Starting => match self.upstream.pull() {
                    Msg::DecodedStream(info) => match self.gate_new_stream(&info) {
                        Gate::Admit => Msg::DecodedStream(info),
                        Gate::Deny => {
                            self.state = RampState::RampedDown;
                            continue;
                        }
                        Gate::Hold => continue,
                    },
                    other => other,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::handler::StreamHandler;
    use aurastream_core::msg::{AudioPcmMsg, DecodedStreamInfo};
    use std::collections::VecDeque;

    struct AlwaysYes;
    impl StreamHandler for AlwaysYes {
        fn ok_to_play(&self) -> OkToPlay {
            OkToPlay::Yes
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            77
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
            handler: registry.register(&handler),
        })
    }

    #[test]
    fn pause_reaches_ramped_down_and_returns_wait() {
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler: Arc<dyn StreamHandler> = Arc::new(AlwaysYes);
        let fixture = Fixture(VecDeque::from([
            stream_msg(&registry, handler),
            pcm(ramp_long_jiffies()),
            pcm(1000),
        ]));
        let mut stopper = Stopper::new(fixture, registry);
        stopper.control().send(StopperCommand::BeginPause);
        stopper.pull(); // DecodedStream passes through
        stopper.pull(); // ramps fully down
        assert!(matches!(stopper.pull(), Msg::Wait));
    }

    #[test]
    fn play_reverses_a_pause_ramp_mid_flight() {
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler: Arc<dyn StreamHandler> = Arc::new(AlwaysYes);
        let fixture = Fixture(VecDeque::from([
            stream_msg(&registry, handler),
            pcm(ramp_long_jiffies() / 4),
            pcm(1000),
        ]));
        let mut stopper = Stopper::new(fixture, registry);
        stopper.control().send(StopperCommand::BeginPause);
        stopper.pull();
        stopper.pull(); // partially down, still RampingDown
        stopper.control().send(StopperCommand::Play);
        let after_play = stopper.pull();
        assert!(matches!(after_play, Msg::AudioPcm(_)));
    }

    struct FlippingLater {
        remaining_later: std::sync::atomic::AtomicUsize,
        stop_calls: std::sync::atomic::AtomicUsize,
    }

    impl StreamHandler for FlippingLater {
        fn ok_to_play(&self) -> OkToPlay {
            use std::sync::atomic::Ordering;
            let current = self.remaining_later.load(Ordering::SeqCst);
            if current == 0 {
                OkToPlay::Yes
            } else {
                self.remaining_later.store(current - 1, Ordering::SeqCst);
                OkToPlay::Later
            }
        }
        fn try_stop(&self, _stream_id: u32) -> u32 {
            self.stop_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ID_INVALID
        }
        fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
            ID_INVALID
        }
    }

    #[test]
    fn later_verdict_holds_without_try_stop_then_admits_once_ready() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler = Arc::new(FlippingLater {
            remaining_later: AtomicUsize::new(2),
            stop_calls: AtomicUsize::new(0),
        });
        let handler_dyn: Arc<dyn StreamHandler> = handler.clone();
        let fixture = Fixture(VecDeque::from([stream_msg(&registry, handler_dyn), pcm(1000)]));
        let mut stopper = Stopper::new(fixture, registry);

        // Held by `Later`: resolved only by repolling `ok_to_play`, never
        // by issuing a `TryStop`, and without pulling any further upstream
        // messages (there is exactly one `pcm` left in the fixture).
        let admitted = stopper.pull();
        assert!(matches!(admitted, Msg::DecodedStream(_)));
        assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 0);

        let next = stopper.pull();
        assert!(matches!(next, Msg::AudioPcm(_)));
    }

    #[test]
    fn begin_stop_emits_halt_then_waits_for_flush() {
        let registry = Arc::new(StreamHandlerRegistry::new());
        let handler: Arc<dyn StreamHandler> = Arc::new(AlwaysYes);
        let fixture = Fixture(VecDeque::from([
            stream_msg(&registry, handler),
            pcm(ramp_long_jiffies()),
            Msg::Flush(77),
        ]));
        let mut stopper = Stopper::new(fixture, registry);
        stopper.control().send(StopperCommand::BeginStop(5));
        stopper.pull(); // DecodedStream
        stopper.pull(); // ramps fully down
        let halt = stopper.pull();
        assert!(matches!(halt, Msg::Halt(5)));
        let flush = stopper.pull();
        assert!(matches!(flush, Msg::Flush(77)));
    }
}
