//! The aurastream pipeline: reservoirs, the codec controller bridge, and
//! the full chain of ramping/flow-control stages between them and the
//! animator (spec.md §2, §4).
//!
//! [`Pipeline`] assembles the fixed topology spec.md §2 lays out, leaves
//! first:
//!
//! `EncodedReservoir -> (codec controller bridge) -> DecodedReservoir ->
//! Ramper -> Seeker -> VariableDelay(left) -> Skipper -> TrackInspector ->
//! Waiter -> Stopper -> Reporter -> VariableDelay(right) ->
//! StarvationRamper -> Muter -> PreDriver`
//!
//! Everything left of `EncodedReservoir` (protocols) and everything right
//! of `PreDriver` (the animator) is an external collaborator this crate
//! exposes hooks for rather than owns.

pub mod controller_bridge;
pub mod durations;
pub mod muter;
pub mod predriver;
pub mod protocol_feed;
pub mod ramper;
pub mod reporter;
pub mod reservoir;
pub mod seeker;
pub mod skipper;
pub mod stage;
pub mod starvation_ramper;
pub mod stopper;
pub mod track_inspector;
pub mod variable_delay;
pub mod waiter;

pub use controller_bridge::{spawn_codec_bridge, CodecBridge};
pub use protocol_feed::{spawn_protocol_feed, ProtocolFeed};
pub use muter::{Muter, MuterControl};
pub use predriver::PreDriver;
pub use ramper::Ramper;
pub use reporter::{spawn_event_thread, PipelineObserver, Reporter};
pub use reservoir::{DecodedReservoir, DecodedReservoirConfig, EncodedReservoir, EncodedReservoirConfig};
pub use seeker::{SeekObserver, Seeker, SeekerControl};
pub use skipper::{SkipControl, Skipper};
pub use stage::{MsgSource, RampState};
pub use starvation_ramper::StarvationRamper;
pub use stopper::{Stopper, StopperCommand, StopperControl};
pub use track_inspector::{TrackInspector, TrackObserver};
pub use variable_delay::{DelayControl, VariableDelay};
pub use waiter::{Waiter, WaiterControl};

use aurastream_codec::CodecRegistry;
use aurastream_core::handler::StreamHandlerRegistry;
use aurastream_core::msg::Msg;
use aurastream_core::{FactoryConfig, MessageFactory};
use std::sync::Arc;

/// Tuning for the whole assembly: the two reservoirs' limits and the
/// shared [`MessageFactory`]'s pool sizes. Ramp durations are fixed stage
/// constants (spec.md §4.4) and live in [`durations`] rather than here.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub encoded: EncodedReservoirConfig,
    pub decoded: DecodedReservoirConfig,
    pub factory: FactoryConfig,
}

/// Concrete type of the fully assembled stage chain, from the decoded
/// reservoir down to the PreDriver. Named here once so [`Pipeline`]
/// doesn't need to spell it out twice.
type StageChain = PreDriver<
    Muter<
        StarvationRamper<
            VariableDelay<
                Reporter<
                    Stopper<
                        Waiter<TrackInspector<Skipper<VariableDelay<Seeker<Ramper<Arc<DecodedReservoir>>>>>>>,
                    >,
                >,
            >,
        >,
    >,
>;

/// Every control handle a host (HTTP API, CLI, UPnP surface, ...) needs to
/// drive the pipeline from outside the audio thread.
pub struct PipelineControls {
    pub seeker: Arc<SeekerControl>,
    pub skipper: Arc<SkipControl>,
    pub waiter: Arc<WaiterControl>,
    pub stopper: Arc<StopperControl>,
    pub muter: Arc<MuterControl>,
    pub delay_left: Arc<DelayControl>,
    pub delay_right: Arc<DelayControl>,
}

/// The full assembly: two reservoirs, the codec controller bridge between
/// them, and the stage chain a [`PreDriver`] terminates. Protocols push
/// into [`Pipeline::encoded`]; the animator pulls from [`Pipeline::output`].
pub struct Pipeline {
    pub encoded: Arc<EncodedReservoir>,
    pub decoded: Arc<DecodedReservoir>,
    pub handler_registry: Arc<StreamHandlerRegistry>,
    pub controls: PipelineControls,
    pub output: StageChain,
    bridge: Option<CodecBridge>,
    event_thread_sender: crossbeam_channel::Receiver<aurastream_types::ObserverEvent>,
    event_thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl Pipeline {
    /// Assemble every stage and spawn the codec controller's bridge
    /// threads. `registry` is shared with whatever owns the protocol
    /// threads so `EncodedStream`/`DecodedStream` messages' handler ids
    /// resolve back to the same [`StreamHandler`](aurastream_core::handler::StreamHandler) instances.
    pub fn new(
        config: PipelineConfig,
        registry: Arc<StreamHandlerRegistry>,
        codecs: CodecRegistry,
    ) -> Self {
        Self::new_with_track_observer(config, registry, codecs, None)
    }

    /// Same as [`Pipeline::new`], additionally wiring `track_observer` to
    /// the [`TrackInspector`] stage so `NotifyTrackPlay`/`NotifyTrackFail`
    /// (spec.md §8 property 7) reach a caller.
    pub fn new_with_track_observer(
        config: PipelineConfig,
        registry: Arc<StreamHandlerRegistry>,
        codecs: CodecRegistry,
        track_observer: Option<Arc<dyn TrackObserver>>,
    ) -> Self {
        let factory = Arc::new(MessageFactory::new(config.factory));
        let encoded = Arc::new(EncodedReservoir::new(config.encoded, factory.clone()));
        let decoded = Arc::new(DecodedReservoir::new(config.decoded));
        let bridge = spawn_codec_bridge(encoded.clone(), decoded.clone(), codecs, registry.clone(), factory.clone());

        let ramper = Ramper::new(decoded.clone());
        let seeker = Seeker::new(ramper, bridge.pending_seek.clone());
        let seeker_control = seeker.control();
        let delay_left = VariableDelay::new(seeker);
        let delay_left_control = delay_left.control();
        let skipper = Skipper::new(delay_left, registry.clone());
        let skipper_control = skipper.control();
        let mut inspector = TrackInspector::new(skipper);
        if let Some(observer) = track_observer {
            inspector.set_observer(observer);
        }
        let waiter = Waiter::new(inspector);
        let waiter_control = waiter.control();
        let stopper = Stopper::new(waiter, registry.clone());
        let stopper_control = stopper.control();
        let (reporter, event_rx) = Reporter::new(stopper, decoded.clone());
        let delay_right = VariableDelay::new(reporter);
        let delay_right_control = delay_right.control();
        let starvation = StarvationRamper::new(delay_right, decoded.clone(), registry.clone());
        let muter = Muter::new(starvation);
        let muter_control = muter.control();
        let predriver = PreDriver::new(muter);

        Self {
            encoded,
            decoded,
            handler_registry: registry,
            controls: PipelineControls {
                seeker: seeker_control,
                skipper: skipper_control,
                waiter: waiter_control,
                stopper: stopper_control,
                muter: muter_control,
                delay_left: delay_left_control,
                delay_right: delay_right_control,
            },
            output: predriver,
            bridge: Some(bridge),
            event_thread_sender: event_rx,
            event_thread_handle: None,
        }
    }

    /// Start dispatching observer events on the dedicated event thread
    /// (spec.md §5: "Observer dispatch runs one dedicated `EventThread`").
    /// Call once; the returned events keep flowing until the pipeline is
    /// dropped and its stages stop producing them.
    pub fn start_observer(&mut self, observer: Arc<dyn PipelineObserver>) {
        let receiver = self.event_thread_sender.clone();
        self.event_thread_handle = Some(spawn_event_thread(receiver, observer));
    }

    /// Pull the next driver-ready message. The animator's real-time
    /// callback calls this; it never blocks longer than the upstream
    /// chain's reservoirs do.
    pub fn pull(&mut self) -> Msg {
        self.output.pull()
    }

    /// Close both reservoirs and join the codec bridge threads. Used on
    /// shutdown so no thread is left blocked on a condvar forever.
    pub fn shutdown(mut self) {
        self.encoded.close();
        self.decoded.close();
        if let Some(bridge) = self.bridge.take() {
            bridge.join();
        }
        if let Some(handle) = self.event_thread_handle.take() {
            let _ = handle.join();
        }
    }
}
