//! Shared status state, fed by [`aurastream_pipeline::PipelineObserver`]
//! notifications and read back by the HTTP `/status` endpoint. Folded
//! into one type since `aurastream_types::PipelineStatus` is already the
//! wire DTO rather than something built up field-by-field.

use std::sync::Mutex;

use aurastream_pipeline::{PipelineObserver, TrackObserver};
use aurastream_types::{ObserverEvent, PipelineState, PipelineStatus, PlaybackEndReason, TrackId};

pub struct StatusState {
    inner: Mutex<PipelineStatus>,
}

impl StatusState {
    pub fn new() -> Self {
        Self { inner: Mutex::new(PipelineStatus::default()) }
    }

    pub fn snapshot(&self) -> PipelineStatus {
        self.inner.lock().expect("status state poisoned").clone()
    }

    pub fn set_state(&self, state: PipelineState) {
        self.inner.lock().expect("status state poisoned").state = Some(state);
    }

    pub fn clear_track(&self) {
        let mut status = self.inner.lock().expect("status state poisoned");
        status.track_id = None;
        status.track_uri = None;
        status.metatext = None;
        status.stream = None;
        status.elapsed_ms = None;
        status.duration_ms = None;
        status.end_reason = None;
    }
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for StatusState {
    fn notify(&self, event: ObserverEvent) {
        let mut status = self.inner.lock().expect("status state poisoned");
        match event {
            ObserverEvent::PipelineState { state } => status.state = Some(state),
            ObserverEvent::Track { id, uri } => {
                status.track_id = Some(id);
                status.track_uri = Some(uri);
                status.metatext = None;
            }
            ObserverEvent::TrackPlay { .. } | ObserverEvent::TrackFail { .. } | ObserverEvent::Mode { .. } => {}
            // handled through `TrackObserver` below instead: the `Reporter`
            // translates `Msg` into `ObserverEvent` and has no `Msg` variant
            // to produce these two from, so they never reach this match arm.
            ObserverEvent::MetaText { text } => status.metatext = Some(text),
            ObserverEvent::Time { seconds, duration_seconds } => {
                status.elapsed_ms = Some(seconds * 1000);
                status.duration_ms = duration_seconds.map(|d| d * 1000);
            }
            ObserverEvent::StreamInfo { info } => status.stream = Some(info),
        }
    }
}

impl TrackObserver for StatusState {
    fn track_play(&self, track_id: TrackId) {
        let mut status = self.inner.lock().expect("status state poisoned");
        if status.track_id == Some(track_id) {
            status.end_reason = None;
        }
    }

    fn track_fail(&self, track_id: TrackId) {
        let mut status = self.inner.lock().expect("status state poisoned");
        if status.track_id == Some(track_id) {
            status.end_reason = Some(PlaybackEndReason::Error);
        }
    }
}
