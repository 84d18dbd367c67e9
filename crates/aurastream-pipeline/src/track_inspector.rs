//! `TrackInspector`: reports whether each track produced any audio before
//! the next `Track` boundary (spec.md §8 property 7): `NotifyTrackPlay`
//! fires exactly once per track that produced audio, `NotifyTrackFail`
//! exactly once per track followed by another `Track` with none.

use crate::stage::MsgSource;
use aurastream_core::msg::Msg;
use aurastream_types::TrackId;
use std::sync::Arc;

pub trait TrackObserver: Send + Sync {
    fn track_play(&self, track_id: TrackId);
    fn track_fail(&self, track_id: TrackId);
}

pub struct TrackInspector<S> {
    upstream: S,
    observer: Option<Arc<dyn TrackObserver>>,
    current_track: Option<TrackId>,
    saw_audio: bool,
}

impl<S: MsgSource> TrackInspector<S> {
    pub fn new(upstream: S) -> Self {
        Self { upstream, observer: None, current_track: None, saw_audio: false }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn TrackObserver>) {
        self.observer = Some(observer);
    }

    fn report_pending(&mut self) {
        if let Some(track_id) = self.current_track.take() {
            if let Some(observer) = &self.observer {
                if self.saw_audio {
                    observer.track_play(track_id);
                } else {
                    observer.track_fail(track_id);
                }
            }
        }
    }
}

impl<S: MsgSource> MsgSource for TrackInspector<S> {
    fn pull(&mut self) -> Msg {
        let msg = self.upstream.pull();
        match &msg {
            Msg::Track(info) => {
                self.report_pending();
                self.current_track = Some(info.track_id);
                self.saw_audio = false;
            }
            Msg::AudioPcm(_) => {
                self.saw_audio = true;
            }
            Msg::Quit => {
                self.report_pending();
            }
            _ => {}
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::decoded_audio::DecodedAudio;
    use aurastream_core::msg::{AudioPcmMsg, TrackInfo};
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
    struct Recorder {
        played: Mutex<Vec<TrackId>>,
        failed: Mutex<Vec<TrackId>>,
    }
    impl TrackObserver for Recorder {
        fn track_play(&self, track_id: TrackId) {
            self.played.lock().unwrap().push(track_id);
        }
        fn track_fail(&self, track_id: TrackId) {
            self.failed.lock().unwrap().push(track_id);
        }
    }

    fn track(id: TrackId) -> Msg {
        Msg::Track(TrackInfo { uri: format!("track-{id}"), metadata: String::new(), track_id: id })
    }

    fn pcm() -> Msg {
        Msg::AudioPcm(AudioPcmMsg {
            audio: DecodedAudio::new(vec![0.0; 4], 2, 44_100),
            size_jiffies: 10,
            track_offset_jiffies: 0,
            ramp: Ramp::none(),
        })
    }

    #[test]
    fn track_with_audio_reports_play() {
        let fixture = Fixture(VecDeque::from([track(1), pcm(), track(2)]));
        let mut inspector = TrackInspector::new(fixture);
        let recorder = Arc::new(Recorder::default());
        inspector.set_observer(recorder.clone());
        inspector.pull();
        inspector.pull();
        inspector.pull(); // second Track boundary flushes track 1's verdict
        assert_eq!(*recorder.played.lock().unwrap(), vec![1]);
        assert!(recorder.failed.lock().unwrap().is_empty());
    }

    #[test]
    fn track_without_audio_reports_fail() {
        let fixture = Fixture(VecDeque::from([track(1), track(2)]));
        let mut inspector = TrackInspector::new(fixture);
        let recorder = Arc::new(Recorder::default());
        inspector.set_observer(recorder.clone());
        inspector.pull();
        inspector.pull();
        assert_eq!(*recorder.failed.lock().unwrap(), vec![1]);
    }

    #[test]
    fn quit_flushes_final_track_verdict() {
        let fixture = Fixture(VecDeque::from([track(1), pcm(), Msg::Quit]));
        let mut inspector = TrackInspector::new(fixture);
        let recorder = Arc::new(Recorder::default());
        inspector.set_observer(recorder.clone());
        inspector.pull();
        inspector.pull();
        inspector.pull();
        assert_eq!(*recorder.played.lock().unwrap(), vec![1]);
    }
}
