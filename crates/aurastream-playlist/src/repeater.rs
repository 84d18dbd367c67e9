//! `Repeater`: wraps a reader (usually [`crate::shuffler::Shuffler`]) and
//! wraps the list at either end when repeat is enabled (spec.md §4.6).

use crate::observer::{TrackDatabaseObserver, TrackDatabaseReader};
use crate::track::TrackRef;
use aurastream_types::{TrackId, ID_INVALID};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct Repeater {
    reader: Arc<dyn TrackDatabaseReader>,
    repeat: AtomicBool,
    track_count: AtomicUsize,
    observer: Mutex<Option<Arc<dyn TrackDatabaseObserver>>>,
}

impl Repeater {
    pub fn new(reader: Arc<dyn TrackDatabaseReader>) -> Arc<Self> {
        let count = reader.track_count();
        let repeater = Arc::new(Self {
            reader: reader.clone(),
            repeat: AtomicBool::new(false),
            track_count: AtomicUsize::new(count),
            observer: Mutex::new(None),
        });
        reader.set_observer(Box::new(RepeaterObserverHandle(repeater.clone())));
        repeater
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.repeat.store(repeat, Ordering::Relaxed);
    }

    pub fn repeat(&self) -> bool {
        self.repeat.load(Ordering::Relaxed)
    }
}

impl TrackDatabaseReader for Repeater {
    fn track_ref(&self, id: TrackId) -> Option<TrackRef> {
        let track = self.reader.track_ref(id);
        if track.is_none() && self.repeat.load(Ordering::Relaxed) {
            self.reader.track_ref(ID_INVALID)
        } else {
            track
        }
    }

    fn next_track_ref(&self, id: TrackId) -> Option<TrackRef> {
        let track = self.reader.next_track_ref(id);
        if track.is_none() && self.repeat.load(Ordering::Relaxed) {
            self.reader.next_track_ref(ID_INVALID)
        } else {
            track
        }
    }

    fn prev_track_ref(&self, id: TrackId) -> Option<TrackRef> {
        let track = self.reader.prev_track_ref(id);
        if track.is_none() && self.repeat.load(Ordering::Relaxed) {
            let count = self.track_count.load(Ordering::Relaxed);
            if count == 0 {
                None
            } else {
                self.reader.track_ref_by_index(count - 1)
            }
        } else {
            track
        }
    }

    fn track_ref_by_index(&self, index: usize) -> Option<TrackRef> {
        self.reader.track_ref_by_index(index)
    }

    fn track_count(&self) -> usize {
        self.track_count.load(Ordering::Relaxed)
    }

    /// Registers `observer` to hear this reader's (repeat-adjusted count
    /// aside, otherwise pass-through) mutation notifications — used when
    /// something sits above `Repeater` in the stack, e.g. the playlist
    /// mode's `Protocol` implementation.
    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        *self.observer.lock().expect("repeater observer lock poisoned") = Some(Arc::from(observer));
    }
}

struct RepeaterObserverHandle(Arc<Repeater>);

impl RepeaterObserverHandle {
    fn forward(&self) -> Option<Arc<dyn TrackDatabaseObserver>> {
        self.0.observer.lock().expect("repeater observer lock poisoned").clone()
    }
}

impl TrackDatabaseObserver for RepeaterObserverHandle {
    fn notify_track_inserted(&self, track: &TrackRef, id_before: TrackId, id_after: TrackId) {
        self.0.track_count.fetch_add(1, Ordering::Relaxed);
        if let Some(observer) = self.forward() {
            observer.notify_track_inserted(track, id_before, id_after);
        }
    }

    fn notify_track_deleted(&self, id: TrackId, before: Option<&TrackRef>, after: Option<&TrackRef>) {
        self.0.track_count.fetch_sub(1, Ordering::Relaxed);
        if let Some(observer) = self.forward() {
            observer.notify_track_deleted(id, before, after);
        }
    }

    fn notify_all_deleted(&self) {
        self.0.track_count.store(0, Ordering::Relaxed);
        if let Some(observer) = self.forward() {
            observer.notify_all_deleted();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TrackDatabase;

    #[test]
    fn next_wraps_to_head_when_repeat_enabled() {
        let db = Arc::new(TrackDatabase::new());
        let a = db.insert(ID_INVALID, "a".into(), "".into()).unwrap();
        let b = db.insert(a, "b".into(), "".into()).unwrap();
        let repeater = Repeater::new(db.clone());
        assert!(repeater.next_track_ref(b).is_none());
        repeater.set_repeat(true);
        assert_eq!(repeater.next_track_ref(b).unwrap().id, a);
    }

    #[test]
    fn prev_wraps_to_tail_when_repeat_enabled() {
        let db = Arc::new(TrackDatabase::new());
        let a = db.insert(ID_INVALID, "a".into(), "".into()).unwrap();
        let b = db.insert(a, "b".into(), "".into()).unwrap();
        let repeater = Repeater::new(db.clone());
        assert!(repeater.prev_track_ref(a).is_none());
        repeater.set_repeat(true);
        assert_eq!(repeater.prev_track_ref(a).unwrap().id, b);
    }

    #[test]
    fn track_count_tracks_inserts_and_deletes() {
        let db = Arc::new(TrackDatabase::new());
        let repeater = Repeater::new(db.clone());
        let a = db.insert(ID_INVALID, "a".into(), "".into()).unwrap();
        assert_eq!(repeater.track_count(), 1);
        db.delete_id(a).unwrap();
        assert_eq!(repeater.track_count(), 0);
    }
}
