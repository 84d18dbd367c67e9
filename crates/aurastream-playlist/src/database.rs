//! `TrackDatabase`: an ordered, observed collection of tracks (spec.md §3.3, §4.6).
//!
//! Two locks guard this type: `data` for the track list itself, and
//! `observers` for the observer list. A mutation acquires `observers`
//! *before* releasing `data` and dispatches only after `data` is
//! released — this is the "unusual looking interleaving" the original
//! source calls out as deliberate: it lets readers query database state
//! from inside an observer callback without deadlocking, while still
//! guaranteeing observers see mutations in the order they happened.

use crate::errors::TrackDbError;
use crate::observer::{TrackDatabaseObserver, TrackDatabaseReader};
use crate::track::{Track, TrackRef};
use aurastream_core::ids::IdProvider;
use aurastream_types::TrackId;
use std::sync::{Arc, Mutex};

/// Maximum number of tracks a database may hold at once (spec.md §3.3).
pub const MAX_TRACKS: usize = 1200;

struct Data {
    tracks: Vec<TrackRef>,
    seq: u32,
}

/// A monotonically-ordered, bounded collection of [`Track`]s.
pub struct TrackDatabase {
    data: Mutex<Data>,
    observers: Mutex<Vec<Box<dyn TrackDatabaseObserver>>>,
    ids: IdProvider,
}

impl TrackDatabase {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Data { tracks: Vec::with_capacity(MAX_TRACKS), seq: 0 }),
            observers: Mutex::new(Vec::new()),
            ids: IdProvider::new(),
        }
    }

    pub fn add_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        self.observers.lock().expect("observer lock poisoned").push(observer);
    }

    /// Snapshot the ordered list of track ids along with the sequence
    /// counter at the time of the snapshot, so a caller iterating by
    /// index can detect a concurrent mutation and fall back to id-keyed
    /// lookup (spec.md §4.6).
    pub fn id_array(&self) -> (Vec<TrackId>, u32) {
        let data = self.data.lock().expect("data lock poisoned");
        (data.tracks.iter().map(|t| t.id).collect(), data.seq)
    }

    pub fn track_count(&self) -> usize {
        self.data.lock().expect("data lock poisoned").tracks.len()
    }

    pub fn get_by_id(&self, id: TrackId) -> Result<TrackRef, TrackDbError> {
        let data = self.data.lock().expect("data lock poisoned");
        index_from_id(&data.tracks, id).map(|i| data.tracks[i].clone())
    }

    /// Insert a new track after `id_after` (or at the head, if `id_after`
    /// is `ID_INVALID`). Returns the inserted track's id.
    ///
    /// `id_after` reported to observers is re-derived from the track that
    /// now sits at `index + 1` rather than threaded through from the raw
    /// insertion index (spec.md §9 Open Questions).
    pub fn insert(&self, id_after: TrackId, uri: String, metadata: String) -> Result<TrackId, TrackDbError> {
        let track_id = self.ids.next();
        let track = Arc::new(Track { id: track_id, uri, metadata });
        let (id_before_reported, id_after_reported);
        {
            let mut data = self.data.lock().expect("data lock poisoned");
            if data.tracks.len() >= MAX_TRACKS {
                return Err(TrackDbError::Full);
            }
            let index = if id_after == aurastream_types::ID_INVALID {
                0
            } else {
                index_from_id(&data.tracks, id_after)? + 1
            };
            data.tracks.insert(index, track.clone());
            data.seq += 1;
            id_before_reported = id_after;
            id_after_reported = if index + 1 >= data.tracks.len() {
                aurastream_types::ID_INVALID
            } else {
                data.tracks[index + 1].id
            };

            let observers = self.observers.lock().expect("observer lock poisoned");
            drop(data);
            for observer in observers.iter() {
                observer.notify_track_inserted(&track, id_before_reported, id_after_reported);
            }
        }
        Ok(track_id)
    }

    pub fn delete_id(&self, id: TrackId) -> Result<(), TrackDbError> {
        let (before, after);
        {
            let mut data = self.data.lock().expect("data lock poisoned");
            let index = index_from_id(&data.tracks, id)?;
            before = if index > 0 { Some(data.tracks[index - 1].clone()) } else { None };
            after = if index + 1 < data.tracks.len() { Some(data.tracks[index + 1].clone()) } else { None };
            data.tracks.remove(index);
            data.seq += 1;

            let observers = self.observers.lock().expect("observer lock poisoned");
            drop(data);
            for observer in observers.iter() {
                observer.notify_track_deleted(id, before.as_ref(), after.as_ref());
            }
        }
        Ok(())
    }

    pub fn delete_all(&self) {
        let changed;
        {
            let mut data = self.data.lock().expect("data lock poisoned");
            changed = !data.tracks.is_empty();
            if changed {
                data.tracks.clear();
                data.seq += 1;
            }
            let observers = self.observers.lock().expect("observer lock poisoned");
            drop(data);
            if changed {
                for observer in observers.iter() {
                    observer.notify_all_deleted();
                }
            }
        }
    }
}

impl Default for TrackDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackDatabaseReader for TrackDatabase {
    fn track_ref(&self, id: TrackId) -> Option<TrackRef> {
        self.get_by_id(id).ok()
    }

    fn next_track_ref(&self, id: TrackId) -> Option<TrackRef> {
        let data = self.data.lock().expect("data lock poisoned");
        if id == aurastream_types::ID_INVALID {
            return data.tracks.first().cloned();
        }
        let index = index_from_id(&data.tracks, id).ok()?;
        data.tracks.get(index + 1).cloned()
    }

    fn prev_track_ref(&self, id: TrackId) -> Option<TrackRef> {
        let data = self.data.lock().expect("data lock poisoned");
        let index = index_from_id(&data.tracks, id).ok()?;
        if index == 0 {
            None
        } else {
            data.tracks.get(index - 1).cloned()
        }
    }

    fn track_ref_by_index(&self, index: usize) -> Option<TrackRef> {
        self.data.lock().expect("data lock poisoned").tracks.get(index).cloned()
    }

    fn track_count(&self) -> usize {
        self.track_count()
    }

    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>) {
        self.add_observer(observer);
    }
}

fn index_from_id(tracks: &[TrackRef], id: TrackId) -> Result<usize, TrackDbError> {
    tracks.iter().position(|t| t.id == id).ok_or(TrackDbError::IdNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        inserted: AtomicUsize,
        deleted: AtomicUsize,
        all_deleted: AtomicUsize,
    }

    impl TrackDatabaseObserver for Arc<Recorder> {
        fn notify_track_inserted(&self, _track: &TrackRef, _id_before: TrackId, _id_after: TrackId) {
            self.inserted.fetch_add(1, Ordering::SeqCst);
        }
        fn notify_track_deleted(&self, _id: TrackId, _before: Option<&TrackRef>, _after: Option<&TrackRef>) {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
        fn notify_all_deleted(&self) {
            self.all_deleted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn insert_appends_in_order() {
        let db = TrackDatabase::new();
        let a = db.insert(aurastream_types::ID_INVALID, "a".into(), "".into()).unwrap();
        let b = db.insert(a, "b".into(), "".into()).unwrap();
        let (ids, seq) = db.id_array();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(seq, 2);
    }

    #[test]
    fn insert_past_capacity_errors() {
        let db = TrackDatabase::new();
        for _ in 0..MAX_TRACKS {
            db.insert(aurastream_types::ID_INVALID, "t".into(), "".into()).unwrap();
        }
        assert_eq!(
            db.insert(aurastream_types::ID_INVALID, "overflow".into(), "".into()),
            Err(TrackDbError::Full)
        );
    }

    #[test]
    fn delete_id_removes_and_notifies() {
        let db = TrackDatabase::new();
        let recorder = Arc::new(Recorder::default());
        db.add_observer(Box::new(recorder.clone()));
        let a = db.insert(aurastream_types::ID_INVALID, "a".into(), "".into()).unwrap();
        db.delete_id(a).unwrap();
        assert_eq!(db.track_count(), 0);
        assert_eq!(recorder.deleted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_all_only_notifies_when_nonempty() {
        let db = TrackDatabase::new();
        let recorder = Arc::new(Recorder::default());
        db.add_observer(Box::new(recorder.clone()));
        db.delete_all();
        assert_eq!(recorder.all_deleted.load(Ordering::SeqCst), 0);
        db.insert(aurastream_types::ID_INVALID, "a".into(), "".into()).unwrap();
        db.delete_all();
        assert_eq!(recorder.all_deleted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn next_and_prev_track_ref_walk_the_list() {
        let db = TrackDatabase::new();
        let a = db.insert(aurastream_types::ID_INVALID, "a".into(), "".into()).unwrap();
        let b = db.insert(a, "b".into(), "".into()).unwrap();
        assert_eq!(db.next_track_ref(a).unwrap().id, b);
        assert_eq!(db.prev_track_ref(b).unwrap().id, a);
        assert!(db.next_track_ref(b).is_none());
        assert!(db.prev_track_ref(a).is_none());
    }

    #[test]
    fn delete_id_unknown_errors() {
        let db = TrackDatabase::new();
        assert_eq!(db.delete_id(999), Err(TrackDbError::IdNotFound(999)));
    }
}
