//! Observer and reader capabilities shared by [`crate::database::TrackDatabase`],
//! [`crate::shuffler::Shuffler`], and [`crate::repeater::Repeater`] (spec.md §4.6).
//!
//! `Shuffler` wraps a `TrackDatabaseReader` and itself implements
//! `TrackDatabaseObserver` so it can reshuffle in response to mutations;
//! `Repeater` does the same one layer up. Chaining readers/observers this
//! way is how the three types compose without any of them knowing which
//! of the others (if any) sits beneath them.

use crate::track::TrackRef;
use aurastream_types::TrackId;

/// Read-side navigation over an ordered track collection.
pub trait TrackDatabaseReader: Send + Sync {
    fn track_ref(&self, id: TrackId) -> Option<TrackRef>;
    fn next_track_ref(&self, id: TrackId) -> Option<TrackRef>;
    fn prev_track_ref(&self, id: TrackId) -> Option<TrackRef>;
    fn track_ref_by_index(&self, index: usize) -> Option<TrackRef>;
    fn track_count(&self) -> usize;
    fn set_observer(&self, observer: Box<dyn TrackDatabaseObserver>);
}

/// Mutation notifications, dispatched in the order mutations happened
/// (spec.md §4.6: data lock released before observer callbacks run, but
/// the observer lock is acquired before that release so ordering is
/// still guaranteed).
pub trait TrackDatabaseObserver: Send + Sync {
    fn notify_track_inserted(&self, track: &TrackRef, id_before: TrackId, id_after: TrackId);
    fn notify_track_deleted(&self, id: TrackId, before: Option<&TrackRef>, after: Option<&TrackRef>);
    fn notify_all_deleted(&self);
}
