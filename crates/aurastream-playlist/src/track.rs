//! A single playlist entry (spec.md §3.3).
//!
//! The original keeps a manual refcount on `Track` so observer callbacks
//! can retain it after deletion; in Rust that discipline is just `Arc`,
//! so `Track` itself carries no refcounting logic and `TrackRef` is
//! simply `Arc<Track>`.

use aurastream_types::TrackId;
use std::sync::Arc;

/// A playlist entry: a URI, opaque metadata, and a stable id.
#[derive(Debug, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub uri: String,
    pub metadata: String,
}

/// Shared handle to a [`Track`]; cheap to clone and safe to retain past
/// the track's deletion from the database (spec.md §3.3).
pub type TrackRef = Arc<Track>;
