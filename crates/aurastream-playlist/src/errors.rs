//! Track database error taxonomy (spec.md §4.6).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackDbError {
    #[error("track id {0} not found")]
    IdNotFound(u32),
    #[error("track database is full (kMaxTracks reached)")]
    Full,
}
