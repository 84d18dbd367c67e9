//! The playback worker: the single thread that owns the protocol session
//! lifecycle and emits the `Mode`/`Track` boundaries no protocol
//! implementation emits itself. A `Mode` boundary marks a top-level
//! source class change and resets most per-stream state; `Track` marks
//! the finer per-track boundary within a mode.
//!
//! A command channel plus a dedicated thread per in-flight stream; the
//! stream feeds a long-lived [`Pipeline`](aurastream_pipeline::Pipeline)
//! rather than spinning up a fresh decode/playback pair per track.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aurastream_core::msg::{Msg, TrackInfo};
use aurastream_core::IdProviders;
use aurastream_pipeline::{PipelineControls, ProtocolFeed, StopperCommand};
use aurastream_playlist::TrackDatabaseReader;
use aurastream_protocol::Protocol;
use aurastream_types::{PipelineState, TrackId};
use crossbeam_channel::{Receiver, Sender};

use crate::protocols::{mode_for_uri, ProtocolSet};
use crate::status::StatusState;

/// Commands accepted by the playback worker thread.
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Play an arbitrary URI outside the playlist (e.g. `raop://`, a
    /// one-off HTTP stream); `metadata` is opaque, forwarded as-is.
    Play { uri: String, metadata: String },
    /// Play the playlist track at `id`, resetting the playlist cursor to it.
    PlayTrack { id: TrackId },
    /// Advance to the next playlist track from the current cursor.
    Next,
    /// Move to the previous playlist track from the current cursor.
    Prev,
    Pause,
    Resume,
    Stop,
    Seek { seconds: f64 },
    SetMuted(bool),
    Internal(InternalEvent),
}

/// Events the session thread reports back to the worker loop, threaded
/// through the same channel so command handling stays single-threaded.
#[derive(Debug, Clone)]
pub enum InternalEvent {
    StreamEnded { epoch: u64, outcome: aurastream_protocol::StreamOutcome },
}

/// Handle for sending commands to the playback worker.
#[derive(Clone)]
pub struct PlayerHandle {
    pub cmd_tx: Sender<PlayerCommand>,
}

struct CurrentSession {
    epoch: u64,
    protocol: Arc<dyn Protocol>,
    join: std::thread::JoinHandle<()>,
    mode_name: &'static str,
}

/// Spawn the playback worker thread.
#[allow(clippy::too_many_arguments)]
pub fn spawn_player(
    feed: ProtocolFeed,
    controls: PipelineControls,
    protocols: Arc<ProtocolSet>,
    playlist: Arc<dyn TrackDatabaseReader>,
    ids: Arc<IdProviders>,
    status: Arc<StatusState>,
) -> PlayerHandle {
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    let worker_tx = cmd_tx.clone();
    std::thread::Builder::new()
        .name("aurastream-player".into())
        .spawn(move || worker_main(feed, controls, protocols, playlist, ids, status, worker_tx, cmd_rx))
        .expect("spawn player worker thread");
    PlayerHandle { cmd_tx }
}

#[allow(clippy::too_many_arguments)]
fn worker_main(
    feed: ProtocolFeed,
    controls: PipelineControls,
    protocols: Arc<ProtocolSet>,
    playlist: Arc<dyn TrackDatabaseReader>,
    ids: Arc<IdProviders>,
    status: Arc<StatusState>,
    cmd_tx: Sender<PlayerCommand>,
    cmd_rx: Receiver<PlayerCommand>,
) {
    let epoch_gen = Arc::new(AtomicU64::new(0));
    let seek_handle_gen = AtomicU64::new(0);
    let mut session: Option<CurrentSession> = None;
    let mut current_track: Option<TrackId> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            PlayerCommand::Play { uri, metadata } => {
                let track_id = ids.track.next();
                current_track = None;
                start_track(
                    &feed, &controls, &protocols, &epoch_gen, &cmd_tx, &status, &mut session, track_id, uri, metadata,
                );
            }
            PlayerCommand::PlayTrack { id } => {
                if let Some(track) = playlist.track_ref(id) {
                    current_track = Some(id);
                    start_track(
                        &feed, &controls, &protocols, &epoch_gen, &cmd_tx, &status, &mut session, id, track.uri.clone(),
                        track.metadata.clone(),
                    );
                } else {
                    tracing::warn!(id, "play_track: no such playlist entry");
                }
            }
            PlayerCommand::Next => advance(&playlist, &mut current_track, true).map(|id| {
                cmd_tx.send(PlayerCommand::PlayTrack { id }).ok();
            }).unwrap_or_else(|| tracing::info!("next: playlist exhausted")),
            PlayerCommand::Prev => advance(&playlist, &mut current_track, false).map(|id| {
                cmd_tx.send(PlayerCommand::PlayTrack { id }).ok();
            }).unwrap_or_else(|| tracing::info!("prev: no earlier track")),
            PlayerCommand::Pause => {
                controls.stopper.send(StopperCommand::BeginPause);
                status.set_state(PipelineState::Paused);
            }
            PlayerCommand::Resume => {
                controls.stopper.send(StopperCommand::Play);
                status.set_state(PipelineState::Playing);
            }
            PlayerCommand::Stop => {
                let halt_id = ids.halt.next();
                controls.stopper.send(StopperCommand::BeginStop(halt_id));
                if let Some(sess) = session.take() {
                    sess.protocol.interrupt();
                    let _ = sess.join.join();
                }
                current_track = None;
                status.set_state(PipelineState::Stopped);
                status.clear_track();
            }
            PlayerCommand::Seek { seconds } => {
                let handle = seek_handle_gen.fetch_add(1, Ordering::Relaxed);
                controls.seeker.request_seek(handle, seconds);
            }
            PlayerCommand::SetMuted(muted) => controls.muter.set_muted(muted),
            PlayerCommand::Internal(InternalEvent::StreamEnded { epoch, outcome }) => {
                if session.as_ref().map(|s| s.epoch) != Some(epoch) {
                    continue; // superseded by a newer Play/Stop
                }
                session = None;
                if outcome == aurastream_protocol::StreamOutcome::Success && current_track.is_some() {
                    if let Some(id) = advance(&playlist, &mut current_track, true) {
                        let _ = cmd_tx.send(PlayerCommand::PlayTrack { id });
                    } else {
                        status.set_state(PipelineState::Stopped);
                    }
                }
            }
        }
    }
}

/// Move the playlist cursor forward/backward, returning the new track id.
fn advance(playlist: &Arc<dyn TrackDatabaseReader>, current: &mut Option<TrackId>, forward: bool) -> Option<TrackId> {
    let from = (*current)?;
    let next = if forward { playlist.next_track_ref(from) } else { playlist.prev_track_ref(from) }?;
    *current = Some(next.id);
    Some(next.id)
}

#[allow(clippy::too_many_arguments)]
fn start_track(
    feed: &ProtocolFeed,
    controls: &PipelineControls,
    protocols: &Arc<ProtocolSet>,
    epoch_gen: &Arc<AtomicU64>,
    cmd_tx: &Sender<PlayerCommand>,
    status: &Arc<StatusState>,
    session: &mut Option<CurrentSession>,
    track_id: TrackId,
    uri: String,
    metadata: String,
) {
    let previous_mode = session.as_ref().map(|s| s.mode_name);
    if let Some(prev) = session.take() {
        prev.protocol.interrupt();
        let _ = prev.join.join();
    }

    let Some(protocol) = protocols.find(&uri) else {
        tracing::warn!(uri = %uri, "no protocol supports this uri");
        return;
    };

    let (mode_name, flags) = mode_for_uri(&uri);
    if previous_mode != Some(mode_name) {
        let _ = feed.sender.send(Msg::Mode { name: mode_name.to_string(), flags });
    }
    let _ = feed.sender.send(Msg::Track(TrackInfo { uri: uri.clone(), metadata, track_id }));

    controls.stopper.send(StopperCommand::Play);
    status.set_state(PipelineState::Buffering);

    let epoch = epoch_gen.fetch_add(1, Ordering::Relaxed) + 1;
    let thread_protocol = protocol.clone();
    let thread_sender = feed.sender.clone();
    let thread_cmd_tx = cmd_tx.clone();
    let join = std::thread::Builder::new()
        .name("aurastream-stream-session".into())
        .spawn(move || {
            let outcome = thread_protocol.stream(&uri, &thread_sender);
            let _ = thread_cmd_tx.send(PlayerCommand::Internal(InternalEvent::StreamEnded { epoch, outcome }));
        })
        .expect("spawn stream session thread");

    *session = Some(CurrentSession { epoch, protocol, join, mode_name });
}
