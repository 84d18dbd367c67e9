//! Top-level wiring: id spaces, the handler registry, every protocol, the
//! pipeline, the animator, the playback worker, and the HTTP/mDNS control
//! surfaces, brought up together around one playback config.

use std::sync::Arc;

use anyhow::Result;
use aurastream_animator::CpalAnimator;
use aurastream_codec::{CodecRegistry, SymphoniaCodec};
use aurastream_core::handler::StreamHandlerRegistry;
use aurastream_core::IdProviders;
use aurastream_pipeline::{spawn_protocol_feed, Pipeline, PipelineControls};
use aurastream_playlist::{Repeater, Shuffler, TrackDatabase, TrackDatabaseReader};
use aurastream_protocol::context::ProtocolContext;
use aurastream_types::PipelineState;

use crate::config::PlayerConfig;
use crate::http_api;
use crate::mdns;
use crate::protocols::{ProtocolSet, QobuzCredentials};
use crate::session::{self, PlayerHandle};
use crate::status::StatusState;

const MDNS_REFRESH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

fn clone_controls(controls: &PipelineControls) -> PipelineControls {
    PipelineControls {
        seeker: controls.seeker.clone(),
        skipper: controls.skipper.clone(),
        waiter: controls.waiter.clone(),
        stopper: controls.stopper.clone(),
        muter: controls.muter.clone(),
        delay_left: controls.delay_left.clone(),
        delay_right: controls.delay_right.clone(),
    }
}

/// Bring the whole player up and run the HTTP server on the calling
/// thread until it exits (normally only on a bind failure — playback
/// itself runs on its own threads for the life of the process).
pub fn run(config: PlayerConfig, qobuz: Option<QobuzCredentials>, install_ctrlc: bool) -> Result<()> {
    let ids = Arc::new(IdProviders::new());
    let handlers = Arc::new(StreamHandlerRegistry::new());
    let ctx = ProtocolContext::new(ids.clone(), handlers.clone());
    let protocols = Arc::new(ProtocolSet::new(ctx, qobuz));

    let mut codecs = CodecRegistry::new();
    codecs.register(Box::new(SymphoniaCodec::new()));

    let status = Arc::new(StatusState::new());
    let mut pipeline =
        Pipeline::new_with_track_observer(config.pipeline.clone(), handlers, codecs, Some(status.clone()));
    pipeline.start_observer(status.clone());

    let feed = spawn_protocol_feed(pipeline.encoded.clone());
    let controls = clone_controls(&pipeline.controls);

    let database = Arc::new(TrackDatabase::new());
    let db_reader: Arc<dyn TrackDatabaseReader> = database.clone();
    let shuffler = Shuffler::new(db_reader);
    let shuffler_reader: Arc<dyn TrackDatabaseReader> = shuffler.clone();
    let repeater = Repeater::new(shuffler_reader);
    let playlist_reader: Arc<dyn TrackDatabaseReader> = repeater.clone();

    let player: PlayerHandle =
        session::spawn_player(feed, controls, protocols, playlist_reader, ids, status.clone());
    status.set_state(PipelineState::Stopped);

    // From here on only the animator pulls the pipeline (spec.md §2
    // component 18); keep it alive for the life of the process so its
    // `cpal::Stream` keeps running.
    let _animator = CpalAnimator::spawn(pipeline, config.animator)?;

    let mdns_handle: Arc<std::sync::Mutex<Option<mdns::MdnsAdvertiser>>> = Arc::new(std::sync::Mutex::new(None));
    if config.mdns_enabled {
        if let Ok(mut g) = mdns_handle.lock() {
            *g = mdns::spawn_mdns_advertiser(config.http_bind);
        }
        let mdns_for_refresh = mdns_handle.clone();
        let http_bind = config.http_bind;
        std::thread::spawn(move || loop {
            std::thread::sleep(MDNS_REFRESH_INTERVAL);
            if let Ok(mut g) = mdns_for_refresh.lock() {
                if let Some(ad) = g.as_ref() {
                    ad.shutdown();
                }
                *g = mdns::spawn_mdns_advertiser(http_bind);
            }
        });
    }

    if install_ctrlc {
        let mdns_for_signal = mdns_handle.clone();
        let _ = ctrlc::set_handler(move || {
            if let Ok(mut g) = mdns_for_signal.lock() {
                if let Some(ad) = g.as_ref() {
                    ad.shutdown();
                }
                *g = None;
            }
            std::process::exit(130);
        });
    }

    let http = http_api::spawn_http_server(config.http_bind, status, player.cmd_tx, database, shuffler, repeater);
    let _ = http.join();
    Ok(())
}
