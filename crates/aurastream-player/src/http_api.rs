//! HTTP control surface for remote playback control.
//!
//! One `AppState` shared via `web::Data`, one handler per command,
//! `NoContent` on success and a JSON `{"error": ...}` body on failure.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{http::StatusCode, middleware::Logger, web, App, HttpResponse, HttpServer};
use aurastream_animator::device;
use aurastream_playlist::{Repeater, Shuffler, TrackDatabase};
use aurastream_types::TrackId;
use crossbeam_channel::Sender;

use crate::session::PlayerCommand;
use crate::status::StatusState;

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(serde::Serialize)]
struct DevicesResponse {
    devices: Vec<DeviceInfo>,
}

#[derive(serde::Serialize)]
struct DeviceInfo {
    name: String,
    min_rate: u32,
    max_rate: u32,
}

#[derive(serde::Deserialize)]
struct PlayRequest {
    uri: String,
    #[serde(default)]
    metadata: String,
}

#[derive(serde::Deserialize)]
struct PlayTrackRequest {
    id: TrackId,
}

#[derive(serde::Deserialize)]
struct SeekRequest {
    seconds: f64,
}

#[derive(serde::Deserialize)]
struct MuteRequest {
    muted: bool,
}

#[derive(serde::Deserialize)]
struct InsertTrackRequest {
    uri: String,
    #[serde(default)]
    metadata: String,
    #[serde(default)]
    after: TrackId,
}

#[derive(serde::Deserialize)]
struct ToggleRequest {
    enabled: bool,
}

#[derive(serde::Serialize)]
struct TrackListEntry {
    id: TrackId,
    uri: String,
    metadata: String,
}

#[derive(serde::Serialize)]
struct PlaylistResponse {
    tracks: Vec<TrackListEntry>,
    shuffle: bool,
    repeat: bool,
}

#[derive(Clone)]
struct AppState {
    status: Arc<StatusState>,
    player_tx: Sender<PlayerCommand>,
    database: Arc<TrackDatabase>,
    shuffler: Arc<Shuffler>,
    repeater: Arc<Repeater>,
}

/// Spawn the HTTP API server on the given bind address; runs until the
/// process exits.
pub fn spawn_http_server(
    bind: SocketAddr,
    status: Arc<StatusState>,
    player_tx: Sender<PlayerCommand>,
    database: Arc<TrackDatabase>,
    shuffler: Arc<Shuffler>,
    repeater: Arc<Repeater>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let state = AppState { status, player_tx, database, shuffler, repeater };
        let runner = match HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(Logger::new("http request method=%m path=%U status=%s").exclude("/status").exclude("/health"))
                .route("/health", web::get().to(health))
                .route("/devices", web::get().to(list_devices))
                .route("/status", web::get().to(status_snapshot))
                .route("/play", web::post().to(play))
                .route("/play/track", web::post().to(play_track))
                .route("/next", web::post().to(next))
                .route("/prev", web::post().to(prev))
                .route("/pause", web::post().to(pause))
                .route("/resume", web::post().to(resume))
                .route("/stop", web::post().to(stop))
                .route("/seek", web::post().to(seek))
                .route("/mute", web::post().to(mute))
                .route("/playlist", web::get().to(playlist_list))
                .route("/playlist", web::post().to(playlist_insert))
                .route("/playlist/{id}", web::delete().to(playlist_delete))
                .route("/playlist/shuffle", web::post().to(playlist_shuffle))
                .route("/playlist/repeat", web::post().to(playlist_repeat))
        })
        .bind(bind)
        {
            Ok(server) => server.run(),
            Err(e) => {
                tracing::error!(error = %e, "http server bind failed");
                return;
            }
        };

        tracing::info!(%bind, "http api listening");
        let _ = actix_web::rt::System::new().block_on(runner);
    })
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

async fn list_devices() -> HttpResponse {
    let host = cpal::default_host();
    match device::list_device_infos(&host) {
        Ok(devices) => {
            let devices = devices
                .into_iter()
                .map(|d| DeviceInfo { name: d.name, min_rate: d.min_rate, max_rate: d.max_rate })
                .collect();
            HttpResponse::Ok().json(DevicesResponse { devices })
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("{e:#}")),
    }
}

async fn status_snapshot(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.status.snapshot())
}

async fn play(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: PlayRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    if req.uri.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "uri is required");
    }
    send_command(&state, PlayerCommand::Play { uri: req.uri, metadata: req.metadata })
}

async fn play_track(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: PlayTrackRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    send_command(&state, PlayerCommand::PlayTrack { id: req.id })
}

async fn next(state: web::Data<AppState>) -> HttpResponse {
    send_command(&state, PlayerCommand::Next)
}

async fn prev(state: web::Data<AppState>) -> HttpResponse {
    send_command(&state, PlayerCommand::Prev)
}

async fn pause(state: web::Data<AppState>) -> HttpResponse {
    send_command(&state, PlayerCommand::Pause)
}

async fn resume(state: web::Data<AppState>) -> HttpResponse {
    send_command(&state, PlayerCommand::Resume)
}

async fn stop(state: web::Data<AppState>) -> HttpResponse {
    send_command(&state, PlayerCommand::Stop)
}

async fn seek(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: SeekRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    send_command(&state, PlayerCommand::Seek { seconds: req.seconds })
}

async fn mute(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: MuteRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    send_command(&state, PlayerCommand::SetMuted(req.muted))
}

async fn playlist_list(state: web::Data<AppState>) -> HttpResponse {
    let (ids, _count) = state.database.id_array();
    let tracks = ids
        .into_iter()
        .filter_map(|id| state.database.get_by_id(id).ok())
        .map(|t| TrackListEntry { id: t.id, uri: t.uri.clone(), metadata: t.metadata.clone() })
        .collect();
    HttpResponse::Ok().json(PlaylistResponse {
        tracks,
        shuffle: state.shuffler.enabled(),
        repeat: state.repeater.repeat(),
    })
}

async fn playlist_insert(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: InsertTrackRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.database.insert(req.after, req.uri, req.metadata) {
        Ok(id) => HttpResponse::Ok().json(serde_json::json!({ "id": id })),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn playlist_delete(state: web::Data<AppState>, path: web::Path<TrackId>) -> HttpResponse {
    match state.database.delete_id(path.into_inner()) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn playlist_shuffle(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: ToggleRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    state.shuffler.set_shuffle(req.enabled);
    HttpResponse::NoContent().finish()
}

async fn playlist_repeat(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: ToggleRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    state.repeater.set_repeat(req.enabled);
    HttpResponse::NoContent().finish()
}

fn send_command(state: &AppState, command: PlayerCommand) -> HttpResponse {
    if state.player_tx.send(command).is_err() {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "player offline")
    } else {
        HttpResponse::NoContent().finish()
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &web::Bytes) -> Result<T, HttpResponse> {
    serde_json::from_slice(body).map_err(|e| error_response(StatusCode::BAD_REQUEST, &format!("invalid json: {e}")))
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body;

    #[actix_web::test]
    async fn error_response_encodes_message() {
        let resp = error_response(StatusCode::NOT_FOUND, "missing");
        let body = body::to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "missing");
    }

    #[test]
    fn play_request_defaults_metadata_to_empty() {
        let req: PlayRequest = serde_json::from_str(r#"{"uri":"http://host/track.flac"}"#).unwrap();
        assert_eq!(req.uri, "http://host/track.flac");
        assert!(req.metadata.is_empty());
    }

    #[test]
    fn insert_track_request_defaults_after_to_invalid() {
        let req: InsertTrackRequest = serde_json::from_str(r#"{"uri":"http://host/a.flac"}"#).unwrap();
        assert_eq!(req.after, aurastream_types::ID_INVALID);
    }
}
