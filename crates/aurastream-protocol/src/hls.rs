//! HLS (`hls://`) `Protocol` implementation (spec.md §6).
//!
//! Fetches an `#EXTM3U` playlist, resolves segment URIs against it,
//! streams each segment's bytes in media-sequence order, and reloads the
//! playlist at the target duration until `#EXT-X-ENDLIST` appears.

use crate::context::ProtocolContext;
use crate::protocol::{Protocol, StreamOutcome};
use aurastream_core::msg::{EncodedAudio, EncodedStreamInfo, Msg};
use aurastream_core::{OkToPlay, StreamHandler};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One `#EXTINF` entry: a segment URI (already resolved against the
/// playlist's own URL) plus its declared duration in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub uri: String,
    pub duration_secs: f64,
}

/// A parsed media playlist (spec.md §6).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaPlaylist {
    pub target_duration_secs: u64,
    pub media_sequence: u64,
    pub segments: Vec<Segment>,
    pub ended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HlsError {
    #[error("playlist missing #EXTM3U header")]
    NotAPlaylist,
}

/// Parse an M3U8 media playlist, resolving relative segment URIs against
/// `base_url` (spec.md §6: "segment URIs absolute or resolved against
/// playlist URI").
pub fn parse_playlist(text: &str, base_url: &Url) -> Result<MediaPlaylist, HlsError> {
    let mut lines = text.lines().map(str::trim);
    match lines.next() {
        Some(first) if first == "#EXTM3U" => {}
        _ => return Err(HlsError::NotAPlaylist),
    }

    let mut playlist = MediaPlaylist::default();
    let mut pending_duration: Option<f64> = None;

    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration_secs = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            playlist.media_sequence = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let duration_str = rest.split(',').next().unwrap_or("0");
            pending_duration = Some(duration_str.trim().parse().unwrap_or(0.0));
        } else if line == "#EXT-X-ENDLIST" {
            playlist.ended = true;
        } else if line.starts_with('#') {
            // Unrecognised tag; ignore.
        } else {
            let resolved = base_url.join(line).map(|u| u.to_string()).unwrap_or_else(|_| line.to_string());
            playlist.segments.push(Segment {
                uri: resolved,
                duration_secs: pending_duration.take().unwrap_or(0.0),
            });
        }
    }
    Ok(playlist)
}

/// Given a playlist reload whose `media_sequence` has advanced, how many
/// of `previous`'s segments are assumed completed and should not be
/// re-fetched (spec.md §8 scenario S5).
pub fn segments_skipped_on_reload(previous_media_sequence: u64, reloaded_media_sequence: u64) -> u64 {
    reloaded_media_sequence.saturating_sub(previous_media_sequence)
}

#[derive(Default)]
struct SharedState {
    cancel: AtomicBool,
}

pub struct HlsProtocol {
    agent: ureq::Agent,
    shared: Arc<SharedState>,
    ctx: ProtocolContext,
}

impl HlsProtocol {
    pub fn new(ctx: ProtocolContext) -> Self {
        Self {
            agent: ureq::Agent::config_builder().build().new_agent(),
            shared: Arc::new(SharedState::default()),
            ctx,
        }
    }

    fn fetch_text(&self, url: &str) -> Result<String, anyhow::Error> {
        let resp = self.agent.get(url).call().map_err(|e| anyhow::anyhow!("hls playlist fetch failed: {e}"))?;
        Ok(resp.into_body().read_to_string()?)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, anyhow::Error> {
        let resp = self.agent.get(url).call().map_err(|e| anyhow::anyhow!("hls segment fetch failed: {e}"))?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut resp.into_body().into_reader(), &mut buf)?;
        Ok(buf)
    }
}

impl Protocol for HlsProtocol {
    fn supports(&self, uri: &str) -> bool {
        uri.starts_with("hls://") || uri.ends_with(".m3u8")
    }

    fn stream(&self, uri: &str, output: &Sender<Msg>) -> StreamOutcome {
        self.shared.cancel.store(false, Ordering::Release);
        let playlist_url = uri.strip_prefix("hls://").map(|rest| format!("http://{rest}")).unwrap_or_else(|| uri.to_string());
        let Ok(base_url) = Url::parse(&playlist_url) else {
            return StreamOutcome::ErrorUnrecoverable;
        };

        let stream_id = self.ctx.next_stream_id();
        let handler_id = self.ctx.register(Arc::new(HlsStreamHandler { shared: self.shared.clone() }));
        let info = EncodedStreamInfo {
            uri: uri.to_string(),
            total_bytes: None,
            stream_id,
            seekable: false,
            live: true,
            handler: handler_id,
        };
        if output.send(Msg::EncodedStream(info)).is_err() {
            return StreamOutcome::ErrorUnrecoverable;
        }

        let mut last_media_sequence: Option<u64> = None;
        loop {
            if self.shared.cancel.load(Ordering::Acquire) {
                return StreamOutcome::Stopped;
            }

            let text = match self.fetch_text(&playlist_url) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(uri, error = %e, "hls: playlist fetch failed");
                    return StreamOutcome::ErrorRecoverable;
                }
            };
            let playlist = match parse_playlist(&text, &base_url) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(uri, error = %e, "hls: malformed playlist");
                    return StreamOutcome::ErrorUnrecoverable;
                }
            };

            let skip = last_media_sequence.map(|prev| segments_skipped_on_reload(prev, playlist.media_sequence)).unwrap_or(0);
            for segment in playlist.segments.iter().skip(skip as usize) {
                if self.shared.cancel.load(Ordering::Acquire) {
                    return StreamOutcome::Stopped;
                }
                match self.fetch_bytes(&segment.uri) {
                    Ok(bytes) if output.send(Msg::AudioEncoded(EncodedAudio::new(bytes))).is_err() => {
                        return StreamOutcome::ErrorUnrecoverable;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(segment = %segment.uri, error = %e, "hls: segment fetch failed");
                        return StreamOutcome::ErrorRecoverable;
                    }
                }
            }
            last_media_sequence = Some(playlist.media_sequence + playlist.segments.len() as u64);

            if playlist.ended {
                return StreamOutcome::Success;
            }
            std::thread::sleep(Duration::from_secs(playlist.target_duration_secs.max(1)));
        }
    }

    fn interrupt(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }
}

struct HlsStreamHandler {
    shared: Arc<SharedState>,
}

impl StreamHandler for HlsStreamHandler {
    fn ok_to_play(&self) -> OkToPlay {
        OkToPlay::Yes
    }

    fn try_stop(&self, _stream_id: u32) -> u32 {
        self.shared.cancel.store(true, Ordering::Release);
        aurastream_types::ID_INVALID
    }

    fn try_seek(&self, _stream_id: u32, _byte_offset: u64) -> u32 {
        aurastream_types::ID_INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/stream/playlist.m3u8").unwrap()
    }

    #[test]
    fn parses_segments_and_sequence() {
        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:10\n#EXTINF:9.9,\nseg10.ts\n#EXTINF:9.9,\nseg11.ts\n";
        let playlist = parse_playlist(text, &base()).unwrap();
        assert_eq!(playlist.media_sequence, 10);
        assert_eq!(playlist.target_duration_secs, 10);
        assert_eq!(playlist.segments.len(), 2);
        assert_eq!(playlist.segments[0].uri, "http://example.com/stream/seg10.ts");
        assert_eq!(playlist.segments[0].duration_secs, 9.9);
        assert!(!playlist.ended);
    }

    #[test]
    fn endlist_tag_is_recognised() {
        let text = "#EXTM3U\n#EXTINF:1,\nseg.ts\n#EXT-X-ENDLIST\n";
        let playlist = parse_playlist(text, &base()).unwrap();
        assert!(playlist.ended);
    }

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(parse_playlist("seg.ts\n", &base()), Err(HlsError::NotAPlaylist));
    }

    #[test]
    fn reload_skips_already_completed_segments_s5() {
        // spec.md §8 S5: sequence 10 then reload reporting 13 => 3 segments assumed done.
        assert_eq!(segments_skipped_on_reload(10, 13), 3);
    }
}
