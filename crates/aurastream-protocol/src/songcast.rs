//! Songcast (`ohm://`/`ohu://`/`ohz://`) `Protocol` implementation
//! (spec.md §6): a 7-byte fixed header followed by a type-specific body.

use crate::context::ProtocolContext;
use crate::protocol::{Protocol, StreamOutcome};
use aurastream_core::msg::{EncodedAudio, EncodedStreamInfo, Msg};
use aurastream_core::{OkToPlay, StreamHandler};
use crossbeam_channel::Sender;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SIGNATURE: &[u8; 4] = b"Ohm ";
const MAJOR_VERSION: u8 = 1;
const HEADER_LEN: usize = 7;

pub const TYPE_JOIN: u8 = 1;
pub const TYPE_LISTEN: u8 = 2;
pub const TYPE_LEAVE: u8 = 3;
pub const TYPE_AUDIO: u8 = 4;
pub const TYPE_TRACK: u8 = 5;
pub const TYPE_METATEXT: u8 = 6;
pub const TYPE_RESEND: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OhmError {
    #[error("packet too short for an Ohm header ({0} bytes)")]
    TooShort(usize),
    #[error("bad signature (not 'Ohm ')")]
    BadSignature,
    #[error("unsupported major version {0}")]
    BadVersion(u8),
}

/// A parsed Songcast frame header (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OhmHeader {
    pub msg_type: u8,
    pub body_bytes: u16,
}

pub fn parse_header(packet: &[u8]) -> Result<(OhmHeader, &[u8]), OhmError> {
    if packet.len() < HEADER_LEN {
        return Err(OhmError::TooShort(packet.len()));
    }
    if &packet[0..4] != SIGNATURE {
        return Err(OhmError::BadSignature);
    }
    if packet[4] != MAJOR_VERSION {
        return Err(OhmError::BadVersion(packet[4]));
    }
    let header = OhmHeader { msg_type: packet[5], body_bytes: u16::from_be_bytes([0, packet[6]]) };
    Ok((header, &packet[HEADER_LEN..]))
}

/// Audio-frame body: frame number, latency (jiffies), timestamp, then
/// opaque codec bytes (spec.md §6: "audio frames carry frame number,
/// latency, timestamp").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFrameHeader {
    pub frame_number: u32,
    pub latency_jiffies: u32,
    pub timestamp: u32,
}

const AUDIO_FRAME_HEADER_LEN: usize = 12;

pub fn parse_audio_frame(body: &[u8]) -> Result<(AudioFrameHeader, &[u8]), OhmError> {
    if body.len() < AUDIO_FRAME_HEADER_LEN {
        return Err(OhmError::TooShort(body.len()));
    }
    Ok((
        AudioFrameHeader {
            frame_number: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
            latency_jiffies: u32::from_be_bytes([body[4], body[5], body[6], body[7]]),
            timestamp: u32::from_be_bytes([body[8], body[9], body[10], body[11]]),
        },
        &body[AUDIO_FRAME_HEADER_LEN..],
    ))
}

#[derive(Default)]
struct SharedState {
    cancel: AtomicBool,
}

pub struct SongcastProtocol {
    ctx: ProtocolContext,
    shared: Arc<SharedState>,
}

impl SongcastProtocol {
    pub fn new(ctx: ProtocolContext) -> Self {
        Self { ctx, shared: Arc::new(SharedState::default()) }
    }
}

impl Protocol for SongcastProtocol {
    fn supports(&self, uri: &str) -> bool {
        uri.starts_with("ohm://") || uri.starts_with("ohu://") || uri.starts_with("ohz://")
    }

    fn stream(&self, uri: &str, output: &Sender<Msg>) -> StreamOutcome {
        self.shared.cancel.store(false, Ordering::Release);
        let Some(endpoint) = uri.split_once("://").map(|(_, rest)| rest) else {
            return StreamOutcome::ErrorUnrecoverable;
        };
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(uri, error = %e, "songcast: socket bind failed");
                return StreamOutcome::ErrorRecoverable;
            }
        };
        if let Err(e) = socket.connect(endpoint) {
            tracing::warn!(uri, error = %e, "songcast: connect failed");
            return StreamOutcome::ErrorRecoverable;
        }
        let _ = socket.set_read_timeout(Some(Duration::from_millis(100)));

        let stream_id = self.ctx.next_stream_id();
        let handler_id = self.ctx.register(Arc::new(SongcastStreamHandler { shared: self.shared.clone() }));
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

        let mut buf = [0u8; 16 * 1024];
        loop {
            if self.shared.cancel.load(Ordering::Acquire) {
                return StreamOutcome::Stopped;
            }
            match socket.recv(&mut buf) {
                Ok(count) => match parse_header(&buf[..count]) {
                    Ok((header, body)) => match header.msg_type {
                        TYPE_AUDIO => match parse_audio_frame(body) {
                            Ok((_frame_header, audio)) => {
                                if output.send(Msg::AudioEncoded(EncodedAudio::new(audio.to_vec()))).is_err() {
                                    return StreamOutcome::ErrorUnrecoverable;
                                }
                            }
                            Err(e) => tracing::warn!(uri, error = %e, "songcast: malformed audio frame"),
                        },
                        TYPE_METATEXT => {
                            if let Ok(text) = std::str::from_utf8(body) {
                                let _ = output.send(Msg::MetaText(text.to_string()));
                            }
                        }
                        TYPE_TRACK => {} // track metadata; URI/metadata parsing left to the mode layer
                        _ => {}
                    },
                    Err(e) => tracing::debug!(uri, error = %e, "songcast: unrecognised packet"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    tracing::warn!(uri, error = %e, "songcast: socket read failed");
                    return StreamOutcome::ErrorRecoverable;
                }
            }
        }
    }

    fn interrupt(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }
}

struct SongcastStreamHandler {
    shared: Arc<SharedState>,
}

impl StreamHandler for SongcastStreamHandler {
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

    fn header_bytes(msg_type: u8, body_len: u8) -> Vec<u8> {
        let mut pkt = SIGNATURE.to_vec();
        pkt.push(MAJOR_VERSION);
        pkt.push(msg_type);
        pkt.push(body_len);
        pkt
    }

    #[test]
    fn parses_audio_header_and_frame() {
        let mut pkt = header_bytes(TYPE_AUDIO, 12);
        pkt.extend_from_slice(&1u32.to_be_bytes());
        pkt.extend_from_slice(&200u32.to_be_bytes());
        pkt.extend_from_slice(&300u32.to_be_bytes());
        pkt.extend_from_slice(b"DATA");

        let (header, body) = parse_header(&pkt).unwrap();
        assert_eq!(header.msg_type, TYPE_AUDIO);
        let (frame, audio) = parse_audio_frame(body).unwrap();
        assert_eq!(frame.frame_number, 1);
        assert_eq!(frame.latency_jiffies, 200);
        assert_eq!(frame.timestamp, 300);
        assert_eq!(audio, b"DATA");
    }

    #[test]
    fn rejects_bad_signature() {
        let mut pkt = b"Xhm ".to_vec();
        pkt.extend_from_slice(&[1, 4, 0]);
        assert_eq!(parse_header(&pkt), Err(OhmError::BadSignature));
    }
}
