//! Wires every concrete [`Protocol`](aurastream_protocol::Protocol) this
//! binary knows about into one set, and picks the right one for a URI plus
//! the `Mode` boundary that should precede it (spec.md §3.2 "Mode... marks
//! a boundary").

use aurastream_core::msg::ModeFlags;
use aurastream_protocol::context::ProtocolContext;
use aurastream_protocol::hls::HlsProtocol;
use aurastream_protocol::raop::RaopProtocol;
use aurastream_protocol::{HttpProtocol, Protocol, QobuzProtocol, SongcastProtocol};
use std::sync::Arc;

/// Credentials needed to construct a [`QobuzProtocol`]; absent, `qobuz://`
/// URIs are simply unsupported (no protocol recognises them).
pub struct QobuzCredentials {
    pub app_id: String,
    pub app_secret: String,
}

/// Every protocol this player understands, plus the mode name/flags a
/// `Msg::Mode` boundary should carry ahead of playing a URI it supports.
pub struct ProtocolSet {
    protocols: Vec<Arc<dyn Protocol>>,
}

impl ProtocolSet {
    pub fn new(ctx: ProtocolContext, qobuz: Option<QobuzCredentials>) -> Self {
        let mut protocols: Vec<Arc<dyn Protocol>> = vec![
            Arc::new(HttpProtocol::new(ctx.clone())),
            Arc::new(RaopProtocol::new(ctx.clone())),
            Arc::new(SongcastProtocol::new(ctx.clone())),
            Arc::new(HlsProtocol::new(ctx.clone())),
        ];
        if let Some(creds) = qobuz {
            protocols.push(Arc::new(QobuzProtocol::new(ctx, creds.app_id, creds.app_secret)));
        }
        Self { protocols }
    }

    /// Find the protocol recognising `uri` by scheme, if any.
    pub fn find(&self, uri: &str) -> Option<Arc<dyn Protocol>> {
        self.protocols.iter().find(|p| p.supports(uri)).cloned()
    }
}

/// The `Mode` boundary a URI's scheme implies (spec.md §GLOSSARY "Mode": "a
/// top-level source class... mode boundaries reset most per-stream state").
pub fn mode_for_uri(uri: &str) -> (&'static str, ModeFlags) {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        ("http", ModeFlags { supports_latency: true, is_real_time: false, supports_next_prev: true })
    } else if uri.starts_with("raop://") {
        ("airplay", ModeFlags { supports_latency: true, is_real_time: true, supports_next_prev: false })
    } else if uri.starts_with("ohm://") || uri.starts_with("ohu://") || uri.starts_with("ohz://") {
        ("songcast", ModeFlags { supports_latency: true, is_real_time: true, supports_next_prev: false })
    } else if uri.starts_with("hls://") || uri.ends_with(".m3u8") {
        ("hls", ModeFlags { supports_latency: false, is_real_time: true, supports_next_prev: false })
    } else if uri.starts_with("qobuz://") {
        ("qobuz", ModeFlags { supports_latency: true, is_real_time: false, supports_next_prev: true })
    } else {
        ("unknown", ModeFlags::default())
    }
}
