//! Generic HTTP byte-range `Protocol`, built around a block-fetch loop
//! that pushes `Msg`s instead of exposing a `Read` source.

use crate::context::ProtocolContext;
use crate::protocol::{Protocol, StreamOutcome};
use aurastream_core::msg::{EncodedAudio, EncodedStreamInfo, Msg};
use aurastream_core::{OkToPlay, StreamHandler};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BLOCK_SIZE: usize = 512 * 1024;

/// Shared control surface between the blocking fetch loop in
/// `HttpProtocol::stream` and whatever calls `try_stop`/`try_seek` from
/// another thread as this protocol's registered `StreamHandler`.
#[derive(Default)]
struct SharedState {
    cancel: AtomicBool,
    stop_flush_id: AtomicU32,
    seek_byte_offset: AtomicU64,
    seek_flush_id: AtomicU32,
}

pub struct HttpProtocol {
    block_size: usize,
    timeout: Duration,
    agent: ureq::Agent,
    shared: Arc<SharedState>,
    ctx: ProtocolContext,
}

impl HttpProtocol {
    pub fn new(ctx: ProtocolContext) -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            timeout: Duration::from_secs(10),
            agent: ureq::Agent::config_builder().build().new_agent(),
            shared: Arc::new(SharedState::default()),
            ctx,
        }
    }

    /// A [`StreamHandler`] this protocol's streams can carry as their
    /// back-pointer; answers `try_stop`/`try_seek` by latching state this
    /// protocol's fetch loop polls on its next iteration.
    pub fn handler(&self) -> Arc<dyn StreamHandler> {
        Arc::new(HttpStreamHandler { shared: self.shared.clone(), ctx: self.ctx.clone() })
    }

    fn fetch_range(&self, url: &str, start: u64, end: u64) -> Result<(Vec<u8>, Option<u64>), anyhow::Error> {
        let range = format!("bytes={start}-{end}");
        let resp = self
            .agent
            .get(url)
            .config()
            .timeout_per_call(Some(self.timeout))
            .build()
            .header("Range", &range)
            .call()
            .map_err(|e| anyhow::anyhow!("http range request failed: {e}"))?;

        let status = resp.status();
        let content_range = resp.headers().get("Content-Range").and_then(|v| v.to_str().ok()).map(str::to_string);
        let content_length =
            resp.headers().get("Content-Length").and_then(|v| v.to_str().ok()).and_then(|s| s.parse::<u64>().ok());

        let (_, body) = resp.into_parts();
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut body.into_reader(), &mut buf)?;

        if !status.is_success() {
            anyhow::bail!("http range status={status} url={url} range={range}");
        }

        let total = content_range.as_deref().and_then(parse_content_range_total).or(content_length);
        Ok((buf, total))
    }
}

fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.split_once('/')?;
    total.parse::<u64>().ok()
}

impl Protocol for HttpProtocol {
    fn supports(&self, uri: &str) -> bool {
        uri.starts_with("http://") || uri.starts_with("https://")
    }

    fn stream(&self, uri: &str, output: &Sender<Msg>) -> StreamOutcome {
        self.shared.cancel.store(false, Ordering::Release);
        self.shared.stop_flush_id.store(aurastream_types::ID_INVALID, Ordering::Release);
        self.shared.seek_flush_id.store(aurastream_types::ID_INVALID, Ordering::Release);

        let (first_block, total_len) = match self.fetch_range(uri, 0, self.block_size as u64 - 1) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(uri, error = %e, "http stream: initial fetch failed");
                return StreamOutcome::ErrorRecoverable;
            }
        };

        let stream_id = self.ctx.next_stream_id();
        let handler_id = self.ctx.register(self.handler());
        let info = EncodedStreamInfo {
            uri: uri.to_string(),
            total_bytes: total_len,
            stream_id,
            seekable: total_len.is_some(),
            live: total_len.is_none(),
            handler: handler_id,
        };
        if output.send(Msg::EncodedStream(info)).is_err() {
            return StreamOutcome::ErrorUnrecoverable;
        }
        if output.send(Msg::AudioEncoded(EncodedAudio::new(first_block.clone()))).is_err() {
            return StreamOutcome::ErrorUnrecoverable;
        }

        let mut pos = first_block.len() as u64;
        loop {
            if let Some(total) = total_len {
                if pos >= total {
                    return StreamOutcome::Success;
                }
            }
            if self.shared.cancel.load(Ordering::Acquire) {
                return StreamOutcome::Stopped;
            }
            let flush_id = self.shared.stop_flush_id.swap(aurastream_types::ID_INVALID, Ordering::AcqRel);
            if flush_id != aurastream_types::ID_INVALID {
                let _ = output.send(Msg::Flush(flush_id));
                return StreamOutcome::Stopped;
            }
            let seek_flush_id = self.shared.seek_flush_id.swap(aurastream_types::ID_INVALID, Ordering::AcqRel);
            if seek_flush_id != aurastream_types::ID_INVALID {
                pos = self.shared.seek_byte_offset.load(Ordering::Acquire);
                if output.send(Msg::Flush(seek_flush_id)).is_err() {
                    return StreamOutcome::ErrorUnrecoverable;
                }
                continue;
            }

            let end = pos.saturating_add(self.block_size as u64 - 1);
            let end = total_len.map(|t| end.min(t.saturating_sub(1))).unwrap_or(end);
            match self.fetch_range(uri, pos, end) {
                Ok((bytes, _)) if bytes.is_empty() => return StreamOutcome::Success,
                Ok((bytes, _)) => {
                    pos += bytes.len() as u64;
                    if output.send(Msg::AudioEncoded(EncodedAudio::new(bytes))).is_err() {
                        return StreamOutcome::ErrorUnrecoverable;
                    }
                }
                Err(e) => {
                    tracing::warn!(uri, error = %e, "http stream: range fetch failed");
                    return StreamOutcome::ErrorRecoverable;
                }
            }
        }
    }

    fn interrupt(&self) {
        // ureq calls are synchronous; the in-flight request still runs to
        // completion, but the loop checks this flag before starting the
        // next one, bounding the delay to one block fetch.
        self.shared.cancel.store(true, Ordering::Release);
    }
}

struct HttpStreamHandler {
    shared: Arc<SharedState>,
    ctx: ProtocolContext,
}

impl StreamHandler for HttpStreamHandler {
    fn ok_to_play(&self) -> OkToPlay {
        OkToPlay::Yes
    }

    fn try_stop(&self, _stream_id: u32) -> u32 {
        let id = self.ctx.next_flush_id();
        self.shared.stop_flush_id.store(id, Ordering::Release);
        id
    }

    fn try_seek(&self, _stream_id: u32, byte_offset: u64) -> u32 {
        let id = self.ctx.next_flush_id();
        self.shared.seek_byte_offset.store(byte_offset, Ordering::Release);
        self.shared.seek_flush_id.store(id, Ordering::Release);
        id
    }
}
