//! Command-line interface definitions. Kept free of audio logic so the
//! rest of the crate stays reusable independently of argument parsing.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "aurastream-player")]
pub struct Args {
    /// List output devices and exit.
    #[arg(long)]
    pub list_devices: bool,

    /// Select an output device by substring match; the host default is
    /// used when omitted (`--udn`/`--name`/`--channel`/`--adapter` map to
    /// UPnP/DLNA surfaces out of this crate's scope per spec.md §6 and are
    /// not reproduced here).
    #[arg(long)]
    pub device: Option<String>,

    /// HTTP control API bind address.
    #[arg(long, default_value = "0.0.0.0:5960")]
    pub http_bind: SocketAddr,

    /// Encoded reservoir byte budget (spec.md §4.5).
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    pub encoded_reservoir_bytes: usize,

    /// Decoded reservoir budget, in milliseconds of audio (spec.md §4.5).
    #[arg(long, default_value_t = 5_000)]
    pub decoded_reservoir_ms: u64,

    /// Decoded reservoir gorge threshold, in milliseconds (spec.md §4.5,
    /// §GLOSSARY "Gorging").
    #[arg(long, default_value_t = 500)]
    pub gorge_ms: u64,

    /// Resampler input chunk size in frames.
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Playback callback refill cap, in frames.
    #[arg(long, default_value_t = 512)]
    pub refill_max_frames: usize,

    /// Animator-side queue buffer target, in seconds.
    #[arg(long, default_value_t = 0.5)]
    pub buffer_seconds: f32,

    /// Qobuz app id, required only to stream `qobuz://` URIs.
    #[arg(long, env = "AURASTREAM_QOBUZ_APP_ID")]
    pub qobuz_app_id: Option<String>,

    /// Qobuz app secret, required only to stream `qobuz://` URIs.
    #[arg(long, env = "AURASTREAM_QOBUZ_APP_SECRET")]
    pub qobuz_app_secret: Option<String>,

    /// Disable mDNS advertisement.
    #[arg(long)]
    pub no_mdns: bool,
}
