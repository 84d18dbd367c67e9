//! aurastream-player — a networked media player binary: decodes, ramps,
//! and paces audio through the `aurastream-pipeline` stage chain and
//! plays it via CPAL, fed by whichever wire protocol (`http(s)://`,
//! `raop://`, `ohm://`/`ohu://`/`ohz://`, `hls://`, `qobuz://`) a client
//! asks it to stream, and controlled over a small HTTP API (spec.md §6).
//!
//! ## Modules
//! - `cli`: argument parsing.
//! - `config`: CLI args -> typed pipeline/animator configuration.
//! - `protocols`: the set of `Protocol` implementations this binary wires up.
//! - `session`: the playback worker — owns the protocol session lifecycle
//!   and emits `Mode`/`Track` boundaries.
//! - `status`: shared status state fed by pipeline observer events.
//! - `http_api`: the HTTP control surface.
//! - `mdns`: LAN discovery advertisement.
//! - `runtime`: wires everything above together and runs it.

mod cli;
mod config;
mod http_api;
mod mdns;
mod protocols;
mod runtime;
mod session;
mod status;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,aurastream_player=info")))
        .init();

    if args.list_devices {
        let host = cpal::default_host();
        for info in aurastream_animator::device::list_device_infos(&host)? {
            println!("{}\t{}-{} Hz", info.name, info.min_rate, info.max_rate);
        }
        return Ok(());
    }

    let qobuz = config::qobuz_credentials(&args);
    let config = config::PlayerConfig::from(&args);
    runtime::run(config, qobuz, true)
}
