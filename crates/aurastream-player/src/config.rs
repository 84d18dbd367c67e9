//! Typed configuration assembled from [`crate::cli::Args`], split between
//! listen-mode wiring and the inner playback tuning it carries.

use std::net::SocketAddr;

use aurastream_animator::AnimatorConfig;
use aurastream_pipeline::{DecodedReservoirConfig, EncodedReservoirConfig, PipelineConfig};

use crate::cli::Args;
use crate::protocols::QobuzCredentials;

/// Everything needed to bring the pipeline, the animator, and the control
/// surfaces up.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub device: Option<String>,
    pub http_bind: SocketAddr,
    pub pipeline: PipelineConfig,
    pub animator: AnimatorConfig,
    pub mdns_enabled: bool,
}

impl From<&Args> for PlayerConfig {
    fn from(args: &Args) -> Self {
        use aurastream_core::jiffies::ms_to_jiffies;
        Self {
            device: args.device.clone(),
            http_bind: args.http_bind,
            pipeline: PipelineConfig {
                encoded: EncodedReservoirConfig {
                    max_bytes: args.encoded_reservoir_bytes as u64,
                    ..EncodedReservoirConfig::default()
                },
                decoded: DecodedReservoirConfig {
                    max_jiffies: ms_to_jiffies(args.decoded_reservoir_ms),
                    gorge_jiffies: ms_to_jiffies(args.gorge_ms),
                    ..DecodedReservoirConfig::default()
                },
            },
            animator: AnimatorConfig {
                device_name: args.device.clone(),
                target_rate: None,
                refill_max_frames: args.refill_max_frames,
                chunk_frames: args.chunk_frames,
                buffer_seconds: args.buffer_seconds,
            },
            mdns_enabled: !args.no_mdns,
        }
    }
}

/// Qobuz credentials, present only when both CLI/env values were supplied.
pub fn qobuz_credentials(args: &Args) -> Option<QobuzCredentials> {
    match (&args.qobuz_app_id, &args.qobuz_app_secret) {
        (Some(app_id), Some(app_secret)) => {
            Some(QobuzCredentials { app_id: app_id.clone(), app_secret: app_secret.clone() })
        }
        _ => None,
    }
}
