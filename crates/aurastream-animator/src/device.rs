//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for listing output devices and picking the
//! one (and the stream config on it) the animator should open.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use std::sync::{Mutex, OnceLock};

/// Pick the first output device whose name contains `needle` (case
/// insensitive), or the host default if `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host.output_devices().context("no output devices")?.collect();

    if let Some(needle) = needle {
        if let Some(d) = devices.drain(..).find(|d| {
            d.description().ok().map(|n| matches_device_name(&n.name(), needle)).unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("no output device matched: {needle}"));
    }

    host.default_output_device().ok_or_else(|| anyhow!("no default output device"))
}

/// Choose the best supported output config for a target sample rate.
///
/// Prefers the highest rate `<= target_rate`, falling back to the lowest
/// rate above it; with no target, prefers the highest rate. Ties break on
/// sample format (f32 > i32 > i16 > u16).
pub fn pick_output_config(device: &cpal::Device, target_rate: Option<u32>) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device.supported_output_configs()?.collect();
    if ranges.is_empty() {
        return Err(anyhow!("no supported output configs"));
    }

    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;

    for range in ranges {
        let min = range.min_sample_rate();
        let max = range.max_sample_rate();
        let rate = pick_rate_for_range(min, max, target_rate);
        let below = target_rate.map(|t| rate <= t).unwrap_or(true);
        let format_rank = sample_format_rank(range.sample_format());
        let cfg = range.with_sample_rate(rate);
        let candidate = (below, rate, format_rank, cfg);
        let replace = match &best {
            None => true,
            Some((b_below, b_rate, b_rank, _)) => is_better_candidate(below, rate, format_rank, *b_below, *b_rate, *b_rank),
        };
        if replace {
            best = Some(candidate);
        }
    }

    Ok(best.unwrap().3)
}

/// Prefer a larger fixed buffer size if the device advertises a range, to
/// reduce underrun risk; `None` lets CPAL use the device default.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            const MAX_FRAMES: u32 = 16_384;
            let chosen = if *max > MAX_FRAMES { (*min).max(MAX_FRAMES) } else { *max };
            Some(cpal::BufferSize::Fixed(chosen))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

fn pick_rate_for_range(min: u32, max: u32, target_rate: Option<u32>) -> u32 {
    let Some(target) = target_rate else { return max };
    if target >= min && target <= max {
        target
    } else if target < min {
        min
    } else {
        max
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(below: bool, rate: u32, format_rank: u8, best_below: bool, best_rate: u32, best_rank: u8) -> bool {
    if below != best_below {
        below && !best_below
    } else if rate != best_rate {
        rate > best_rate
    } else {
        format_rank < best_rank
    }
}

/// Output device metadata, for listing/selection UIs (the HTTP control
/// surface's device-list endpoint).
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub min_rate: u32,
    pub max_rate: u32,
}

pub fn list_device_infos(host: &cpal::Host) -> Result<Vec<DeviceInfo>> {
    let devices = host.output_devices().context("no output devices")?;
    let mut out = Vec::new();
    for d in devices {
        let name = d.description().map(|d| d.to_string()).unwrap_or_else(|_| "unknown".to_string());
        let cache_key = device_cache_key(&d, &name);
        let mut min_rate = u32::MAX;
        let mut max_rate = 0u32;
        if let Ok(ranges) = d.supported_output_configs() {
            for r in ranges {
                min_rate = min_rate.min(r.min_sample_rate());
                max_rate = max_rate.max(r.max_sample_rate());
            }
        }
        if min_rate == u32::MAX || max_rate == 0 || max_rate < min_rate {
            if let Some((cached_min, cached_max)) = cached_rates(&cache_key) {
                min_rate = cached_min;
                max_rate = cached_max;
            } else if let Ok(default_cfg) = d.default_output_config() {
                let sr = default_cfg.sample_rate();
                min_rate = sr;
                max_rate = sr;
            } else {
                tracing::warn!(device = %name, "skipping device with no usable sample rate range");
                continue;
            }
        }
        update_cached_rates(&cache_key, min_rate, max_rate);
        out.push(DeviceInfo { id: cache_key, name, min_rate, max_rate });
    }
    Ok(out)
}

fn device_cache_key(device: &cpal::Device, name: &str) -> String {
    if let Ok(id) = device.id() {
        return id.to_string();
    }
    name.to_string()
}

fn rates_cache() -> &'static Mutex<std::collections::HashMap<String, (u32, u32)>> {
    static CACHE: OnceLock<Mutex<std::collections::HashMap<String, (u32, u32)>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(std::collections::HashMap::new()))
}

fn cached_rates(key: &str) -> Option<(u32, u32)> {
    rates_cache().lock().ok().and_then(|m| m.get(key).copied())
}

fn update_cached_rates(key: &str, min_rate: u32, max_rate: u32) {
    if let Ok(mut m) = rates_cache().lock() {
        m.insert(key.to_string(), (min_rate, max_rate));
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }

    #[test]
    fn pick_rate_for_range_prefers_target_when_in_range() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, Some(48_000)), 48_000);
    }

    #[test]
    fn pick_rate_for_range_clamps_below_min() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, Some(22_050)), 44_100);
    }

    #[test]
    fn pick_rate_for_range_clamps_above_max() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, Some(192_000)), 96_000);
    }

    #[test]
    fn pick_rate_for_range_defaults_to_max() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, None), 96_000);
    }

    #[test]
    fn is_better_candidate_prefers_below_target() {
        assert!(is_better_candidate(true, 48_000, 1, false, 48_000, 1));
    }

    #[test]
    fn is_better_candidate_prefers_higher_rate() {
        assert!(is_better_candidate(true, 96_000, 2, true, 48_000, 2));
    }

    #[test]
    fn is_better_candidate_prefers_lower_rank() {
        assert!(is_better_candidate(true, 48_000, 0, true, 48_000, 2));
    }
}
