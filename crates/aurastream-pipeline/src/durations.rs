//! Ramp-length constants shared by the flow-control stages (spec.md §3.2,
//! §4.4: "Ramp lengths are stage-specific constants").

use aurastream_core::jiffies::ms_to_jiffies;

/// Used by the seeker's pre/post-seek ramp and stream-interruption mini-ramps.
pub fn ramp_short_jiffies() -> u64 {
    ms_to_jiffies(20)
}

/// Used by play/pause/stop, the muter, and the starvation ramper.
pub fn ramp_long_jiffies() -> u64 {
    ms_to_jiffies(500)
}
