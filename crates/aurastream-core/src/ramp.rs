//! Ramps: linear-in-time fade multipliers applied to `AudioPcm` samples.
//!
//! A ramp is `(direction, remaining_jiffies, current_value)` where
//! `current_value` lies in `[0, RAMP_MAX]`. Playback multiplies each
//! sample by `current_value / RAMP_MAX`. The value evolves towards its
//! target endpoint over `remaining_jiffies` using [`RAMP_ARRAY`], a fixed
//! lookup table — this keeps the curve shape identical across every stage
//! that ramps (ramper, seeker, variable delay, skipper, stopper, starvation
//! ramper, muter) so two ramps never audibly disagree in slope.

/// Maximum ramp value (full volume).
pub const RAMP_MAX: u32 = 1 << 31;

/// Number of entries in the fixed ramp curve.
const RAMP_ARRAY_LEN: usize = 128;

/// Fixed lookup table describing the ramp-up curve shape, indexed by
/// `progress * (RAMP_ARRAY_LEN - 1) / total_steps`. A half-cosine curve is
/// used so the fade has no audible "corner" at either endpoint; ramp-down
/// is just this table read in reverse.
fn ramp_array() -> [u32; RAMP_ARRAY_LEN] {
    let mut table = [0u32; RAMP_ARRAY_LEN];
    for (i, slot) in table.iter_mut().enumerate() {
        let x = i as f64 / (RAMP_ARRAY_LEN - 1) as f64;
        let shaped = 0.5 - 0.5 * (std::f64::consts::PI * x).cos();
        *slot = (shaped * RAMP_MAX as f64) as u32;
    }
    table
}

/// Direction a ramp is currently moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampDirection {
    Up,
    Down,
    None,
}

/// A ramp in progress: how long it has left to run and where it currently stands.
#[derive(Clone, Copy, Debug)]
pub struct Ramp {
    direction: RampDirection,
    duration_jiffies: u64,
    remaining_jiffies: u64,
    current_value: u32,
}

impl Ramp {
    /// A ramp that is not active; full volume, nothing in flight.
    pub fn none() -> Self {
        Self {
            direction: RampDirection::None,
            duration_jiffies: 0,
            remaining_jiffies: 0,
            current_value: RAMP_MAX,
        }
    }

    /// Start a new ramp-down from the current value to silence over `duration_jiffies`.
    pub fn start_down(duration_jiffies: u64) -> Self {
        Self {
            direction: RampDirection::Down,
            duration_jiffies,
            remaining_jiffies: duration_jiffies,
            current_value: RAMP_MAX,
        }
    }

    /// Start a new ramp-up from silence to full volume over `duration_jiffies`.
    pub fn start_up(duration_jiffies: u64) -> Self {
        Self {
            direction: RampDirection::Up,
            duration_jiffies,
            remaining_jiffies: duration_jiffies,
            current_value: 0,
        }
    }

    pub fn direction(&self) -> RampDirection {
        self.direction
    }

    pub fn current_value(&self) -> u32 {
        self.current_value
    }

    pub fn is_active(&self) -> bool {
        self.direction != RampDirection::None
    }

    pub fn is_silent(&self) -> bool {
        self.direction == RampDirection::Down && self.remaining_jiffies == 0
    }

    pub fn is_full(&self) -> bool {
        self.direction == RampDirection::None || (self.direction == RampDirection::Up && self.remaining_jiffies == 0)
    }

    /// Reverse direction mid-ramp, preserving `current_value` and mirroring
    /// `remaining_jiffies` around the ramp's total duration so the new ramp
    /// starts exactly where the old one stopped (spec.md §4.4, "ramp
    /// reversal invariant"; tested by spec.md §8 property 4).
    pub fn reverse(&mut self) {
        let new_direction = match self.direction {
            RampDirection::Up => RampDirection::Down,
            RampDirection::Down => RampDirection::Up,
            RampDirection::None => return,
        };
        self.remaining_jiffies = self.duration_jiffies.saturating_sub(self.remaining_jiffies);
        self.direction = new_direction;
    }

    /// Advance the ramp by `elapsed_jiffies` of audio that has just been
    /// produced, returning the ramp value to apply to that span's *first*
    /// sample (callers apply the ramp at message granularity and use
    /// [`Ramp::current_value`] before/after to interpolate per sample).
    pub fn advance(&mut self, elapsed_jiffies: u64) {
        if self.direction == RampDirection::None {
            return;
        }
        self.remaining_jiffies = self.remaining_jiffies.saturating_sub(elapsed_jiffies);
        let progress = if self.duration_jiffies == 0 {
            1.0
        } else {
            1.0 - (self.remaining_jiffies as f64 / self.duration_jiffies as f64)
        };
        let table = ramp_array();
        let idx = ((progress.clamp(0.0, 1.0)) * (RAMP_ARRAY_LEN - 1) as f64).round() as usize;
        let shaped = table[idx.min(RAMP_ARRAY_LEN - 1)];
        self.current_value = match self.direction {
            RampDirection::Up => shaped,
            RampDirection::Down => RAMP_MAX - shaped,
            RampDirection::None => RAMP_MAX,
        };
        if self.remaining_jiffies == 0 {
            self.direction = match self.direction {
                RampDirection::Up => RampDirection::None,
                other => other,
            };
        }
    }

    /// Combine this ramp with another ramp applied by a different stage to
    /// the same `AudioPcm` message. Several ramping stages (ramper, seeker,
    /// variable delay, skipper, stopper, starvation ramper, muter) can all
    /// have an active ramp on the same span of audio at once; rather than
    /// each mutating shared sample storage, every stage narrows the single
    /// `Ramp` carried on the message by multiplying in its own
    /// `current_value` and reports its own direction/remaining time if it
    /// is the more recently engaged of the two.
    pub fn combine(&self, other: &Ramp) -> Ramp {
        let current_value =
            ((self.current_value as u64 * other.current_value as u64) / RAMP_MAX as u64) as u32;
        let (direction, duration_jiffies, remaining_jiffies) = if other.direction != RampDirection::None {
            (other.direction, other.duration_jiffies, other.remaining_jiffies)
        } else {
            (self.direction, self.duration_jiffies, self.remaining_jiffies)
        };
        Ramp { direction, duration_jiffies, remaining_jiffies, current_value }
    }

    /// Apply the current ramp value to an interleaved `f32` sample buffer in place.
    pub fn apply(&self, samples: &mut [f32]) {
        let scale = self.current_value as f64 / RAMP_MAX as f64;
        if scale >= 0.999_999 {
            return;
        }
        for s in samples.iter_mut() {
            *s = (*s as f64 * scale) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_down_reaches_silence() {
        let mut r = Ramp::start_down(1000);
        r.advance(1000);
        assert!(r.is_silent());
        assert_eq!(r.current_value(), 0);
    }

    #[test]
    fn ramp_up_reaches_full() {
        let mut r = Ramp::start_up(1000);
        r.advance(1000);
        assert!(r.is_full());
        assert_eq!(r.current_value(), RAMP_MAX);
    }

    #[test]
    fn reversal_preserves_value_and_mirrors_remaining() {
        let mut r = Ramp::start_down(1000);
        r.advance(300); // 30% through the fade-out
        let value_at_reversal = r.current_value();
        let remaining_before = 700;
        assert_eq!(r.remaining_jiffies, remaining_before);

        r.reverse();
        assert_eq!(r.direction(), RampDirection::Up);
        // New remaining = duration - old remaining = 1000 - 700 = 300.
        assert_eq!(r.remaining_jiffies, 300);
        // Advancing by zero jiffies should reproduce the same value (continuity).
        let mut r2 = r;
        r2.advance(0);
        assert_eq!(r2.current_value(), value_at_reversal);
    }

    #[test]
    fn apply_scales_samples() {
        let mut r = Ramp::start_down(100);
        r.advance(50);
        let mut samples = [1.0f32, -1.0, 0.5];
        let before = samples;
        r.apply(&mut samples);
        assert!(samples[0].abs() <= before[0].abs());
    }

    #[test]
    fn combine_multiplies_current_values() {
        let mut a = Ramp::start_down(1000);
        a.advance(500); // halfway, current_value roughly RAMP_MAX/2
        let b = Ramp::none();
        let combined = a.combine(&b);
        assert_eq!(combined.current_value(), a.current_value());
        assert_eq!(combined.direction(), a.direction());
    }

    #[test]
    fn none_ramp_is_full_and_noop() {
        let r = Ramp::none();
        assert!(r.is_full());
        assert!(!r.is_active());
    }
}
