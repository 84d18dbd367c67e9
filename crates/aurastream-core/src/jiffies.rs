//! Jiffies: the pipeline's time unit.
//!
//! A jiffy is chosen so that one sample, at every sample rate the pipeline
//! supports, is an exact integral number of jiffies. `JIFFIES_PER_SECOND`
//! is the LCM of the supported rates' sample periods expressed in a common
//! unit; every stage does its duration arithmetic in jiffies rather than
//! samples or milliseconds so that ramps, delays, and reservoir thresholds
//! compose exactly across codecs with different sample rates.

/// Jiffies per second. Divisible by every sample rate in [`SUPPORTED_SAMPLE_RATES`].
pub const JIFFIES_PER_SECOND: u64 = 56_448_000_000;

/// Every sample rate the pipeline is required to support exactly (spec.md §8 property 2).
pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[
    7_350, 8_000, 11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 88_200, 96_000,
    176_400, 192_000,
];

/// Jiffies represented by a single sample at `sample_rate_hz`.
///
/// Panics if `sample_rate_hz` is zero or does not evenly divide
/// [`JIFFIES_PER_SECOND`] — such a rate cannot be represented exactly and
/// indicates a codec/config bug, not a recoverable runtime condition.
pub fn jiffies_per_sample(sample_rate_hz: u32) -> u64 {
    assert!(sample_rate_hz > 0, "sample rate must be nonzero");
    let rate = sample_rate_hz as u64;
    assert!(
        JIFFIES_PER_SECOND % rate == 0,
        "sample rate {sample_rate_hz} does not evenly divide JIFFIES_PER_SECOND"
    );
    JIFFIES_PER_SECOND / rate
}

/// Convert a sample count at `sample_rate_hz` into jiffies.
pub fn samples_to_jiffies(samples: u64, sample_rate_hz: u32) -> u64 {
    samples.saturating_mul(jiffies_per_sample(sample_rate_hz))
}

/// Convert a jiffy count back into a (possibly truncated) sample count.
pub fn jiffies_to_samples(jiffies: u64, sample_rate_hz: u32) -> u64 {
    jiffies / jiffies_per_sample(sample_rate_hz)
}

/// Convert whole milliseconds into jiffies.
pub fn ms_to_jiffies(ms: u64) -> u64 {
    ms.saturating_mul(JIFFIES_PER_SECOND) / 1000
}

/// Convert jiffies into whole milliseconds (truncating).
pub fn jiffies_to_ms(jiffies: u64) -> u64 {
    jiffies.saturating_mul(1000) / JIFFIES_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_rate_divides_exactly() {
        for &rate in SUPPORTED_SAMPLE_RATES {
            let jps = jiffies_per_sample(rate);
            assert_eq!(
                jps * rate as u64,
                JIFFIES_PER_SECOND,
                "rate {rate} failed conservation"
            );
        }
    }

    #[test]
    fn samples_and_jiffies_round_trip_at_44100() {
        let one_second = samples_to_jiffies(44_100, 44_100);
        assert_eq!(one_second, JIFFIES_PER_SECOND);
        assert_eq!(jiffies_to_samples(one_second, 44_100), 44_100);
    }

    #[test]
    fn ms_conversion_round_trips() {
        assert_eq!(jiffies_to_ms(ms_to_jiffies(1500)), 1500);
    }

    #[test]
    #[should_panic(expected = "does not evenly divide")]
    fn odd_rate_panics() {
        jiffies_per_sample(44_101);
    }
}
