//! `MessageFactory`: the one place pipeline stages get new messages from.
//!
//! Pool sizes are derived from pipeline parameters (spec.md §4.1): the
//! encoded-reservoir byte budget divided by block size gives the
//! `AudioEncoded` pool size; the decoded-reservoir jiffies budget divided
//! by the maximum jiffies per decoded message gives the `AudioPcm` pool
//! size; everything else gets a small fixed allowance for in-flight
//! control messages and splits.

use crate::pool::BoundedPool;
use aurastream_types::AllocatorStats;
use std::time::Duration;

/// Tuning constants controlling how large each pool is.
#[derive(Clone, Copy, Debug)]
pub struct FactoryConfig {
    pub encoded_reservoir_bytes: u64,
    pub encoded_block_bytes: u64,
    pub decoded_reservoir_jiffies: u64,
    pub max_jiffies_per_decoded_msg: u64,
    pub control_message_slack: usize,
    /// Attempts `BoundedPool::acquire_bounded` makes before declaring
    /// `AllocatorNoMemory`.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            encoded_reservoir_bytes: 512 * 1024,
            encoded_block_bytes: 4 * 1024,
            decoded_reservoir_jiffies: crate::jiffies::JIFFIES_PER_SECOND * 3,
            max_jiffies_per_decoded_msg: crate::jiffies::JIFFIES_PER_SECOND / 20,
            control_message_slack: 32,
            max_retries: 50,
            retry_delay: Duration::from_millis(2),
        }
    }
}

/// Bounded pools for every pooled resource the pipeline allocates from.
///
/// There is no generic control-message pool: every control variant
/// (`Mode`, `Track`, `Drain`, `Delay`, `MetaText`, `Halt`, `Flush`,
/// `Wait`, `Quit`, ...) is small, fixed-size and short-lived compared to
/// the audio buffers it rides alongside, so it is allocated directly
/// rather than through a bounded pool.
pub struct MessageFactory {
    config: FactoryConfig,
    encoded_audio: BoundedPool,
    decoded_audio: BoundedPool,
}

impl MessageFactory {
    pub fn new(config: FactoryConfig) -> Self {
        let encoded_capacity =
            (config.encoded_reservoir_bytes / config.encoded_block_bytes.max(1)) as usize + config.control_message_slack;
        let decoded_capacity = (config.decoded_reservoir_jiffies / config.max_jiffies_per_decoded_msg.max(1)) as usize
            + config.control_message_slack;
        Self {
            encoded_audio: BoundedPool::new("audio_encoded", encoded_capacity),
            decoded_audio: BoundedPool::new("decoded_audio", decoded_capacity),
            config,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Acquire a slot for an `AudioEncoded` message, blocking with bounded
    /// retry. Panics with `AllocatorNoMemory` if the pool stays exhausted.
    pub fn acquire_encoded_audio(&self) -> crate::pool::PoolPermit {
        self.encoded_audio.acquire_bounded(self.config.max_retries, self.config.retry_delay)
    }

    /// Acquire a slot for a `DecodedAudio` buffer.
    pub fn acquire_decoded_audio(&self) -> crate::pool::PoolPermit {
        self.decoded_audio.acquire_bounded(self.config.max_retries, self.config.retry_delay)
    }

    /// Snapshot pool utilisation for the diagnostics aggregator
    /// (spec.md §4.1: "Reported via an aggregator for diagnostics").
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            msg_pool_capacity: self.encoded_audio.capacity(),
            msg_pool_in_use: self.encoded_audio.in_use(),
            decoded_audio_pool_capacity: self.decoded_audio.capacity(),
            decoded_audio_pool_in_use: self.decoded_audio.in_use(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_derive_from_config() {
        let factory = MessageFactory::new(FactoryConfig {
            encoded_reservoir_bytes: 4096,
            encoded_block_bytes: 1024,
            decoded_reservoir_jiffies: 1000,
            max_jiffies_per_decoded_msg: 100,
            control_message_slack: 2,
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
        });
        assert_eq!(factory.encoded_audio.capacity(), 4 + 2);
        assert_eq!(factory.decoded_audio.capacity(), 10 + 2);
    }

    #[test]
    fn stats_reflect_acquired_permits() {
        let factory = MessageFactory::new(FactoryConfig {
            control_message_slack: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            ..FactoryConfig::default()
        });
        let _permit = factory.acquire_encoded_audio();
        let stats = factory.stats();
        assert_eq!(stats.msg_pool_in_use, 1);
    }
}
