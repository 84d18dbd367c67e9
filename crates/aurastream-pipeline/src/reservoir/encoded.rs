//! `EncodedReservoir`: a bounded FIFO of encoded-stream messages (spec.md §4.5).
//!
//! Blocks producers (protocol threads) once the buffered byte count
//! exceeds `max_bytes` or the number of distinct streams it holds exceeds
//! `max_streams` — the latter guards against pathological playlist churn
//! filling the reservoir with stream boundaries rather than audio.
//! Blocking happens only on the producer side (`push`); `pull` never
//! blocks the codec controller thread for longer than it takes a
//! producer to catch up.

use crate::stage::MsgSource;
use aurastream_core::msg::{EncodedStreamInfo, Msg};
use aurastream_core::MessageFactory;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

struct Inner {
    queue: VecDeque<Msg>,
    bytes: u64,
    stream_count: usize,
    closed: bool,
}

/// Tuning limits for [`EncodedReservoir`] (spec.md §4.5).
#[derive(Clone, Copy, Debug)]
pub struct EncodedReservoirConfig {
    pub max_bytes: u64,
    pub max_streams: usize,
}

impl Default for EncodedReservoirConfig {
    fn default() -> Self {
        Self { max_bytes: 512 * 1024, max_streams: 4 }
    }
}

/// Shared handle producers push into and the codec controller pulls from.
pub struct EncodedReservoir {
    config: EncodedReservoirConfig,
    factory: Arc<MessageFactory>,
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl EncodedReservoir {
    pub fn new(config: EncodedReservoirConfig, factory: Arc<MessageFactory>) -> Self {
        Self {
            config,
            factory,
            inner: Mutex::new(Inner { queue: VecDeque::new(), bytes: 0, stream_count: 0, closed: false }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Current buffered byte count (diagnostics: `SizeInBytes`, spec.md §6).
    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().expect("encoded reservoir lock poisoned").bytes
    }

    pub fn stream_count(&self) -> usize {
        self.inner.lock().expect("encoded reservoir lock poisoned").stream_count
    }

    /// Block until there is room, then enqueue `msg`. Producers (protocol
    /// threads) call this; it is the only blocking point on the push side
    /// of the pipeline.
    pub fn push(&self, msg: Msg) {
        let msg = self.attach_permit(msg);
        let mut inner = self.inner.lock().expect("encoded reservoir lock poisoned");
        if matches!(msg, Msg::EncodedStream(_)) {
            inner = self
                .not_full
                .wait_while(inner, |i| i.stream_count >= self.config.max_streams && !i.closed)
                .expect("encoded reservoir lock poisoned");
        } else if let Msg::AudioEncoded(_) = &msg {
            inner = self
                .not_full
                .wait_while(inner, |i| i.bytes >= self.config.max_bytes && !i.closed)
                .expect("encoded reservoir lock poisoned");
        }
        if inner.closed {
            return;
        }
        account_push(&mut inner, &msg);
        inner.queue.push_back(msg);
        self.not_empty.notify_one();
    }

    /// Give `msg` a pool permit if it's an `AudioEncoded` arriving without
    /// one (the reservoir is the pooled domain's entry point — protocol
    /// code upstream of it builds `EncodedAudio` directly, unpooled, per
    /// spec.md §1). Acquiring blocks outside the reservoir's own lock so a
    /// momentarily exhausted pool doesn't also stall `pull`/`close`.
    fn attach_permit(&self, msg: Msg) -> Msg {
        match msg {
            Msg::AudioEncoded(bytes) if !bytes.has_permit() => {
                let permit = self.factory.acquire_encoded_audio();
                Msg::AudioEncoded(bytes.with_permit(Arc::new(permit)))
            }
            other => other,
        }
    }

    /// Unblock anyone waiting in `push`/`pull`, e.g. on shutdown.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("encoded reservoir lock poisoned");
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

fn account_push(inner: &mut Inner, msg: &Msg) {
    match msg {
        Msg::EncodedStream(EncodedStreamInfo { .. }) => inner.stream_count += 1,
        Msg::AudioEncoded(bytes) => inner.bytes += bytes.len() as u64,
        _ => {}
    }
}

fn account_pop(inner: &mut Inner, msg: &Msg) {
    match msg {
        Msg::EncodedStream(EncodedStreamInfo { .. }) => {
            inner.stream_count = inner.stream_count.saturating_sub(1)
        }
        Msg::AudioEncoded(bytes) => inner.bytes = inner.bytes.saturating_sub(bytes.len() as u64),
        _ => {}
    }
}

impl EncodedReservoir {
    fn pull_one(&self) -> Msg {
        let mut inner = self.inner.lock().expect("encoded reservoir lock poisoned");
        loop {
            if let Some(msg) = inner.queue.pop_front() {
                account_pop(&mut inner, &msg);
                self.not_full.notify_one();
                return msg;
            }
            if inner.closed {
                return Msg::Quit;
            }
            inner = self.not_empty.wait(inner).expect("encoded reservoir lock poisoned");
        }
    }
}

impl MsgSource for &EncodedReservoir {
    fn pull(&mut self) -> Msg {
        (**self).pull_one()
    }
}

impl MsgSource for std::sync::Arc<EncodedReservoir> {
    fn pull(&mut self) -> Msg {
        self.as_ref().pull_one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurastream_core::msg::EncodedAudio;
    use aurastream_core::{FactoryConfig, MessageFactory};
    use std::sync::Arc;
    use std::thread;

    fn test_factory() -> Arc<MessageFactory> {
        Arc::new(MessageFactory::new(FactoryConfig::default()))
    }

    #[test]
    fn push_then_pull_preserves_order() {
        let reservoir = EncodedReservoir::new(EncodedReservoirConfig::default(), test_factory());
        reservoir.push(Msg::AudioEncoded(EncodedAudio::new(vec![1, 2, 3])));
        reservoir.push(Msg::AudioEncoded(EncodedAudio::new(vec![4, 5])));
        let mut pull = &reservoir;
        match pull.pull() {
            Msg::AudioEncoded(b) => assert_eq!(b.as_slice(), &[1, 2, 3]),
            other => panic!("unexpected {}", other.variant_name()),
        }
    }

    #[test]
    fn byte_count_tracks_pushes_and_pops() {
        let reservoir = EncodedReservoir::new(EncodedReservoirConfig::default(), test_factory());
        reservoir.push(Msg::AudioEncoded(EncodedAudio::new(vec![0; 10])));
        assert_eq!(reservoir.size_bytes(), 10);
        let mut pull = &reservoir;
        pull.pull();
        assert_eq!(reservoir.size_bytes(), 0);
    }

    #[test]
    fn push_blocks_producer_past_byte_cap() {
        let reservoir = Arc::new(EncodedReservoir::new(
            EncodedReservoirConfig { max_bytes: 4, max_streams: 4 },
            test_factory(),
        ));
        reservoir.push(Msg::AudioEncoded(EncodedAudio::new(vec![0; 4])));
        let r2 = reservoir.clone();
        let handle = thread::spawn(move || {
            r2.push(Msg::AudioEncoded(EncodedAudio::new(vec![1; 2])));
        });
        thread::sleep(std::time::Duration::from_millis(30));
        assert!(!handle.is_finished());
        let mut pull = &*reservoir;
        pull.pull();
        handle.join().unwrap();
    }

    #[test]
    fn closed_reservoir_unblocks_pull_with_quit() {
        let reservoir = EncodedReservoir::new(EncodedReservoirConfig::default(), test_factory());
        reservoir.close();
        let mut pull = &reservoir;
        assert!(matches!(pull.pull(), Msg::Quit));
    }
}
