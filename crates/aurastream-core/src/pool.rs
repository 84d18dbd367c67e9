//! Bounded allocation pools.
//!
//! Every message variant and every decoded-audio buffer is drawn from a
//! fixed-capacity pool rather than allocated without limit; a pipeline
//! stuck because a downstream consumer stalls must apply backpressure
//! instead of growing memory without bound (spec.md §4.1). Capacity is
//! enforced with an atomic counter and a RAII [`PoolPermit`] rather than a
//! hand-rolled free list: Rust's ownership model already gives us "give
//! the slot back exactly once, even on panic" for free via `Drop`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("pool '{0}' exhausted")]
    Exhausted(&'static str),
}

struct PoolInner {
    name: &'static str,
    capacity: usize,
    in_use: AtomicUsize,
}

/// A fixed-capacity counting pool. Does not own the values it gates —
/// callers combine a permit with whatever payload they are pooling.
#[derive(Clone)]
pub struct BoundedPool {
    inner: Arc<PoolInner>,
}

impl BoundedPool {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name,
                capacity,
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Try to take one slot without blocking.
    pub fn try_acquire(&self) -> Option<PoolPermit> {
        loop {
            let current = self.inner.in_use.load(Ordering::Acquire);
            if current >= self.inner.capacity {
                return None;
            }
            if self
                .inner
                .in_use
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(PoolPermit { inner: self.inner.clone() });
            }
        }
    }

    /// Acquire a slot, retrying with a short backoff for up to
    /// `max_retries` attempts. If the pool is still exhausted after that,
    /// this is `AllocatorNoMemory`: a deliberate, documented fatal
    /// condition (spec.md §7), not a transient error for a caller to
    /// recover from, so it panics rather than returning `Result`.
    pub fn acquire_bounded(&self, max_retries: u32, retry_delay: Duration) -> PoolPermit {
        for attempt in 0..max_retries {
            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            if attempt + 1 < max_retries {
                thread::sleep(retry_delay);
            }
        }
        panic!(
            "AllocatorNoMemory: pool '{}' exhausted after {} retries (capacity {})",
            self.inner.name, max_retries, self.inner.capacity
        );
    }
}

/// RAII handle on a pool slot. Dropping it returns the slot.
pub struct PoolPermit {
    inner: Arc<PoolInner>,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_respects_capacity() {
        let pool = BoundedPool::new("test", 2);
        let a = pool.try_acquire().expect("slot 1");
        let b = pool.try_acquire().expect("slot 2");
        assert!(pool.try_acquire().is_none());
        drop(a);
        assert!(pool.try_acquire().is_some());
        drop(b);
    }

    #[test]
    fn releasing_a_permit_frees_capacity() {
        let pool = BoundedPool::new("test", 1);
        assert_eq!(pool.in_use(), 0);
        let permit = pool.try_acquire().unwrap();
        assert_eq!(pool.in_use(), 1);
        drop(permit);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    #[should_panic(expected = "AllocatorNoMemory")]
    fn acquire_bounded_panics_when_permanently_exhausted() {
        let pool = BoundedPool::new("test", 1);
        let _held = pool.try_acquire().unwrap();
        pool.acquire_bounded(3, Duration::from_millis(1));
    }
}
