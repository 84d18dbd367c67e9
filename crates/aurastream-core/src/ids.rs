//! Monotonic id generation for tracks, streams, flushes, and halts.
//!
//! Every id space is independent and wraps around
//! [`aurastream_types::ID_INVALID`] on overflow so a producer can run
//! indefinitely without ever emitting the sentinel value.

use aurastream_types::ID_INVALID;
use std::sync::atomic::{AtomicU32, Ordering};

/// A single monotonic counter that never returns [`ID_INVALID`].
#[derive(Debug, Default)]
pub struct IdProvider {
    next: AtomicU32,
}

impl IdProvider {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(ID_INVALID + 1),
        }
    }

    /// Allocate the next id in this space.
    pub fn next(&self) -> u32 {
        loop {
            let current = self.next.fetch_add(1, Ordering::Relaxed);
            if current != ID_INVALID {
                return current;
            }
            // Wrapped exactly onto the sentinel; bump past it and retry.
            self.next.store(ID_INVALID + 1, Ordering::Relaxed);
        }
    }
}

/// The four independent id spaces a pipeline instance owns (spec.md §3.4).
#[derive(Debug, Default)]
pub struct IdProviders {
    pub track: IdProvider,
    pub stream: IdProvider,
    pub flush: IdProvider,
    pub halt: IdProvider,
}

impl IdProviders {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_never_invalid() {
        let p = IdProvider::new();
        let a = p.next();
        let b = p.next();
        assert!(b > a);
        assert_ne!(a, ID_INVALID);
        assert_ne!(b, ID_INVALID);
    }

    #[test]
    fn wrap_around_skips_sentinel() {
        let p = IdProvider::new();
        p.next.store(u32::MAX, Ordering::Relaxed);
        let a = p.next(); // consumes u32::MAX
        assert_eq!(a, u32::MAX);
        let b = p.next(); // would wrap to 0 == ID_INVALID, must skip
        assert_ne!(b, ID_INVALID);
    }
}
